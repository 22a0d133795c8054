//! Scale degrees and how they resolve to notes.
//!
//! A degree is a scale step (1-7) with any number of accidentals in front of it.
//! Each `b` lowers by a semitone and each `#` raises by one; they add up before
//! being applied to the step's offset in the major or natural-minor table.
//! In major this gives the familiar chromatic chart (b2=1, #4=6, b7=10, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DrillError;
use crate::note::NoteName;

const MAJOR_STEPS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_STEPS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Which scale the step numbers are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Major,
    NaturalMinor,
}

impl ScaleMode {
    /// Semitone offsets of steps 1..=7 from the root
    pub fn steps(self) -> &'static [i32; 7] {
        match self {
            ScaleMode::Major => &MAJOR_STEPS,
            ScaleMode::NaturalMinor => &NATURAL_MINOR_STEPS,
        }
    }

    /// Word used in question prompts
    pub fn label(self) -> &'static str {
        match self {
            ScaleMode::Major => "major",
            ScaleMode::NaturalMinor => "minor",
        }
    }

    pub fn toggled(self) -> ScaleMode {
        match self {
            ScaleMode::Major => ScaleMode::NaturalMinor,
            ScaleMode::NaturalMinor => ScaleMode::Major,
        }
    }
}

/// Which set of degree labels questions are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeMode {
    #[default]
    Diatonic,
    Chromatic,
}

impl DegreeMode {
    pub fn vocabulary(self) -> &'static [Degree] {
        match self {
            DegreeMode::Diatonic => &DIATONIC,
            DegreeMode::Chromatic => &CHROMATIC,
        }
    }

    pub fn toggled(self) -> DegreeMode {
        match self {
            DegreeMode::Diatonic => DegreeMode::Chromatic,
            DegreeMode::Chromatic => DegreeMode::Diatonic,
        }
    }
}

impl fmt::Display for DegreeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegreeMode::Diatonic => f.write_str("diatonic"),
            DegreeMode::Chromatic => f.write_str("chromatic"),
        }
    }
}

/// A scale step with its net accidental, e.g. `b7` is step 7 lowered once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Degree {
    step: u8,
    accidental: i8,
}

const fn deg(step: u8, accidental: i8) -> Degree {
    Degree { step, accidental }
}

pub const DIATONIC: [Degree; 7] = [
    deg(1, 0),
    deg(2, 0),
    deg(3, 0),
    deg(4, 0),
    deg(5, 0),
    deg(6, 0),
    deg(7, 0),
];

/// One label per semitone of the major scale, both spellings where two are in
/// common use. Measured from minor steps some labels coincide.
pub const CHROMATIC: [Degree; 15] = [
    deg(1, 0),
    deg(2, -1),
    deg(2, 0),
    deg(2, 1),
    deg(3, -1),
    deg(3, 0),
    deg(4, 0),
    deg(4, 1),
    deg(5, -1),
    deg(5, 0),
    deg(5, 1),
    deg(6, -1),
    deg(6, 0),
    deg(7, -1),
    deg(7, 0),
];

impl Degree {
    pub fn step(self) -> u8 {
        self.step
    }

    pub fn accidental(self) -> i8 {
        self.accidental
    }

    /// Semitones above the root in the given scale (may leave `[0,12)` for
    /// labels like `b1`; callers wrap through `NoteName::transpose`).
    pub fn semitones(self, mode: ScaleMode) -> i32 {
        mode.steps()[(self.step - 1) as usize] + self.accidental as i32
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.accidental < 0 { "b" } else { "#" };
        for _ in 0..self.accidental.unsigned_abs() {
            f.write_str(sign)?;
        }
        write!(f, "{}", self.step)
    }
}

impl FromStr for Degree {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || DrillError::UnknownDegree(s.to_string());
        let mut chars = s.chars().peekable();
        let mut accidental: i8 = 0;

        while let Some(&c) = chars.peek() {
            match c {
                'b' => accidental = accidental.checked_sub(1).ok_or_else(unknown)?,
                '#' => accidental = accidental.checked_add(1).ok_or_else(unknown)?,
                _ => break,
            }
            chars.next();
        }

        let step = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .filter(|d| (1..=7).contains(d))
            .ok_or_else(unknown)?;
        if chars.next().is_some() {
            return Err(unknown());
        }

        Ok(deg(step as u8, accidental))
    }
}

/// The note a degree names in a key.
pub fn degree_to_note(key_root: NoteName, degree: Degree, mode: ScaleMode) -> NoteName {
    key_root.transpose(degree.semitones(mode))
}

/// String-boundary lookup: both inputs must come from the known vocabularies.
pub fn resolve(key: &str, degree: &str, mode: ScaleMode) -> Result<NoteName, DrillError> {
    let key_root = key
        .parse::<NoteName>()
        .map_err(|_| DrillError::UnknownKey(key.to_string()))?;
    let degree_label = degree.parse::<Degree>()?;
    if !CHROMATIC.contains(&degree_label) {
        return Err(DrillError::UnknownDegree(degree.to_string()));
    }
    Ok(degree_to_note(key_root, degree_label, mode))
}
