use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DrillError;

/// The twelve pitch classes, one canonical spelling each.
///
/// The spelling table is fixed: flats for the black keys except F#. No
/// enharmonic alternatives are modelled, so a name maps to exactly one class
/// and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoteName {
    C,
    Db,
    D,
    Eb,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    Ab,
    A,
    Bb,
    B,
}

impl NoteName {
    /// All notes in pitch-class order (C=0 .. B=11).
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::Db,
        NoteName::D,
        NoteName::Eb,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::Ab,
        NoteName::A,
        NoteName::Bb,
        NoteName::B,
    ];

    /// Pitch class within an octave (C=0, B=11)
    pub fn pitch_class(self) -> u8 {
        self as u8
    }

    /// Note for any integer pitch class; wraps into `[0,12)`.
    pub fn from_pitch_class(pc: i32) -> NoteName {
        Self::ALL[pc.rem_euclid(12) as usize]
    }

    /// Move by a signed number of semitones, wrapping around the octave.
    pub fn transpose(self, semitones: i32) -> NoteName {
        Self::from_pitch_class(self.pitch_class() as i32 + semitones.rem_euclid(12))
    }

    /// Canonical spelling
    pub fn name(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Db => "Db",
            NoteName::D => "D",
            NoteName::Eb => "Eb",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::Ab => "Ab",
            NoteName::A => "A",
            NoteName::Bb => "Bb",
            NoteName::B => "B",
        }
    }

    /// MIDI note number given an octave (0-8)
    /// Middle C (C4) = MIDI 60
    pub fn to_midi(self, octave: u8) -> u8 {
        (octave + 1) * 12 + self.pitch_class()
    }

    /// Frequency in Hz (A4 = 440 Hz)
    pub fn to_freq(self, octave: u8) -> f64 {
        let midi = self.to_midi(octave) as f64;
        440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NoteName {
    type Err = DrillError;

    /// Exact canonical spellings only; "C#" or "c" are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|n| n.name() == s)
            .ok_or_else(|| DrillError::UnknownNote(s.to_string()))
    }
}

/// Parse a comma- or space-separated key list such as "C, G Bb".
pub fn parse_key_list(input: &str) -> Result<Vec<NoteName>, DrillError> {
    let mut keys = Vec::new();
    for part in input.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        let key = part
            .parse::<NoteName>()
            .map_err(|_| DrillError::UnknownKey(part.to_string()))?;
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_c_midi() {
        assert_eq!(NoteName::C.to_midi(4), 60);
    }

    #[test]
    fn test_a4_frequency() {
        let freq = NoteName::A.to_freq(4);
        assert!((freq - 440.0).abs() < 0.01);
    }

    #[test]
    fn test_pitch_classes() {
        assert_eq!(NoteName::C.pitch_class(), 0);
        assert_eq!(NoteName::FSharp.pitch_class(), 6);
        assert_eq!(NoteName::B.pitch_class(), 11);
    }

    #[test]
    fn test_transpose_wraps_both_ways() {
        assert_eq!(NoteName::C.transpose(7), NoteName::G);
        assert_eq!(NoteName::A.transpose(5), NoteName::D);
        assert_eq!(NoteName::C.transpose(-1), NoteName::B);
        assert_eq!(NoteName::D.transpose(-26), NoteName::C);
        assert_eq!(NoteName::E.transpose(i32::MIN), NoteName::Ab);
        assert_eq!(NoteName::E.transpose(i32::MAX), NoteName::B);
    }

    #[test]
    fn test_name_round_trip_after_transpose() {
        for note in NoteName::ALL {
            for s in -30..30 {
                let moved = note.transpose(s);
                assert_eq!(moved.name().parse::<NoteName>().unwrap(), moved);
            }
        }
    }

    #[test]
    fn test_unknown_names_rejected() {
        for bad in ["C#", "c", "Gb", "H", "", " C"] {
            assert_eq!(
                bad.parse::<NoteName>(),
                Err(DrillError::UnknownNote(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(
            parse_key_list("C, G Bb,G").unwrap(),
            vec![NoteName::C, NoteName::G, NoteName::Bb]
        );
        assert!(parse_key_list("").unwrap().is_empty());
        assert_eq!(
            parse_key_list("C,X"),
            Err(DrillError::UnknownKey("X".to_string()))
        );
    }
}
