//! Question generation: a key, a degree, the note it names, and seven choices.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::degree::{Degree, ScaleMode, degree_to_note};
use crate::note::NoteName;
use crate::settings::Settings;

/// Number of answer buttons
pub const OPTION_COUNT: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub key_root: NoteName,
    pub degree: Degree,
    pub mode: ScaleMode,
    pub correct_note: NoteName,
    pub options: [NoteName; OPTION_COUNT],
}

impl Question {
    /// "What is the b7 in the key of D major?"
    pub fn prompt(&self) -> String {
        format!(
            "What is the {} in the key of {} {}?",
            self.degree,
            self.key_root,
            self.mode.label()
        )
    }

    /// Same question, freshly drawn answer choices.
    pub fn reshuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
        Question {
            options: build_options(self.correct_note, rng),
            ..self.clone()
        }
    }
}

/// Draw a question from the enabled keys and the selected degree vocabulary.
pub fn generate<R: Rng + ?Sized>(settings: &Settings, mode: ScaleMode, rng: &mut R) -> Question {
    let keys: &[NoteName] = if settings.keys_enabled.is_empty() {
        &NoteName::ALL
    } else {
        &settings.keys_enabled
    };
    let key_root = *keys.choose(rng).unwrap_or(&NoteName::C);
    let degree = *settings
        .degree_mode
        .vocabulary()
        .choose(rng)
        .unwrap_or(&crate::degree::DIATONIC[0]);
    let correct_note = degree_to_note(key_root, degree, mode);

    Question {
        key_root,
        degree,
        mode,
        correct_note,
        options: build_options(correct_note, rng),
    }
}

/// Six distinct distractors plus the answer, in uniformly random order.
pub fn build_options<R: Rng + ?Sized>(correct: NoteName, rng: &mut R) -> [NoteName; OPTION_COUNT] {
    let mut pool: Vec<NoteName> = NoteName::ALL.into_iter().filter(|n| *n != correct).collect();
    pool.shuffle(rng);

    let mut options = [correct; OPTION_COUNT];
    options[1..].copy_from_slice(&pool[..OPTION_COUNT - 1]);
    options.shuffle(rng);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degree::DegreeMode;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn only(keys: &[NoteName], degree_mode: DegreeMode) -> Settings {
        Settings {
            keys_enabled: keys.to_vec(),
            degree_mode,
            ..Settings::default()
        }
    }

    #[test]
    fn test_options_are_seven_distinct_with_answer_once() {
        let mut rng = Pcg32::seed_from_u64(7);
        let settings = only(&NoteName::ALL, DegreeMode::Chromatic);
        for _ in 0..2_000 {
            let q = generate(&settings, ScaleMode::Major, &mut rng);
            assert_eq!(q.options.len(), OPTION_COUNT);
            assert_eq!(q.options.iter().filter(|n| **n == q.correct_note).count(), 1);
            for (i, a) in q.options.iter().enumerate() {
                for b in &q.options[i + 1..] {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_single_key_always_chosen() {
        let mut rng = Pcg32::seed_from_u64(11);
        let settings = only(&[NoteName::Eb], DegreeMode::Chromatic);
        for _ in 0..10_000 {
            assert_eq!(generate(&settings, ScaleMode::Major, &mut rng).key_root, NoteName::Eb);
        }
    }

    #[test]
    fn test_c_major_diatonic() {
        let mut rng = Pcg32::seed_from_u64(3);
        let settings = only(&[NoteName::C], DegreeMode::Diatonic);
        let mut saw_fifth = false;
        for _ in 0..500 {
            let q = generate(&settings, ScaleMode::Major, &mut rng);
            assert_eq!(q.key_root, NoteName::C);
            assert_eq!(q.degree.accidental(), 0);
            if q.degree.step() == 5 {
                assert_eq!(q.correct_note, NoteName::G);
                saw_fifth = true;
            }
        }
        assert!(saw_fifth);
    }

    #[test]
    fn test_empty_keys_fall_back_to_all() {
        let mut rng = Pcg32::seed_from_u64(5);
        let settings = only(&[], DegreeMode::Diatonic);
        let mut roots = std::collections::HashSet::new();
        for _ in 0..1_000 {
            roots.insert(generate(&settings, ScaleMode::Major, &mut rng).key_root);
        }
        assert_eq!(roots.len(), 12);
    }

    #[test]
    fn test_answer_position_spread() {
        let mut rng = Pcg32::seed_from_u64(42);
        let mut slots = [0u32; OPTION_COUNT];
        for _ in 0..7_000 {
            let options = build_options(NoteName::A, &mut rng);
            let pos = options.iter().position(|n| *n == NoteName::A).unwrap();
            slots[pos] += 1;
        }
        // Expect ~1000 each
        assert!(slots.iter().all(|&count| (800..1200).contains(&count)), "{:?}", slots);
    }

    #[test]
    fn test_reshuffle_keeps_question() {
        let mut rng = Pcg32::seed_from_u64(9);
        let q = generate(&Settings::default(), ScaleMode::Major, &mut rng);
        let r = q.reshuffled(&mut rng);
        assert_eq!(r.key_root, q.key_root);
        assert_eq!(r.degree, q.degree);
        assert_eq!(r.correct_note, q.correct_note);
        assert!(r.options.contains(&q.correct_note));
    }

    #[test]
    fn test_prompt() {
        let q = Question {
            key_root: NoteName::D,
            degree: "b7".parse().unwrap(),
            mode: ScaleMode::Major,
            correct_note: NoteName::C,
            options: [NoteName::C; OPTION_COUNT],
        };
        assert_eq!(q.prompt(), "What is the b7 in the key of D major?");
    }
}
