//! The drill session: one endless run of questions against a lives pool.
//!
//! `Session` owns all game state and changes only through its transition
//! methods. It never draws or plays anything; every transition returns an
//! [`Outcome`] describing what happened and the host decides how to show it.
//!
//! Deferred work (the one-second countdown and the pause after feedback) is
//! driven from outside. Each time a new question goes live, the session locks,
//! ends or resets, the generation counter moves on; the host re-arms its timers
//! from it, and `advance` only accepts the token of the lock it was armed for.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::degree::DegreeMode;
use crate::error::DrillError;
use crate::note::NoteName;
use crate::question::{self, Question};
use crate::settings::{MAX_SECONDS, MIN_SECONDS, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing started yet (or explicitly reset)
    #[default]
    Ready,
    /// A question is live and the clock is running
    Running,
    /// Feedback is showing; input is ignored until the advance fires
    Locked,
    /// Out of lives; only `start` or `reset` leave this phase
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Ready => "ready",
            Phase::Running => "running",
            Phase::Locked => "locked",
            Phase::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    NoLivesLeft,
    TimedOut,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::NoLivesLeft => f.write_str("No lives left."),
            EndReason::TimedOut => f.write_str("Time out."),
        }
    }
}

/// Tunable progression rules.
///
/// A milestone of 0 disables that reward.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub starting_lives: u32,
    /// Every this many consecutive correct answers grants one extra life.
    pub bonus_life_every: u32,
    /// Every this many consecutive correct answers takes a second off the clock.
    pub speed_up_every: u32,
    pub min_seconds: u32,
    pub max_seconds: u32,
    /// Points for a correct answer before the streak bonus.
    pub score_base: u32,
    /// The streak bonus stops growing here.
    pub score_streak_cap: u32,
    /// How long feedback stays up before the next question.
    pub feedback_delay: Duration,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            starting_lives: 3,
            bonus_life_every: 10,
            speed_up_every: 20,
            min_seconds: MIN_SECONDS,
            max_seconds: MAX_SECONDS,
            score_base: 10,
            score_streak_cap: 10,
            feedback_delay: Duration::from_millis(450),
        }
    }
}

impl Rules {
    /// Seconds allowed per question once `speed_level` speed-ups have been earned.
    pub fn effective_seconds(&self, base: u32, speed_level: u32) -> u32 {
        base.saturating_sub(speed_level)
            .max(self.min_seconds)
            .min(self.max_seconds.max(self.min_seconds))
    }

    fn points_for(&self, streak: u32) -> u32 {
        self.score_base + streak.min(self.score_streak_cap)
    }
}

fn is_milestone(streak: u32, every: u32) -> bool {
    every > 0 && streak > 0 && streak % every == 0
}

/// Everything a frontend needs to draw the game.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub question_index: u32,
    pub current: Option<Question>,
    pub score: u32,
    pub streak: u32,
    pub lives: u32,
    pub max_lives: u32,
    /// Clock length of the live question
    pub question_seconds: u32,
    pub seconds_left: u32,
    pub speed_level: u32,
    pub end_reason: Option<EndReason>,
    pub generation: u64,
}

impl SessionState {
    /// How close the player is to losing, 0.0 (safe) to 1.0 (danger): the
    /// worse of the lives lost and the clock used up.
    pub fn risk(&self) -> f32 {
        if self.phase == Phase::Ready {
            return 0.0;
        }
        let lives_den = self.max_lives.max(1) as f32;
        let time_den = self.question_seconds.max(1) as f32;
        let risk_lives = (1.0 - self.lives as f32 / lives_den).clamp(0.0, 1.0);
        let risk_time = (1.0 - self.seconds_left as f32 / time_den).clamp(0.0, 1.0);
        risk_lives.max(risk_time)
    }
}

/// What a transition did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Started,
    Ticked {
        seconds_left: u32,
    },
    Correct {
        chosen: NoteName,
        streak: u32,
        points: u32,
        life_awarded: bool,
        sped_up: bool,
        lives: u32,
    },
    Wrong {
        chosen: NoteName,
        correct: NoteName,
        lives_left: u32,
    },
    TimedOut {
        correct: NoteName,
        lives_left: u32,
    },
    Skipped,
    Advanced,
    SettingsApplied {
        question_replaced: bool,
    },
    Reset,
}

/// How a status line should be coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Good,
    Bad,
}

impl Outcome {
    pub fn tone(&self) -> Tone {
        match self {
            Outcome::Correct { .. } => Tone::Good,
            Outcome::Wrong { .. } | Outcome::TimedOut { .. } => Tone::Bad,
            _ => Tone::Neutral,
        }
    }

    /// Status line text, or `None` when the previous status should stay up.
    pub fn message(&self) -> Option<String> {
        let text = match self {
            Outcome::Started => "Ready.".to_string(),
            Outcome::Ticked { .. } | Outcome::Advanced => return None,
            Outcome::Correct {
                chosen,
                life_awarded: true,
                lives,
                ..
            } => format!("Correct: {}, +1 life! (Lives: {})", chosen, lives),
            Outcome::Correct { chosen, streak, .. } => {
                format!("Correct: {} (Streak: {})", chosen, streak)
            }
            Outcome::Wrong {
                chosen,
                correct,
                lives_left: 0,
            } => format!("Wrong: {} (it was {}). {}", chosen, correct, EndReason::NoLivesLeft),
            Outcome::Wrong {
                chosen,
                correct,
                lives_left,
            } => format!("Wrong: {} (it was {}), lives left: {}", chosen, correct, lives_left),
            Outcome::TimedOut {
                correct,
                lives_left: 0,
            } => format!("{} It was {}. No lives left.", EndReason::TimedOut, correct),
            Outcome::TimedOut {
                correct,
                lives_left,
            } => format!("Time out (it was {}), lives left: {}", correct, lives_left),
            Outcome::Skipped => "Skipped.".to_string(),
            Outcome::SettingsApplied { .. } => "Settings saved.".to_string(),
            Outcome::Reset => "Ready.".to_string(),
        };
        Some(text)
    }
}

pub struct Session<R> {
    state: SessionState,
    rules: Rules,
    settings: Settings,
    rng: R,
    pending_advance: Option<u64>,
}

impl<R: Rng> Session<R> {
    pub fn new(settings: Settings, rules: Rules, rng: R) -> Self {
        Self {
            state: SessionState::default(),
            rules,
            settings: settings.normalized(),
            rng,
            pending_advance: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Token of the feedback advance the host should fire, if one is due.
    pub fn pending_advance(&self) -> Option<u64> {
        self.pending_advance
    }

    pub fn start(&mut self) -> Result<Outcome, DrillError> {
        if !matches!(self.state.phase, Phase::Ready | Phase::Ended) {
            return Err(self.invalid("start"));
        }

        let generation = self.state.generation;
        self.state = SessionState {
            lives: self.rules.starting_lives,
            max_lives: self.rules.starting_lives,
            generation,
            ..SessionState::default()
        };
        self.pending_advance = None;
        self.put_question();
        tracing::info!(lives = self.state.lives, "session started");
        Ok(Outcome::Started)
    }

    pub fn submit_answer(&mut self, chosen: NoteName) -> Result<Outcome, DrillError> {
        let correct = self.live_question("answer")?.correct_note;
        if chosen != correct {
            return Ok(self.miss(Some(chosen), correct));
        }

        let s = &mut self.state;
        s.streak += 1;
        let points = self.rules.points_for(s.streak);
        s.score += points;

        let life_awarded = is_milestone(s.streak, self.rules.bonus_life_every);
        if life_awarded {
            s.lives += 1;
            s.max_lives = s.max_lives.max(s.lives);
        }
        let sped_up = is_milestone(s.streak, self.rules.speed_up_every);
        if sped_up {
            s.speed_level += 1;
        }
        tracing::debug!(streak = s.streak, score = s.score, life_awarded, sped_up, "correct answer");

        let outcome = Outcome::Correct {
            chosen,
            streak: s.streak,
            points,
            life_awarded,
            sped_up,
            lives: s.lives,
        };
        self.lock();
        Ok(outcome)
    }

    /// The clock ran out on the live question.
    pub fn timeout(&mut self) -> Result<Outcome, DrillError> {
        let correct = self.live_question("timeout")?.correct_note;
        Ok(self.miss(None, correct))
    }

    /// One second elapsed on the live question.
    pub fn tick(&mut self) -> Result<Outcome, DrillError> {
        self.live_question("tick")?;
        self.state.seconds_left = self.state.seconds_left.saturating_sub(1);
        if self.state.seconds_left == 0 {
            return self.timeout();
        }
        Ok(Outcome::Ticked {
            seconds_left: self.state.seconds_left,
        })
    }

    /// Move on without answering; no penalty and the streak is kept.
    pub fn skip(&mut self) -> Result<Outcome, DrillError> {
        self.live_question("skip")?;
        self.state.question_index += 1;
        self.put_question();
        Ok(Outcome::Skipped)
    }

    /// The feedback pause is over: bring up the next question.
    pub fn advance(&mut self, token: u64) -> Result<Outcome, DrillError> {
        if self.state.phase != Phase::Locked || self.pending_advance != Some(token) {
            tracing::debug!(token, pending = ?self.pending_advance, "stale advance");
            return Err(self.invalid("advance"));
        }
        self.pending_advance = None;
        self.state.question_index += 1;
        self.put_question();
        Ok(Outcome::Advanced)
    }

    /// Adopt new settings. While feedback is showing the game moves on to a
    /// fresh question, as does a running question that no longer fits. A
    /// running question that still fits only gets new answer choices and
    /// keeps its clock. Score, streak and lives are untouched.
    pub fn apply_settings(&mut self, settings: Settings) -> Outcome {
        let settings = settings.normalized();
        let shape_changed = settings.keys_enabled != self.settings.keys_enabled
            || settings.degree_mode != self.settings.degree_mode
            || settings.scale_mode != self.settings.scale_mode
            || settings.seconds_per_question != self.settings.seconds_per_question;
        self.settings = settings;

        let live = matches!(self.state.phase, Phase::Running | Phase::Locked);
        if !live || !shape_changed {
            return Outcome::SettingsApplied {
                question_replaced: false,
            };
        }

        let still_fits = self.state.phase == Phase::Running
            && self.state.current.as_ref().is_some_and(|q| {
                self.settings.keys_enabled.contains(&q.key_root)
                    && fits_vocabulary(self.settings.degree_mode, q)
                    && q.mode == self.settings.scale_mode
            });
        if still_fits {
            self.reshuffle_options();
        } else {
            self.pending_advance = None;
            self.state.question_index += 1;
            self.put_question();
        }
        Outcome::SettingsApplied {
            question_replaced: !still_fits,
        }
    }

    /// Back to Ready from anywhere, dropping pending work. Resetting an
    /// already-ready session changes nothing.
    pub fn reset(&mut self) -> Outcome {
        if self.state.phase != Phase::Ready {
            let generation = self.state.generation + 1;
            self.state = SessionState {
                generation,
                ..SessionState::default()
            };
        }
        self.pending_advance = None;
        Outcome::Reset
    }

    fn live_question(&self, event: &'static str) -> Result<&Question, DrillError> {
        match (&self.state.phase, &self.state.current) {
            (Phase::Running, Some(q)) => Ok(q),
            _ => Err(self.invalid(event)),
        }
    }

    fn invalid(&self, event: &'static str) -> DrillError {
        DrillError::InvalidTransition {
            event,
            phase: self.state.phase,
        }
    }

    fn miss(&mut self, chosen: Option<NoteName>, correct: NoteName) -> Outcome {
        let s = &mut self.state;
        s.streak = 0;
        s.lives = s.lives.saturating_sub(1);
        let lives_left = s.lives;

        if lives_left == 0 {
            let reason = match chosen {
                Some(_) => EndReason::NoLivesLeft,
                None => EndReason::TimedOut,
            };
            self.end(reason);
        } else {
            self.lock();
        }

        match chosen {
            Some(chosen) => Outcome::Wrong {
                chosen,
                correct,
                lives_left,
            },
            None => Outcome::TimedOut {
                correct,
                lives_left,
            },
        }
    }

    /// New answer choices for the running question. The clock keeps going;
    /// it only shrinks if the new question length is shorter.
    fn reshuffle_options(&mut self) {
        let seconds = self
            .rules
            .effective_seconds(self.settings.seconds_per_question, self.state.speed_level);
        if let Some(q) = self.state.current.take() {
            self.state.current = Some(q.reshuffled(&mut self.rng));
        }
        let s = &mut self.state;
        s.question_seconds = seconds;
        s.seconds_left = s.seconds_left.min(seconds);
    }

    /// Make a fresh question live and restart the clock for it.
    fn put_question(&mut self) {
        let question = question::generate(&self.settings, self.settings.scale_mode, &mut self.rng);
        let seconds = self
            .rules
            .effective_seconds(self.settings.seconds_per_question, self.state.speed_level);
        let s = &mut self.state;
        s.current = Some(question);
        s.question_seconds = seconds;
        s.seconds_left = seconds;
        s.phase = Phase::Running;
        s.generation += 1;
    }

    fn lock(&mut self) {
        self.state.phase = Phase::Locked;
        self.state.generation += 1;
        self.pending_advance = Some(self.state.generation);
    }

    fn end(&mut self, reason: EndReason) {
        let s = &mut self.state;
        s.phase = Phase::Ended;
        s.end_reason = Some(reason);
        s.current = None;
        s.seconds_left = 0;
        s.generation += 1;
        self.pending_advance = None;
        tracing::info!(score = s.score, questions = s.question_index + 1, %reason, "session ended");
    }
}

fn fits_vocabulary(mode: DegreeMode, q: &Question) -> bool {
    mode.vocabulary().contains(&q.degree)
}
