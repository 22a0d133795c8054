//! The two deferred events a running session needs: the per-second countdown
//! tick and the advance after feedback.
//!
//! Timers are keyed on the session's generation. Whenever the session moves to
//! a new generation the old deadlines are dropped and new ones armed, so a
//! callback scheduled for a superseded question can never fire.

use std::time::{Duration, Instant};

use crate::session::{Phase, SessionState};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick,
    Advance(u64),
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    key: u64,
    due: Instant,
}

#[derive(Debug, Default)]
pub struct Timers {
    countdown: Option<Scheduled>,
    advance: Option<Scheduled>,
}

impl Timers {
    /// Re-arm or cancel to match the session after a transition.
    pub fn sync(
        &mut self,
        state: &SessionState,
        pending_advance: Option<u64>,
        feedback_delay: Duration,
        now: Instant,
    ) {
        self.countdown = match (state.phase, self.countdown) {
            (Phase::Running, Some(c)) if c.key == state.generation => Some(c),
            (Phase::Running, _) => Some(Scheduled {
                key: state.generation,
                due: now + TICK,
            }),
            _ => None,
        };
        self.advance = match (pending_advance, self.advance) {
            (Some(token), Some(a)) if a.key == token => Some(a),
            (Some(token), _) => Some(Scheduled {
                key: token,
                due: now + feedback_delay,
            }),
            (None, _) => None,
        };
    }

    /// Next event whose deadline has passed. Call repeatedly until `None`;
    /// a stalled loop gets one tick per elapsed second.
    pub fn due(&mut self, now: Instant) -> Option<TimerEvent> {
        if let Some(a) = self.advance {
            if a.due <= now {
                self.advance = None;
                return Some(TimerEvent::Advance(a.key));
            }
        }
        if let Some(c) = self.countdown.as_mut() {
            if c.due <= now {
                c.due += TICK;
                return Some(TimerEvent::Tick);
            }
        }
        None
    }

    /// Earliest armed deadline, for sizing the input poll.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.countdown, self.advance]
            .into_iter()
            .flatten()
            .map(|s| s.due)
            .min()
    }
}
