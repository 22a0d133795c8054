//! Glue between a session and whatever shows it.
//!
//! The controller owns the session, its timers and the settings store. Input
//! arrives as [`HostEvent`]s; after every transition the [`Frontend`] is asked
//! to repaint and, when sound is on, to play a [`Cue`]. Events that arrive in
//! the wrong phase are logged and dropped.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::DrillError;
use crate::note::NoteName;
use crate::session::{Outcome, Phase, Session, SessionState, Tone};
use crate::settings::{Settings, SettingsStore};
use crate::timer::{TimerEvent, Timers};

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Start,
    /// Abandon any game in progress and start over.
    NewGame,
    Answer(NoteName),
    /// Answer with the note on button `n` (0-based).
    AnswerSlot(usize),
    Skip,
    Reset,
    Tick,
    Advance(u64),
    SettingsChanged(Settings),
}

impl From<TimerEvent> for HostEvent {
    fn from(ev: TimerEvent) -> Self {
        match ev {
            TimerEvent::Tick => HostEvent::Tick,
            TimerEvent::Advance(token) => HostEvent::Advance(token),
        }
    }
}

/// Sounds the frontend may play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Correct,
    Wrong,
    Tick,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub tone: Tone,
    pub text: String,
}

impl Status {
    fn neutral(text: &str) -> Self {
        Self {
            tone: Tone::Neutral,
            text: text.to_string(),
        }
    }
}

pub trait Frontend {
    /// Called after every transition with the full state to draw.
    fn render(&mut self, state: &SessionState, settings: &Settings, status: &Status);
    fn cue(&mut self, cue: Cue);
}

pub struct Controller<F, R> {
    session: Session<R>,
    timers: Timers,
    store: Box<dyn SettingsStore>,
    frontend: F,
    status: Status,
}

impl<F: Frontend, R: Rng> Controller<F, R> {
    pub fn new(session: Session<R>, store: Box<dyn SettingsStore>, frontend: F) -> Self {
        Self {
            session,
            timers: Timers::default(),
            store,
            frontend,
            status: Status::neutral("Ready. Press n to begin."),
        }
    }

    pub fn session(&self) -> &Session<R> {
        &self.session
    }

    #[cfg(test)]
    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    #[cfg(test)]
    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    /// Repaint without a transition (first frame, terminal resize).
    pub fn refresh(&mut self) {
        self.frontend
            .render(self.session.state(), self.session.settings(), &self.status);
    }

    pub fn handle(&mut self, event: HostEvent, now: Instant) {
        tracing::trace!(?event, "host event");
        match self.dispatch(event) {
            Ok(outcome) => self.after(outcome, now),
            Err(e) => tracing::warn!("ignored: {}", e),
        }
    }

    /// Fire every timer that is due by `now`.
    pub fn poll(&mut self, now: Instant) {
        while let Some(ev) = self.timers.due(now) {
            self.handle(ev.into(), now);
        }
    }

    /// How long the host may block waiting for input.
    pub fn idle_budget(&self, now: Instant, cap: Duration) -> Duration {
        match self.timers.next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(now).min(cap),
            None => cap,
        }
    }

    fn dispatch(&mut self, event: HostEvent) -> Result<Outcome, DrillError> {
        let session = &mut self.session;
        match event {
            HostEvent::Start => session.start(),
            HostEvent::NewGame => {
                if matches!(session.state().phase, Phase::Running | Phase::Locked) {
                    session.reset();
                }
                session.start()
            }
            HostEvent::Answer(note) => session.submit_answer(note),
            HostEvent::AnswerSlot(slot) => {
                let note = session
                    .state()
                    .current
                    .as_ref()
                    .and_then(|q| q.options.get(slot).copied());
                match note {
                    Some(note) => session.submit_answer(note),
                    None => Err(DrillError::InvalidTransition {
                        event: "answer",
                        phase: session.state().phase,
                    }),
                }
            }
            HostEvent::Skip => session.skip(),
            HostEvent::Reset => Ok(session.reset()),
            HostEvent::Tick => session.tick(),
            HostEvent::Advance(token) => session.advance(token),
            HostEvent::SettingsChanged(settings) => {
                let settings = settings.normalized();
                if let Err(e) = self.store.save(&settings) {
                    tracing::warn!("{}; keeping settings for this run only", e);
                }
                Ok(session.apply_settings(settings))
            }
        }
    }

    fn after(&mut self, outcome: Outcome, now: Instant) {
        let feedback_delay = self.session.rules().feedback_delay;
        self.timers.sync(
            self.session.state(),
            self.session.pending_advance(),
            feedback_delay,
            now,
        );

        if let Some(text) = outcome.message() {
            self.status = Status {
                tone: outcome.tone(),
                text,
            };
        }
        if let Some(cue) = cue_for(&outcome, self.session.settings()) {
            self.frontend.cue(cue);
        }
        self.refresh();
    }
}

/// Which sound an outcome makes, given the sound toggles.
pub fn cue_for(outcome: &Outcome, settings: &Settings) -> Option<Cue> {
    if !settings.audio_on {
        return None;
    }
    match outcome {
        Outcome::Correct { .. } => Some(Cue::Correct),
        Outcome::Wrong { .. } | Outcome::TimedOut { .. } => Some(Cue::Wrong),
        Outcome::Ticked { .. } if settings.tick_on => Some(Cue::Tick),
        _ => None,
    }
}
