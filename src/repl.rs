//! Interactive drill in the terminal.
//!
//! Raw mode on the alternate screen. The loop sleeps in `event::poll` until
//! either a key arrives or the next timer is due, so the countdown keeps
//! running while the player thinks.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use rand::Rng;

use crate::host::{Controller, Cue, Frontend, HostEvent, Status};
use crate::note::NoteName;
use crate::session::{Phase, Session, SessionState, Tone};
use crate::settings::{Settings, SettingsStore};
use crate::synth::AudioEngine;

/// Longest we block on input before checking timers again.
const POLL_CAP: Duration = Duration::from_millis(50);
const BAR_WIDTH: u32 = 20;

/// Run the drill until the player quits.
pub fn run<R: Rng>(
    session: Session<R>,
    store: Box<dyn SettingsStore>,
    audio: AudioEngine,
) -> anyhow::Result<()> {
    let mut stdout = io::stdout();

    terminal::enable_raw_mode().context("failed to enable raw mode")?;
    execute!(stdout, EnterAlternateScreen, Hide).context("alternate screen")?;

    let screen = Screen { out: stdout, audio };
    let mut controller = Controller::new(session, store, screen);
    controller.refresh();

    let result = event_loop(&mut controller);

    // Restore terminal
    let out = &mut controller.frontend_mut().out;
    let _ = execute!(out, Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop<R: Rng>(controller: &mut Controller<Screen, R>) -> anyhow::Result<()> {
    loop {
        controller.poll(Instant::now());

        let wait = controller.idle_budget(Instant::now(), POLL_CAP);
        if !event::poll(wait).context("event poll error")? {
            continue;
        }

        match event::read().context("event read error")? {
            Event::Key(key) => match key_action(key, controller.session().settings()) {
                Some(Action::Quit) => return Ok(()),
                Some(Action::Host(ev)) => controller.handle(ev, Instant::now()),
                None => {}
            },
            Event::Resize(..) => controller.refresh(),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Host(HostEvent),
    Quit,
}

/// Map a key press to what it asks for. Settings keys produce a whole new
/// settings value derived from the current one.
fn key_action(key: KeyEvent, settings: &Settings) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(Action::Quit);
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char(c @ '1'..='7') => {
            let slot = c.to_digit(10)? as usize - 1;
            Some(Action::Host(HostEvent::AnswerSlot(slot)))
        }
        KeyCode::Char('n') | KeyCode::Enter => Some(Action::Host(HostEvent::NewGame)),
        KeyCode::Char('s') => Some(Action::Host(HostEvent::Skip)),
        KeyCode::Char('r') => Some(Action::Host(HostEvent::Reset)),
        KeyCode::Char('m') => changed(settings, |s| s.degree_mode = s.degree_mode.toggled()),
        KeyCode::Char('k') => changed(settings, |s| s.scale_mode = s.scale_mode.toggled()),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            changed(settings, |s| s.seconds_per_question = s.seconds_per_question.saturating_add(1))
        }
        KeyCode::Char('-') => {
            changed(settings, |s| s.seconds_per_question = s.seconds_per_question.saturating_sub(1))
        }
        KeyCode::Char('t') => changed(settings, |s| s.tick_on = !s.tick_on),
        KeyCode::Char('a') => changed(settings, |s| s.audio_on = !s.audio_on),
        _ => None,
    }
}

fn changed(settings: &Settings, edit: impl FnOnce(&mut Settings)) -> Option<Action> {
    let mut next = settings.clone();
    edit(&mut next);
    Some(Action::Host(HostEvent::SettingsChanged(next)))
}

/// The terminal as a frontend: draws full frames and plays cues.
struct Screen {
    out: io::Stdout,
    audio: AudioEngine,
}

impl Frontend for Screen {
    fn render(&mut self, state: &SessionState, settings: &Settings, status: &Status) {
        let lines = layout(state, settings, status);
        if let Err(e) = draw(&mut self.out, &lines) {
            tracing::warn!("draw failed: {}", e);
        }
    }

    fn cue(&mut self, cue: Cue) {
        self.audio.play_cue(cue);
    }
}

fn draw(out: &mut io::Stdout, lines: &[(Option<Color>, String)]) -> io::Result<()> {
    queue!(out, Clear(ClearType::All))?;
    for (row, (color, text)) in lines.iter().enumerate() {
        queue!(out, MoveTo(0, row as u16))?;
        match color {
            Some(color) => queue!(out, SetForegroundColor(*color), Print(text), ResetColor)?,
            None => queue!(out, Print(text))?,
        }
    }
    out.flush()
}

/// Screen contents, one entry per row.
fn layout(state: &SessionState, settings: &Settings, status: &Status) -> Vec<(Option<Color>, String)> {
    let mut lines = vec![
        (Some(Color::Cyan), "keydrill".to_string()),
        (None, settings_line(settings)),
        (None, "─".repeat(60)),
    ];

    if state.phase != Phase::Ready {
        lines.push((
            None,
            format!(
                "Lives: {}/{}   Streak: {}   Score: {}   Speed: {}   Question {}",
                state.lives,
                state.max_lives,
                state.streak,
                state.score,
                state.speed_level,
                state.question_index + 1
            ),
        ));
        lines.push((Some(risk_color(state.risk())), timer_bar(state)));
    }
    lines.push((None, String::new()));

    match (&state.current, state.phase) {
        (_, Phase::Ready) => {
            lines.push((None, "Press n to start.".to_string()));
        }
        (_, Phase::Ended) => {
            let reason = state.end_reason.map(|r| r.to_string()).unwrap_or_default();
            lines.push((Some(Color::Red), format!("Game over. {}", reason)));
            lines.push((None, format!("Final score: {}. Press n to play again.", state.score)));
        }
        (Some(q), _) => {
            lines.push((Some(Color::White), q.prompt()));
            lines.push((None, String::new()));
            lines.push((None, options_line(&q.options)));
        }
        (None, _) => {}
    }

    lines.push((None, String::new()));
    let status_color = match status.tone {
        Tone::Neutral => None,
        Tone::Good => Some(Color::Green),
        Tone::Bad => Some(Color::Red),
    };
    lines.push((status_color, status.text.clone()));
    lines.push((None, String::new()));
    lines.push((
        Some(Color::DarkGrey),
        "1-7 answer  n new  s skip  r reset  m degrees  k major/minor  +/- seconds  t tick  a sound  q quit"
            .to_string(),
    ));
    lines
}

fn settings_line(settings: &Settings) -> String {
    let keys = if settings.keys_enabled.len() == NoteName::ALL.len() {
        "all".to_string()
    } else {
        settings
            .keys_enabled
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(" ")
    };
    let on_off = |on: bool| if on { "on" } else { "off" };
    format!(
        "Keys: {}  |  {}  |  {}  |  {}s  |  sound {}  tick {}",
        keys,
        settings.degree_mode,
        settings.scale_mode.label(),
        settings.seconds_per_question,
        on_off(settings.audio_on),
        on_off(settings.tick_on)
    )
}

fn options_line(options: &[NoteName]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, note)| format!("{}) {:<3}", i + 1, note.name()))
        .collect::<Vec<_>>()
        .join("  ")
}

fn timer_bar(state: &SessionState) -> String {
    let total = state.question_seconds.max(1);
    let filled = (state.seconds_left.min(total) * BAR_WIDTH / total) as usize;
    format!(
        "Time: {:>2}s [{}{}]",
        state.seconds_left,
        "#".repeat(filled),
        " ".repeat(BAR_WIDTH as usize - filled)
    )
}

fn risk_color(risk: f32) -> Color {
    if risk < 0.34 {
        Color::Green
    } else if risk < 0.67 {
        Color::Yellow
    } else {
        Color::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degree::{DegreeMode, ScaleMode};
    use crate::session::EndReason;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn text(lines: &[(Option<Color>, String)]) -> String {
        lines.iter().map(|(_, l)| l.as_str()).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_answer_keys() {
        let s = Settings::default();
        assert_eq!(
            key_action(press(KeyCode::Char('1')), &s),
            Some(Action::Host(HostEvent::AnswerSlot(0)))
        );
        assert_eq!(
            key_action(press(KeyCode::Char('7')), &s),
            Some(Action::Host(HostEvent::AnswerSlot(6)))
        );
        assert_eq!(key_action(press(KeyCode::Char('8')), &s), None);
        assert_eq!(key_action(press(KeyCode::Char('0')), &s), None);
    }

    #[test]
    fn test_quit_keys() {
        let s = Settings::default();
        assert_eq!(key_action(press(KeyCode::Esc), &s), Some(Action::Quit));
        assert_eq!(key_action(press(KeyCode::Char('q')), &s), Some(Action::Quit));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_action(ctrl_c, &s), Some(Action::Quit));
    }

    #[test]
    fn test_settings_keys() {
        let s = Settings::default();
        let Some(Action::Host(HostEvent::SettingsChanged(next))) =
            key_action(press(KeyCode::Char('m')), &s)
        else {
            panic!("m should change settings");
        };
        assert_eq!(next.degree_mode, DegreeMode::Chromatic);
        assert_eq!(next.keys_enabled, s.keys_enabled);

        let Some(Action::Host(HostEvent::SettingsChanged(next))) =
            key_action(press(KeyCode::Char('k')), &s)
        else {
            panic!("k should change settings");
        };
        assert_eq!(next.scale_mode, ScaleMode::NaturalMinor);

        let Some(Action::Host(HostEvent::SettingsChanged(next))) =
            key_action(press(KeyCode::Char('-')), &s)
        else {
            panic!("- should change settings");
        };
        assert_eq!(next.seconds_per_question, 7);
    }

    #[test]
    fn test_release_ignored() {
        let mut key = press(KeyCode::Char('n'));
        key.kind = KeyEventKind::Release;
        assert_eq!(key_action(key, &Settings::default()), None);
    }

    #[test]
    fn test_layout_ready() {
        let status = Status {
            tone: Tone::Neutral,
            text: "Ready.".into(),
        };
        let out = text(&layout(&SessionState::default(), &Settings::default(), &status));
        assert!(out.contains("Press n to start."));
        assert!(out.contains("Keys: C  |  diatonic  |  major  |  8s"));
        assert!(!out.contains("Lives:"));
    }

    #[test]
    fn test_layout_ended() {
        let state = SessionState {
            phase: Phase::Ended,
            score: 42,
            max_lives: 3,
            end_reason: Some(EndReason::TimedOut),
            ..SessionState::default()
        };
        let status = Status {
            tone: Tone::Bad,
            text: "Time out. It was G. No lives left.".into(),
        };
        let lines = layout(&state, &Settings::default(), &status);
        let out = text(&lines);
        assert!(out.contains("Game over. Time out."));
        assert!(out.contains("Final score: 42"));
        assert!(lines.iter().any(|(c, l)| *c == Some(Color::Red) && l.starts_with("Time out.")));
    }

    #[test]
    fn test_options_line() {
        let line = options_line(&[NoteName::C, NoteName::FSharp]);
        assert_eq!(line, "1) C    2) F# ");
    }

    #[test]
    fn test_timer_bar() {
        let state = SessionState {
            phase: Phase::Running,
            question_seconds: 8,
            seconds_left: 4,
            ..SessionState::default()
        };
        assert_eq!(timer_bar(&state), format!("Time:  4s [{}{}]", "#".repeat(10), " ".repeat(10)));
    }

    #[test]
    fn test_risk_color() {
        assert_eq!(risk_color(0.0), Color::Green);
        assert_eq!(risk_color(0.5), Color::Yellow);
        assert_eq!(risk_color(1.0), Color::Red);
    }
}
