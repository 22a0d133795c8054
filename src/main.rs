mod degree;
mod error;
mod host;
mod note;
mod question;
mod repl;
mod session;
mod settings;
mod synth;
mod timer;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use tracing_subscriber::EnvFilter;

use degree::{DegreeMode, ScaleMode};
use session::{Rules, Session};
use settings::{FileStore, MemoryStore, Settings, SettingsStore};

const LOG_ENV: &str = "KEYDRILL_LOG";

#[derive(Parser)]
#[command(name = "keydrill", about = "Name the scale degree before the clock runs out")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play the drill in the terminal
    Play {
        #[command(flatten)]
        overrides: Overrides,

        /// Seed for a repeatable run
        #[arg(long)]
        seed: Option<u64>,

        /// No sound this run
        #[arg(long)]
        mute: bool,
    },

    /// Print some questions with their answers
    Ask {
        /// How many questions
        #[arg(long, short = 'n', default_value_t = 5)]
        count: u32,

        #[command(flatten)]
        overrides: Overrides,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Look up a degree in a key, e.g. `resolve D b7`
    Resolve {
        key: String,
        degree: String,

        /// Measure steps in the natural minor scale
        #[arg(long)]
        minor: bool,
    },

    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

/// Settings that can be overridden for one run without saving them.
#[derive(clap::Args)]
struct Overrides {
    /// Seconds per question (3-20)
    #[arg(long, value_parser = clap::value_parser!(u32).range(3..=20))]
    seconds: Option<u32>,

    /// Keys to drill, e.g. "C,G,D,F#"
    #[arg(long)]
    keys: Option<String>,

    /// Use the chromatic degree set
    #[arg(long)]
    chromatic: bool,

    /// Ask in natural minor
    #[arg(long)]
    minor: bool,
}

impl Overrides {
    fn apply(&self, mut settings: Settings) -> anyhow::Result<Settings> {
        if let Some(seconds) = self.seconds {
            settings.seconds_per_question = seconds;
        }
        if let Some(keys) = &self.keys {
            settings.keys_enabled = note::parse_key_list(keys)?;
        }
        if self.chromatic {
            settings.degree_mode = DegreeMode::Chromatic;
        }
        if self.minor {
            settings.scale_mode = ScaleMode::NaturalMinor;
        }
        Ok(settings.normalized())
    }
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the saved settings as JSON
    Show,
    /// Change saved settings
    Set {
        /// Keys to drill, e.g. "C,G,D"; "all" for every key
        #[arg(long)]
        keys: Option<String>,

        #[arg(long, value_parser = clap::value_parser!(u32).range(3..=20))]
        seconds: Option<u32>,

        #[arg(long)]
        degrees: Option<DegreeArg>,

        #[arg(long)]
        scale: Option<ScaleArg>,

        #[arg(long)]
        audio: Option<Toggle>,

        #[arg(long)]
        tick: Option<Toggle>,
    },
    /// Restore defaults
    Reset,
    /// Print where settings are stored
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
enum DegreeArg {
    Diatonic,
    Chromatic,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScaleArg {
    Major,
    Minor,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(t: Toggle) -> bool {
        matches!(t, Toggle::On)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(matches!(cli.command, Command::Play { .. }));

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Play {
            overrides,
            seed,
            mute,
        } => {
            let store = open_store();
            let mut settings = overrides.apply(settings::load_or_default(store.as_ref()))?;
            if mute {
                settings.audio_on = false;
            }
            let audio = if mute {
                synth::AudioEngine::silent()
            } else {
                synth::AudioEngine::open_or_silent()
            };
            let session = Session::new(settings, Rules::default(), rng(seed));
            repl::run(session, store, audio)
        }
        Command::Ask {
            count,
            overrides,
            seed,
        } => {
            let store = open_store();
            let settings = overrides.apply(settings::load_or_default(store.as_ref()))?;
            let mut rng = rng(seed);
            for i in 1..=count {
                let q = question::generate(&settings, settings.scale_mode, &mut rng);
                let choices: Vec<&str> = q.options.iter().map(|n| n.name()).collect();
                println!("{:>3}. {}", i, q.prompt());
                println!("     [{}]  answer: {}", choices.join(" "), q.correct_note);
            }
            Ok(())
        }
        Command::Resolve { key, degree, minor } => {
            let mode = if minor {
                ScaleMode::NaturalMinor
            } else {
                ScaleMode::Major
            };
            let note = degree::resolve(&key, &degree, mode)?;
            println!("{}  ({}4 = {:.2} Hz)", note, note, note.to_freq(4));
            Ok(())
        }
        Command::Settings { action } => run_settings(action),
    }
}

fn run_settings(action: SettingsAction) -> anyhow::Result<()> {
    let mut store = FileStore::in_config_dir().context("no config directory on this system")?;

    match action {
        SettingsAction::Show => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Set {
            keys,
            seconds,
            degrees,
            scale,
            audio,
            tick,
        } => {
            let mut settings = settings::load_or_default(&store);
            if let Some(keys) = keys {
                settings.keys_enabled = if keys.eq_ignore_ascii_case("all") {
                    note::NoteName::ALL.to_vec()
                } else {
                    note::parse_key_list(&keys)?
                };
            }
            if let Some(seconds) = seconds {
                settings.seconds_per_question = seconds;
            }
            if let Some(degrees) = degrees {
                settings.degree_mode = match degrees {
                    DegreeArg::Diatonic => DegreeMode::Diatonic,
                    DegreeArg::Chromatic => DegreeMode::Chromatic,
                };
            }
            if let Some(scale) = scale {
                settings.scale_mode = match scale {
                    ScaleArg::Major => ScaleMode::Major,
                    ScaleArg::Minor => ScaleMode::NaturalMinor,
                };
            }
            if let Some(audio) = audio {
                settings.audio_on = audio.into();
            }
            if let Some(tick) = tick {
                settings.tick_on = tick.into();
            }
            store.save(&settings)?;
            println!("{}", serde_json::to_string_pretty(&settings.normalized())?);
        }
        SettingsAction::Reset => {
            store.save(&Settings::default())?;
            println!("Settings reset to defaults.");
        }
        SettingsAction::Path => {
            println!("{}", store.path().display());
        }
    }
    Ok(())
}

fn open_store() -> Box<dyn SettingsStore> {
    match FileStore::in_config_dir() {
        Some(store) => Box::new(store),
        None => {
            tracing::warn!("no config directory; settings will not be saved");
            Box::new(MemoryStore::default())
        }
    }
}

fn rng(seed: Option<u64>) -> Pcg32 {
    match seed {
        Some(seed) => Pcg32::seed_from_u64(seed),
        None => Pcg32::from_entropy(),
    }
}

/// `KEYDRILL_LOG` sets the filter (default `warn`). The interactive screen owns
/// the terminal, so `play` logs to a file in the data directory instead.
fn init_logging(to_file: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let Some(dir) = settings::data_dir() else {
        return;
    };
    let path = dir.join("keydrill.log");
    let file = fs::create_dir_all(&dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
    });
    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(e) => eprintln!("Logging disabled: cannot open {}: {}", path.display(), e),
    }
}
