//! Player settings and where they live.
//!
//! Settings are one small JSON record in the platform config directory. Loading
//! is forgiving: each field that is missing or malformed falls back to its own
//! default, so one bad value never throws away the rest of the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::degree::{DegreeMode, ScaleMode};
use crate::error::DrillError;
use crate::note::NoteName;

pub const MIN_SECONDS: u32 = 3;
pub const MAX_SECONDS: u32 = 20;

const FILE_NAME: &str = "keydrill_settings_v1.json";

/// What the player has chosen to drill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub keys_enabled: Vec<NoteName>,
    pub seconds_per_question: u32,
    pub degree_mode: DegreeMode,
    pub scale_mode: ScaleMode,
    pub audio_on: bool,
    pub tick_on: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keys_enabled: vec![NoteName::C],
            seconds_per_question: 8,
            degree_mode: DegreeMode::Diatonic,
            scale_mode: ScaleMode::Major,
            audio_on: true,
            tick_on: false,
        }
    }
}

impl Settings {
    /// Enforce the invariants every consumer relies on: at least one key
    /// (all twelve if the selection went empty), no duplicates, and a
    /// question length inside `[MIN_SECONDS, MAX_SECONDS]`.
    pub fn normalized(mut self) -> Self {
        let mut keys = Vec::with_capacity(self.keys_enabled.len());
        for key in self.keys_enabled {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            keys = NoteName::ALL.to_vec();
        }
        self.keys_enabled = keys;
        self.seconds_per_question = self.seconds_per_question.clamp(MIN_SECONDS, MAX_SECONDS);
        self
    }

    /// Build settings from an arbitrary JSON value, field by field.
    pub fn from_json(raw: &Value) -> Settings {
        let mut s = Settings::default();

        if let Some(keys) = raw.get("keys_enabled").and_then(Value::as_array) {
            s.keys_enabled = keys
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|k| k.parse::<NoteName>().ok())
                .collect();
        }
        if let Some(secs) = raw.get("seconds_per_question").and_then(Value::as_f64) {
            if secs.is_finite() {
                s.seconds_per_question = clamp_seconds(secs);
            }
        }
        if let Some(mode) = raw.get("degree_mode").cloned() {
            if let Ok(mode) = serde_json::from_value::<DegreeMode>(mode) {
                s.degree_mode = mode;
            }
        }
        if let Some(mode) = raw.get("scale_mode").cloned() {
            if let Ok(mode) = serde_json::from_value::<ScaleMode>(mode) {
                s.scale_mode = mode;
            }
        }
        if let Some(on) = raw.get("audio_on").and_then(Value::as_bool) {
            s.audio_on = on;
        }
        if let Some(on) = raw.get("tick_on").and_then(Value::as_bool) {
            s.tick_on = on;
        }

        s.normalized()
    }
}

/// Round to the nearest whole second, then clamp.
pub fn clamp_seconds(secs: f64) -> u32 {
    secs.round()
        .clamp(MIN_SECONDS as f64, MAX_SECONDS as f64) as u32
}

/// Where settings are read from and written to.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, DrillError>;
    fn save(&mut self, settings: &Settings) -> Result<(), DrillError>;
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform config directory, if one can be determined.
    pub fn in_config_dir() -> Option<Self> {
        config_dir().map(|dir| Self::new(dir.join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileStore {
    /// A missing file is not an error: it yields defaults. Unreadable files and
    /// files that are not JSON at all are reported so the caller can log them.
    fn load(&self) -> Result<Settings, DrillError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => {
                return Err(DrillError::PersistenceUnavailable(format!(
                    "reading {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        let raw: Value = serde_json::from_str(&content).map_err(|e| {
            DrillError::PersistenceUnavailable(format!("parsing {}: {}", self.path.display(), e))
        })?;
        Ok(Settings::from_json(&raw))
    }

    fn save(&mut self, settings: &Settings) -> Result<(), DrillError> {
        let settings = settings.clone().normalized();
        let unavailable =
            |e: &dyn std::fmt::Display| DrillError::PersistenceUnavailable(format!("{}: {}", self.path.display(), e));

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| unavailable(&e))?;
        }
        let json = serde_json::to_string_pretty(&settings).map_err(|e| unavailable(&e))?;
        fs::write(&self.path, json).map_err(|e| unavailable(&e))?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Keeps settings in memory only (used when no config directory exists).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    settings: Option<Settings>,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings, DrillError> {
        Ok(self.settings.clone().unwrap_or_default().normalized())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), DrillError> {
        self.settings = Some(settings.clone().normalized());
        Ok(())
    }
}

/// Platform config directory for keydrill.
///
/// On Linux: `~/.config/keydrill`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "keydrill", "keydrill")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Platform data directory (log file).
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "keydrill", "keydrill")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Load from the store, falling back to defaults when it is unavailable.
pub fn load_or_default(store: &dyn SettingsStore) -> Settings {
    match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("{}; using default settings", e);
            Settings::default()
        }
    }
}
