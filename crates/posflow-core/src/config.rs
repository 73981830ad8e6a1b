//! User settings (settings.yaml in the user config directory).
//!
//! Every field has a default; the file only needs the values it overrides.
//! Settings are validated once at load time and never read ad hoc mid-run.

use crate::MAX_CLICK_JITTER;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid setting `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Get the config directory for posflow.
pub fn config_dir() -> PathBuf {
    let base = dirs_next::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("posflow")
}

/// Get the data directory for posflow (macros, templates).
pub fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("posflow")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub execution: ExecutionSettings,
    pub hotkeys: HotkeySettings,
    pub ocr: OcrSettings,
    pub logging: LoggingSettings,
    /// Directory of reference images for `wait_for_template`.
    pub templates_dir: Option<PathBuf>,
    /// Directory of saved macros.
    pub macros_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub default_loop_count: u32,
    pub dry_run: bool,
    /// Treat a `wait_for_*` timeout as "skip this action" instead of aborting.
    pub continue_on_timeout: bool,
    /// Longest uninterrupted sleep between signal checks.
    pub check_interval_ms: u64,
    /// How long a paused run blocks on the signal channel per wake-up.
    pub pause_poll_ms: u64,
    /// Gap between loop iterations.
    pub inter_loop_delay_ms: u64,
    /// Each delay is scaled by a random factor in `[1 - r, 1 + r]`.
    pub delay_jitter_ratio: f64,
    /// Click jitter radius (pixels) for clicks that don't set their own.
    pub default_click_jitter: Option<u32>,
    /// Seed for jitter; equal seeds give equal coordinates across runs.
    pub jitter_seed: Option<u64>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_loop_count: 1,
            dry_run: false,
            continue_on_timeout: false,
            check_interval_ms: 50,
            pause_poll_ms: 100,
            inter_loop_delay_ms: 100,
            delay_jitter_ratio: 0.0,
            default_click_jitter: None,
            jitter_seed: None,
        }
    }
}

impl ExecutionSettings {
    /// Never zero, so chunked sleeps always make progress.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }

    pub fn inter_loop_delay(&self) -> Duration {
        Duration::from_millis(self.inter_loop_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_loop_count == 0 {
            return Err(invalid("execution.default_loop_count", "must be at least 1"));
        }
        if self.check_interval_ms == 0 {
            return Err(invalid("execution.check_interval_ms", "must be positive"));
        }
        if self.pause_poll_ms == 0 {
            return Err(invalid("execution.pause_poll_ms", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.delay_jitter_ratio) {
            return Err(invalid(
                "execution.delay_jitter_ratio",
                format!("{} is outside [0, 1)", self.delay_jitter_ratio),
            ));
        }
        if let Some(radius) = self.default_click_jitter.filter(|r| *r > MAX_CLICK_JITTER) {
            return Err(invalid(
                "execution.default_click_jitter",
                format!("{radius} exceeds {MAX_CLICK_JITTER} px"),
            ));
        }
        Ok(())
    }
}

/// Global hotkeys, each a list of key names such as `["ctrl", "f8"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub start_stop: Vec<String>,
    pub pause_resume: Vec<String>,
    pub kill: Vec<String>,
    pub emergency_stop: Vec<String>,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        let keys = |k: &[&str]| k.iter().map(|s| s.to_string()).collect();
        Self {
            start_stop: keys(&["ctrl", "f8"]),
            pause_resume: keys(&["ctrl", "f9"]),
            kill: keys(&["ctrl", "shift", "esc"]),
            emergency_stop: keys(&["esc"]),
        }
    }
}

impl HotkeySettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bindings = [
            ("hotkeys.start_stop", &self.start_stop),
            ("hotkeys.pause_resume", &self.pause_resume),
            ("hotkeys.kill", &self.kill),
            ("hotkeys.emergency_stop", &self.emergency_stop),
        ];
        for (field, keys) in bindings {
            if keys.is_empty() || keys.iter().any(|k| k.trim().is_empty()) {
                return Err(invalid(field, "binding needs at least one non-empty key"));
            }
        }
        Ok(())
    }
}

/// HTTP text recognition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_sec: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8000".to_string(),
            timeout_sec: 10,
        }
    }
}

impl OcrSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Also write a daily rolling log file under the config directory.
    pub file: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
        }
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

impl Settings {
    /// Path of the default settings file.
    pub fn default_path() -> PathBuf {
        config_dir().join("settings.yaml")
    }

    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let settings = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_file(&path)?
                } else {
                    debug!("No settings.yaml found, using defaults");
                    Settings::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    fn load_file(path: &Path) -> Result<Settings, ConfigError> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        info!(?path, "Loaded settings");
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        info!(?path, "Saved settings");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.execution.validate()?;
        self.hotkeys.validate()?;
        if self.ocr.enabled && self.ocr.base_url.trim().is_empty() {
            return Err(invalid("ocr.base_url", "required when OCR is enabled"));
        }
        Ok(())
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("templates"))
    }

    pub fn macros_dir(&self) -> PathBuf {
        self.macros_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("macros"))
    }

    pub fn log_dir(&self) -> PathBuf {
        config_dir().join("logs")
    }
}
