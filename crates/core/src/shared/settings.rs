use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{APP_DIR_NAME, DEFAULT_MAX_BUFFER_LEN, DEFAULT_WINDOW_SIZE};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Remote caption-generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    /// Never written back to disk; normally supplied via `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub cache_ttl_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            api_key: String::new(),
            timeout_ms: 4000,
            temperature: 0.2,
            cache_ttl_ms: 5000,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() || self.endpoint.starts_with("http://localhost")
    }
}

/// Every tunable of the recognition and translation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window_size: usize,
    pub max_buffer_len: usize,
    /// Minimum share of window frames that must carry a hand.
    pub min_hand_fraction: f64,
    /// Mean wrist displacement per frame, in frame widths.
    pub motion_threshold: f64,
    pub ema_alpha: f64,
    pub ambiguity_gap: f64,
    pub ambiguity_penalty: f64,
    pub prototype_max_distance: f64,
    pub smoothing_history: usize,
    pub confidence_low: f64,
    pub confidence_high: f64,
    pub min_bias_count: u32,
    /// Predictions below this are dropped before smoothing.
    pub confidence_floor: Option<f64>,
    pub session_idle_timeout_secs: Option<u64>,
    pub ack_corrections: bool,
    pub model_dir: Option<PathBuf>,
    pub llm: LlmSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            min_hand_fraction: 0.3,
            motion_threshold: 0.003,
            ema_alpha: 0.4,
            ambiguity_gap: 0.05,
            ambiguity_penalty: 0.75,
            prototype_max_distance: 1.2,
            smoothing_history: 5,
            confidence_low: 0.55,
            confidence_high: 0.80,
            min_bias_count: 2,
            confidence_floor: None,
            session_idle_timeout_secs: None,
            ack_corrections: true,
            model_dir: None,
            llm: LlmSettings::default(),
        }
    }
}

impl Settings {
    /// Platform config file: `<config dir>/SignCall/settings.json`.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads settings, then applies environment overrides and validates.
    ///
    /// An explicit `path` must exist and parse. Without one, the platform
    /// config file is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|name| std::env::var(name).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Overrides from the deployment environment. Unparseable numbers are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = var("LLM_MODEL").filter(|m| !m.is_empty()) {
            self.llm.model = model;
        }
        if let Some(v) = var("CONF_HIGH").and_then(|v| v.parse().ok()) {
            self.confidence_high = v;
        }
        if let Some(v) = var("CONF_MED").and_then(|v| v.parse().ok()) {
            self.confidence_low = v;
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.window_size < 2 {
            return Err(SettingsError::Invalid(format!(
                "window_size must be >= 2, got {}",
                self.window_size
            )));
        }
        if self.max_buffer_len < self.window_size {
            return Err(SettingsError::Invalid(format!(
                "max_buffer_len ({}) must be >= window_size ({})",
                self.max_buffer_len, self.window_size
            )));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(SettingsError::Invalid(format!(
                "ema_alpha must be in (0, 1], got {}",
                self.ema_alpha
            )));
        }
        if self.confidence_low > self.confidence_high {
            return Err(SettingsError::Invalid(format!(
                "confidence_low ({}) exceeds confidence_high ({})",
                self.confidence_low, self.confidence_high
            )));
        }
        if self.smoothing_history == 0 {
            return Err(SettingsError::Invalid(
                "smoothing_history must be >= 1".to_string(),
            ));
        }
        if self.prototype_max_distance <= 0.0 {
            return Err(SettingsError::Invalid(
                "prototype_max_distance must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        self.session_idle_timeout_secs.map(Duration::from_secs)
    }
}
