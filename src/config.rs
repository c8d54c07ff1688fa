//! Configuration for the IDE tracker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::capture::{DEFAULT_CODE_EXTENSIONS, DEFAULT_DEBOUNCE_INTERVAL, MIN_DEBOUNCE_INTERVAL};
use crate::probe::DEFAULT_PROBE_TIMEOUT;

/// Placeholder stored in `data_output_path` until the user picks a folder.
pub const DATA_OUTPUT_PLACEHOLDER: &str = "Select Data Output Folder";

/// Index of the gaze sensor toggle in [`Config::checkboxes`].
pub const SENSOR_TOGGLE: usize = 1;
/// Index of the screen capture toggle in [`Config::checkboxes`].
pub const SCREEN_CAPTURE_TOGGLE: usize = 2;

/// Main configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for session output, or the placeholder to use the
    /// project root
    pub data_output_path: String,

    /// Feature toggles: index 0 IDE events, 1 gaze sensor, 2 screen capture
    pub checkboxes: Vec<bool>,

    /// Interpreter used for probes and the gaze sensor script
    pub python_interpreter: String,

    /// Gaze sampling frequency in Hz
    pub sample_frequency: f64,

    /// Selected eye tracker; 0 is pointer-based simulation
    pub eye_tracker_device: u32,

    /// Labels offered for quick annotation during a session
    pub labels: Vec<String>,

    /// Extensions of files whose content is snapshotted
    pub code_extensions: Vec<String>,

    /// Upper bound for one availability probe (in seconds)
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,

    /// Period of the content-change debounce tick (in milliseconds)
    #[serde(with = "duration_millis")]
    pub debounce_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_output_path: DATA_OUTPUT_PLACEHOLDER.to_string(),
            checkboxes: vec![true, false, false],
            python_interpreter: "python3".to_string(),
            sample_frequency: 60.0,
            eye_tracker_device: 0,
            labels: Vec::new(),
            code_extensions: DEFAULT_CODE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            debounce_interval: DEFAULT_DEBOUNCE_INTERVAL,
        }
    }
}

impl Config {
    /// Whether a configuration file exists at `path`.
    pub fn exists_at(path: &Path) -> bool {
        path.is_file()
    }

    /// Load configuration from `path`. A missing file is an error.
    ///
    /// A debounce interval below [`MIN_DEBOUNCE_INTERVAL`] is raised to it.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.debounce_interval = config.debounce_interval.max(MIN_DEBOUNCE_INTERVAL);
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ide-tracker")
            .join("config.json")
    }

    pub fn sensor_enabled(&self) -> bool {
        self.toggle(SENSOR_TOGGLE)
    }

    pub fn screen_capture_enabled(&self) -> bool {
        self.toggle(SCREEN_CAPTURE_TOGGLE)
    }

    fn toggle(&self, index: usize) -> bool {
        self.checkboxes.get(index).copied().unwrap_or(false)
    }

    /// Base directory for session output: the configured path, or
    /// `project_root` when none was chosen.
    pub fn output_base(&self, project_root: &Path) -> PathBuf {
        let configured = self.data_output_path.trim();
        if configured.is_empty() || configured == DATA_OUTPUT_PLACEHOLDER {
            project_root.to_path_buf()
        } else {
            PathBuf::from(configured)
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration not found at {0}")]
    NotFound(PathBuf),

    #[error("configuration I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where the session coordinator reads configuration from.
///
/// The coordinator checks [`exists`](ConfigSource::exists) and then calls
/// [`load`](ConfigSource::load) at every start, so edits between sessions
/// take effect without a restart.
pub trait ConfigSource: Send + Sync {
    fn exists(&self) -> bool;

    fn load(&self) -> Result<Config, ConfigError>;

    /// Human-readable location, for messages.
    fn location(&self) -> String;
}

/// Configuration stored in a JSON file.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigSource {
    fn default() -> Self {
        Self::new(Config::config_path())
    }
}

impl ConfigSource for FileConfigSource {
    fn exists(&self) -> bool {
        Config::exists_at(&self.path)
    }

    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.path)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fixed in-memory configuration; `None` behaves like a missing file.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource(pub Option<Config>);

impl ConfigSource for StaticConfigSource {
    fn exists(&self) -> bool {
        self.0.is_some()
    }

    fn load(&self) -> Result<Config, ConfigError> {
        self.0
            .clone()
            .ok_or_else(|| ConfigError::NotFound(PathBuf::from(self.location())))
    }

    fn location(&self) -> String {
        "<in-memory>".to_string()
    }
}

/// Serde support for Duration as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
