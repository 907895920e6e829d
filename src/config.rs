use crate::error::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RigConfig {
    pub board: BoardConfig,
    /// Board-backed parameter catalogue, registered in order
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
    pub averaging: AveragingConfig,
    pub capture: CaptureConfig,
}

/// One board-backed parameter
///
/// The name is kept as a value rather than a table key so its case survives
/// loading.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ParameterEntry {
    pub name: String,
    /// Hierarchical board address
    pub address: String,
}

impl ParameterEntry {
    pub fn new<N: Into<String>, A: Into<String>>(name: N, address: A) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BoardConfig {
    /// Board index passed to the driver on session start
    #[serde(default = "default_board_id")]
    pub id: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AveragingConfig {
    /// Number of harmonic vectors kept per tracked signal
    #[serde(default = "default_averaging_depth")]
    pub depth: usize,

    /// Upper bound on the statistics update rate in Hz
    #[serde(default = "default_max_rate_hz")]
    pub max_rate_hz: f64,

    /// Harmonic-vector parameters to track
    #[serde(default = "default_tracked_signals")]
    pub signals: Vec<String>,

    /// Parameter holding the current forcing frequency in Hz
    #[serde(default = "default_frequency_parameter")]
    pub frequency: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Issue the hardware start from `run`
    #[serde(default = "default_run_start")]
    pub start: bool,

    /// Sleep between capture status checks in seconds
    #[serde(default = "default_wait_period_seconds")]
    pub wait_period_seconds: f64,

    /// Return captures keyed by parameter name
    #[serde(default)]
    pub as_struct: bool,

    /// Give up waiting for a capture after this many seconds; unbounded when unset
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
}

impl AveragingConfig {
    /// Shortest allowed statistics period
    ///
    /// Only meaningful once [`AveragingConfig::validate`] has passed.
    pub fn min_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_rate_hz)
    }

    /// Validate averaging values
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.depth < 2 {
            return Err(ConfigError::Message(
                "Averaging depth must be at least 2 for a sample variance".to_string(),
            ));
        }

        if !(self.max_rate_hz > 0.0 && self.max_rate_hz.is_finite()) {
            return Err(ConfigError::Message(
                "Averaging max_rate_hz must be a positive number".to_string(),
            ));
        }

        if self.frequency.is_empty() {
            return Err(ConfigError::Message(
                "Averaging frequency parameter must be named".to_string(),
            ));
        }

        Ok(())
    }
}

impl CaptureConfig {
    pub fn wait_period(&self) -> Duration {
        Duration::from_secs_f64(self.wait_period_seconds)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs_f64)
    }
}

impl RigConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from_file("rigbridge.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("board.id", default_board_id())?
            .set_default("averaging.depth", default_averaging_depth() as i64)?
            .set_default("averaging.max_rate_hz", default_max_rate_hz())?
            .set_default("averaging.signals", default_tracked_signals())?
            .set_default("averaging.frequency", default_frequency_parameter())?
            .set_default("capture.start", default_run_start())?
            .set_default(
                "capture.wait_period_seconds",
                default_wait_period_seconds(),
            )?
            .set_default("capture.as_struct", false)?
            .add_source(File::with_name(&path_str).required(false))
            // Nested keys use a double underscore, e.g. RIGBRIDGE_AVERAGING__DEPTH
            .add_source(
                Environment::with_prefix("RIGBRIDGE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: RigConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.averaging.validate()?;

        if let Some(entry) = self.parameters.iter().find(|p| p.name.is_empty()) {
            return Err(ConfigError::Message(format!(
                "Parameter with address '{}' has an empty name",
                entry.address
            )));
        }

        if !(self.capture.wait_period_seconds > 0.0 && self.capture.wait_period_seconds.is_finite())
        {
            return Err(ConfigError::Message(
                "Capture wait_period_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(timeout) = self.capture.timeout_seconds {
            if !(timeout > 0.0 && timeout.is_finite()) {
                return Err(ConfigError::Message(
                    "Capture timeout_seconds must be greater than 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Append a board-backed parameter to the catalogue
    pub fn add_parameter<N: Into<String>, A: Into<String>>(&mut self, name: N, address: A) {
        self.parameters.push(ParameterEntry::new(name, address));
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig {
                id: default_board_id(),
            },
            parameters: Vec::new(),
            averaging: AveragingConfig {
                depth: default_averaging_depth(),
                max_rate_hz: default_max_rate_hz(),
                signals: default_tracked_signals(),
                frequency: default_frequency_parameter(),
            },
            capture: CaptureConfig {
                start: default_run_start(),
                wait_period_seconds: default_wait_period_seconds(),
                as_struct: false,
                timeout_seconds: None,
            },
        }
    }
}

// Default value functions
fn default_board_id() -> u32 {
    0
}

fn default_averaging_depth() -> usize {
    5
}
fn default_max_rate_hz() -> f64 {
    10.0
}
fn default_tracked_signals() -> Vec<String> {
    vec!["disp_harm".to_string(), "out_harm".to_string()]
}
fn default_frequency_parameter() -> String {
    "freq".to_string()
}

fn default_run_start() -> bool {
    true
}
fn default_wait_period_seconds() -> f64 {
    0.1
}
