use thiserror::Error;

/// Failure reported by the board driver for a single call
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Board {operation} failed: {message}")]
pub struct DriverError {
    pub operation: &'static str,
    pub message: String,
}

impl DriverError {
    pub fn new<S: Into<String>>(operation: &'static str, message: S) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RigError {
    #[error("Parameter '{name}' is already registered")]
    NameAlreadyRegistered { name: String },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Parameter '{name}' is read-only")]
    ReadOnlyParameter { name: String },

    #[error("Parameter '{name}' cannot be captured: only board-backed parameters stream")]
    UnknownStreamParameter { name: String },

    #[error("Captured data has {actual} rows but {expected} parameters were configured")]
    CaptureLabelMismatch { expected: usize, actual: usize },

    #[error("Downsample factor {downsample} leaves no representable decimation")]
    InvalidDownsample { downsample: u32 },

    #[error("Board rejected the capture start request")]
    StartCaptureFailed,

    #[error("Capture still pending after {waited_ms}ms")]
    CaptureTimeout { waited_ms: u128 },

    #[error("Got {values} values for {names} parameter names")]
    LengthMismatch { names: usize, values: usize },

    #[error("Value of '{name}' is not a {expected}")]
    ValueShape { name: String, expected: &'static str },

    #[error("Harmonic vector '{signal}' has {actual} coefficients, expected {expected}")]
    HarmonicLengthMismatch {
        signal: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("System error: {message}")]
    System { message: String },
}

impl RigError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn unknown<S: Into<String>>(name: S) -> Self {
        Self::UnknownParameter { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, RigError>;
