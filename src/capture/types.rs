use crate::config::CaptureConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Capture controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Idle,
    Configured,
    Capturing,
    Ready,
}

/// Options for [`CaptureController::run`](super::CaptureController::run)
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Issue the hardware start before waiting
    pub start: bool,
    /// Sleep between status checks; must be non-zero
    pub wait_period: Duration,
    /// Key the result rows by parameter name
    pub as_struct: bool,
    /// Bound on the wait; `None` waits for as long as the board stays pending
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start: true,
            wait_period: Duration::from_millis(100),
            as_struct: false,
            timeout: None,
        }
    }
}

impl From<&CaptureConfig> for RunOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            start: config.start,
            wait_period: config.wait_period(),
            as_struct: config.as_struct,
            timeout: config.timeout(),
        }
    }
}

/// Fetched capture data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CaptureData {
    /// One row per configured parameter, in configuration order
    Matrix(Vec<Vec<f64>>),
    /// Rows keyed by parameter name
    Labeled(HashMap<String, Vec<f64>>),
}

impl CaptureData {
    pub fn row_count(&self) -> usize {
        match self {
            CaptureData::Matrix(rows) => rows.len(),
            CaptureData::Labeled(rows) => rows.len(),
        }
    }

    pub fn into_matrix(self) -> Option<Vec<Vec<f64>>> {
        match self {
            CaptureData::Matrix(rows) => Some(rows),
            CaptureData::Labeled(_) => None,
        }
    }

    pub fn into_labeled(self) -> Option<HashMap<String, Vec<f64>>> {
        match self {
            CaptureData::Labeled(rows) => Some(rows),
            CaptureData::Matrix(_) => None,
        }
    }
}

/// Description of the most recent capture configuration
#[derive(Debug, Clone, Serialize)]
pub struct CaptureMetadata {
    pub capture_id: String,
    pub parameters: Vec<String>,
    /// Requested sample count; 0 keeps the board default
    pub sample_count: usize,
    /// Hardware decimation factor (downsample + 1)
    pub decimation: u32,
    pub configured_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}
