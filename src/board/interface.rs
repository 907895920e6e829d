use crate::error::DriverError;
use crate::value::Value;
use std::fmt;

/// Opaque reference to a board memory location
///
/// Handles are resolved once per session and stay valid for the life of
/// that session; the board never relocates a variable once it is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hardware-reported state of the buffered capture channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Pending,
    Ready,
}

/// Synchronous driver interface of the real-time control board
///
/// Every call is a blocking round trip to the board. Implementations must be
/// shareable between the foreground caller and the statistics task.
pub trait Board: Send + Sync {
    /// Select the board this session talks to
    fn select(&self, board_id: u32) -> Result<(), DriverError>;

    /// Resolve a hierarchical variable address to a handle
    fn handle(&self, address: &str) -> Result<Handle, DriverError>;

    fn read(&self, handle: Handle) -> Result<Value, DriverError>;

    fn write(&self, handle: Handle, value: &Value) -> Result<(), DriverError>;

    /// Program the capture channel; `decimation` is the hardware factor (1 = every sample)
    fn configure_capture(
        &self,
        handles: &[Handle],
        sample_count: usize,
        decimation: u32,
    ) -> Result<(), DriverError>;

    /// One-shot start; `Ok(false)` means the board rejected the current configuration
    fn start_capture(&self) -> Result<bool, DriverError>;

    fn capture_status(&self) -> Result<CaptureStatus, DriverError>;

    /// Captured samples, one row per configured handle in configuration order
    fn fetch_captured(&self) -> Result<Vec<Vec<f64>>, DriverError>;
}
