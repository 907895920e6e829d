use super::interface::{Board, CaptureStatus, Handle};
use crate::error::DriverError;
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

const DEFAULT_CAPTURE_SAMPLES: usize = 16;

/// In-memory board for testing and development without real hardware
///
/// Variables must be declared with [`SimulatedBoard::with_value`] before a
/// handle can be resolved for them, mirroring a driver that only knows the
/// variables compiled into the running model.
pub struct SimulatedBoard {
    inner: Mutex<SimulatedState>,
    reads: AtomicU64,
    writes: AtomicU64,
    starts: AtomicU64,
    status_queries: AtomicU64,
}

#[derive(Default)]
struct SimulatedState {
    selected: Option<u32>,
    addresses: HashMap<String, Handle>,
    values: HashMap<Handle, Value>,
    failing_reads: HashSet<Handle>,
    capture: SimulatedCapture,
}

#[derive(Default)]
struct SimulatedCapture {
    handles: Vec<Handle>,
    sample_count: usize,
    decimation: u32,
    latency: usize,
    pending_checks: usize,
    stalled: bool,
    reject_start: bool,
    data_override: Option<Vec<Vec<f64>>>,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SimulatedState::default()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            starts: AtomicU64::new(0),
            status_queries: AtomicU64::new(0),
        }
    }

    /// Declare a board variable with its initial value
    pub fn with_value<V: Into<Value>>(self, address: &str, value: V) -> Self {
        self.set_value(address, value);
        self
    }

    /// Number of status checks that report `Pending` after each start
    pub fn with_capture_latency(self, checks: usize) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.capture.latency = checks;
            inner.capture.pending_checks = checks;
        }
        self
    }

    /// Overwrite (or declare) a variable directly, bypassing the driver counters
    pub fn set_value<V: Into<Value>>(&self, address: &str, value: V) {
        let mut inner = self.inner.lock();
        let next = Handle::new(inner.addresses.len() as u64 + 1);
        let handle = *inner.addresses.entry(address.to_string()).or_insert(next);
        inner.values.insert(handle, value.into());
    }

    /// Current value of a variable, bypassing the driver counters
    pub fn value(&self, address: &str) -> Option<Value> {
        let inner = self.inner.lock();
        let handle = inner.addresses.get(address)?;
        inner.values.get(handle).cloned()
    }

    /// Make subsequent reads of `address` fail until cleared
    pub fn fail_reads(&self, address: &str, failing: bool) {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.addresses.get(address).copied() {
            if failing {
                inner.failing_reads.insert(handle);
            } else {
                inner.failing_reads.remove(&handle);
            }
        }
    }

    /// Make the next start requests report a rejected configuration
    pub fn reject_start(&self, reject: bool) {
        self.inner.lock().capture.reject_start = reject;
    }

    /// Keep the capture channel pending forever
    pub fn stall_capture(&self, stalled: bool) {
        self.inner.lock().capture.stalled = stalled;
    }

    /// Return exactly this matrix from the next fetches
    pub fn set_capture_data(&self, rows: Vec<Vec<f64>>) {
        self.inner.lock().capture.data_override = Some(rows);
    }

    pub fn selected_board(&self) -> Option<u32> {
        self.inner.lock().selected
    }

    /// Last capture programming as `(handles, sample_count, decimation)`
    pub fn capture_configuration(&self) -> (Vec<Handle>, usize, u32) {
        let inner = self.inner.lock();
        (
            inner.capture.handles.clone(),
            inner.capture.sample_count,
            inner.capture.decimation,
        )
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn status_query_count(&self) -> u64 {
        self.status_queries.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for SimulatedBoard {
    fn select(&self, board_id: u32) -> Result<(), DriverError> {
        debug!("Simulated board {} selected", board_id);
        self.inner.lock().selected = Some(board_id);
        Ok(())
    }

    fn handle(&self, address: &str) -> Result<Handle, DriverError> {
        self.inner
            .lock()
            .addresses
            .get(address)
            .copied()
            .ok_or_else(|| DriverError::new("handle", format!("no variable at '{}'", address)))
    }

    fn read(&self, handle: Handle) -> Result<Value, DriverError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.lock();
        if inner.failing_reads.contains(&handle) {
            return Err(DriverError::new("read", format!("handle {} not responding", handle)));
        }
        inner
            .values
            .get(&handle)
            .cloned()
            .ok_or_else(|| DriverError::new("read", format!("invalid handle {}", handle)))
    }

    fn write(&self, handle: Handle, value: &Value) -> Result<(), DriverError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        match inner.values.get_mut(&handle) {
            Some(slot) => {
                trace!("Simulated write {} <- {:?}", handle, value);
                *slot = value.clone();
                Ok(())
            }
            None => Err(DriverError::new("write", format!("invalid handle {}", handle))),
        }
    }

    fn configure_capture(
        &self,
        handles: &[Handle],
        sample_count: usize,
        decimation: u32,
    ) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        if let Some(bad) = handles.iter().find(|h| !inner.values.contains_key(*h)) {
            return Err(DriverError::new(
                "configure_capture",
                format!("invalid handle {}", bad),
            ));
        }
        inner.capture.handles = handles.to_vec();
        inner.capture.sample_count = sample_count;
        inner.capture.decimation = decimation;
        Ok(())
    }

    fn start_capture(&self) -> Result<bool, DriverError> {
        self.starts.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        if inner.capture.reject_start {
            return Ok(false);
        }
        inner.capture.pending_checks = inner.capture.latency;
        Ok(true)
    }

    fn capture_status(&self) -> Result<CaptureStatus, DriverError> {
        self.status_queries.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        if inner.capture.stalled {
            return Ok(CaptureStatus::Pending);
        }
        if inner.capture.pending_checks > 0 {
            inner.capture.pending_checks -= 1;
            return Ok(CaptureStatus::Pending);
        }
        Ok(CaptureStatus::Ready)
    }

    fn fetch_captured(&self) -> Result<Vec<Vec<f64>>, DriverError> {
        let inner = self.inner.lock();
        if let Some(rows) = &inner.capture.data_override {
            return Ok(rows.clone());
        }

        let samples = if inner.capture.sample_count == 0 {
            DEFAULT_CAPTURE_SAMPLES
        } else {
            inner.capture.sample_count
        };

        // Each row ramps up from the variable's current (first) element
        let rows = inner
            .capture
            .handles
            .iter()
            .map(|handle| {
                let base = match inner.values.get(handle) {
                    Some(Value::Scalar(v)) => *v,
                    Some(Value::Vector(v)) => v.first().copied().unwrap_or(0.0),
                    None => 0.0,
                };
                (0..samples).map(|k| base + k as f64).collect()
            })
            .collect();
        Ok(rows)
    }
}
