use super::types::{CaptureData, CaptureMetadata, CaptureState, RunOptions};
use crate::board::{Board, CaptureStatus, Handle};
use crate::error::{Result, RigError};
use crate::registry::{Binding, ParameterRegistry};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hardware-timed buffered capture of board-backed parameters
///
/// Captures run on the board's own sample clock, so only Direct parameters
/// can be recorded. The controller remembers the last configured parameter
/// order to label fetched rows.
pub struct CaptureController {
    registry: Arc<ParameterRegistry>,
    state: CaptureState,
    metadata: Option<CaptureMetadata>,
}

impl CaptureController {
    pub fn new(registry: Arc<ParameterRegistry>) -> Self {
        Self {
            registry,
            state: CaptureState::Idle,
            metadata: None,
        }
    }

    fn board(&self) -> &Arc<dyn Board> {
        self.registry.board()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Parameters of the last successful configuration, in row order
    pub fn parameters(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.parameters.as_slice())
            .unwrap_or(&[])
    }

    pub fn metadata(&self) -> Option<&CaptureMetadata> {
        self.metadata.as_ref()
    }

    /// Program the capture channel
    ///
    /// `sample_count = 0` keeps the board default; the board decimates by
    /// `downsample + 1`, so `u32::MAX` is rejected. On failure the previous
    /// configuration is kept.
    pub fn configure(
        &mut self,
        parameters: &[&str],
        sample_count: usize,
        downsample: u32,
    ) -> Result<()> {
        let handles = parameters
            .iter()
            .map(|name| self.stream_handle(name))
            .collect::<Result<Vec<Handle>>>()?;

        let decimation = downsample
            .checked_add(1)
            .ok_or(RigError::InvalidDownsample { downsample })?;
        self.board()
            .configure_capture(&handles, sample_count, decimation)?;

        let metadata = CaptureMetadata {
            capture_id: Uuid::new_v4().to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            sample_count,
            decimation,
            configured_at: Utc::now(),
            started_at: None,
        };

        info!(
            "Capture {} configured: {:?}, {} samples, decimation {}",
            metadata.capture_id, metadata.parameters, sample_count, decimation
        );

        self.metadata = Some(metadata);
        self.state = CaptureState::Configured;
        Ok(())
    }

    /// Issue the one-shot hardware start
    pub fn start(&mut self) -> Result<()> {
        if self.state != CaptureState::Configured {
            debug!("Starting capture from state {:?}", self.state);
        }

        if !self.board().start_capture()? {
            warn!("Board rejected capture start");
            return Err(RigError::StartCaptureFailed);
        }

        if let Some(metadata) = self.metadata.as_mut() {
            metadata.started_at = Some(Utc::now());
        }
        self.state = CaptureState::Capturing;
        debug!("Capture started");
        Ok(())
    }

    /// Fetch the capture if the board has finished, without blocking
    ///
    /// Returns `Ok(None)` while the board still reports the capture pending.
    pub fn poll(&mut self, as_struct: bool) -> Result<Option<CaptureData>> {
        if self.board().capture_status()? == CaptureStatus::Pending {
            return Ok(None);
        }

        self.state = CaptureState::Ready;
        let rows = self.board().fetch_captured()?;
        debug!("Fetched {} capture rows", rows.len());

        let data = if as_struct {
            let parameters = self.parameters();
            if rows.len() != parameters.len() {
                return Err(RigError::CaptureLabelMismatch {
                    expected: parameters.len(),
                    actual: rows.len(),
                });
            }
            CaptureData::Labeled(parameters.iter().cloned().zip(rows).collect())
        } else {
            CaptureData::Matrix(rows)
        };

        self.state = CaptureState::Idle;
        Ok(Some(data))
    }

    /// Optionally start, wait for the board to finish, then fetch
    ///
    /// The wait sleeps cooperatively between status checks so other tasks
    /// keep running. Without `options.timeout` a board that never finishes
    /// keeps this future pending forever.
    pub async fn run(&mut self, options: &RunOptions) -> Result<Option<CaptureData>> {
        if options.wait_period.is_zero() {
            return Err(RigError::system("Capture wait period must be greater than 0"));
        }

        if options.start {
            self.start()?;
        }

        let began = Instant::now();
        loop {
            tokio::time::sleep(options.wait_period).await;
            if self.board().capture_status()? != CaptureStatus::Pending {
                break;
            }
            if let Some(timeout) = options.timeout {
                let waited = began.elapsed();
                if waited >= timeout {
                    warn!("Capture still pending after {:?}, giving up", waited);
                    return Err(RigError::CaptureTimeout {
                        waited_ms: waited.as_millis(),
                    });
                }
            }
        }

        self.poll(options.as_struct)
    }

    fn stream_handle(&self, name: &str) -> Result<Handle> {
        match self.registry.resolve(name)? {
            Binding::Direct { handle, .. } => Ok(handle),
            Binding::Computed(_) => Err(RigError::UnknownStreamParameter {
                name: name.to_string(),
            }),
        }
    }
}
