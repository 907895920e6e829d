use super::history::{HistoryBuffer, StatsSnapshot};
use crate::accessor::RealtimeAccessor;
use crate::config::AveragingConfig;
use crate::error::{Result, RigError};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Published statistics slot, swapped whole by the engine and read lock-free
pub type SnapshotSlot = Arc<ArcSwap<StatsSnapshot>>;

/// Statistics period for a forcing frequency in Hz
///
/// `1/frequency` rounded to the millisecond, never shorter than `min_period`.
/// Returns `None` when the frequency gives no usable period (zero, negative
/// or not finite).
pub fn period_for_frequency(frequency: f64, min_period: Duration) -> Option<Duration> {
    if !(frequency > 0.0 && frequency.is_finite()) {
        return None;
    }
    let millis = (1000.0 / frequency).round();
    Some(Duration::from_millis(millis as u64).max(min_period))
}

struct TrackedSignal {
    name: String,
    history: HistoryBuffer,
    published: SnapshotSlot,
}

/// Outcome of one statistics update
#[derive(Debug, Default)]
pub struct TickReport {
    pub signals_updated: usize,
    pub failures: Vec<RigError>,
    /// New period when the forcing frequency changed this tick
    pub period_change: Option<Duration>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rolling mean/variance of harmonic-coefficient signals
///
/// Each tick appends the current vector of every tracked signal to its
/// history and republishes the statistics, then checks whether the forcing
/// frequency moved so the caller can reschedule.
pub struct RollingStatsEngine {
    accessor: RealtimeAccessor,
    signals: Vec<TrackedSignal>,
    frequency_parameter: String,
    last_frequency: Option<f64>,
    period: Duration,
    min_period: Duration,
    depth: usize,
}

impl RollingStatsEngine {
    /// Build an engine, sizing each history from the signal's current length
    pub fn new(accessor: RealtimeAccessor, config: &AveragingConfig) -> Result<Self> {
        config.validate()?;

        let mut signals = Vec::with_capacity(config.signals.len());
        for name in &config.signals {
            let width = accessor.get_one(name)?.as_vector(name)?.len();
            debug!(
                "Tracking '{}' with {} coefficients over {} samples",
                name, width, config.depth
            );
            signals.push(TrackedSignal {
                name: name.clone(),
                history: HistoryBuffer::new(config.depth, width),
                published: Arc::new(ArcSwap::from_pointee(StatsSnapshot::empty(width))),
            });
        }

        let min_period = config.min_period();
        let frequency = accessor.get_scalar(&config.frequency)?;
        let period = period_for_frequency(frequency, min_period).unwrap_or(min_period);

        Ok(Self {
            accessor,
            signals,
            frequency_parameter: config.frequency.clone(),
            last_frequency: Some(frequency),
            period,
            min_period,
            depth: config.depth,
        })
    }

    /// Period matching the last usable forcing frequency
    pub fn current_period(&self) -> Duration {
        self.period
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn last_frequency(&self) -> Option<f64> {
        self.last_frequency
    }

    /// Names and snapshot slots of the tracked signals, in configuration order
    pub fn slots(&self) -> Vec<(String, SnapshotSlot)> {
        self.signals
            .iter()
            .map(|s| (s.name.clone(), Arc::clone(&s.published)))
            .collect()
    }

    pub fn snapshot(&self, signal: &str) -> Option<Arc<StatsSnapshot>> {
        self.signals
            .iter()
            .find(|s| s.name == signal)
            .map(|s| s.published.load_full())
    }

    /// Run one statistics update
    ///
    /// A signal whose read fails keeps its history and published snapshot
    /// for this tick; the failure is returned in the report.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        for signal in &mut self.signals {
            match Self::sample(&self.accessor, signal) {
                Ok(sample) => {
                    signal.history.push(sample);
                    signal.published.store(Arc::new(signal.history.snapshot()));
                    report.signals_updated += 1;
                }
                Err(e) => {
                    warn!("Skipping '{}' this tick: {}", signal.name, e);
                    report.failures.push(e);
                }
            }
        }

        match self.accessor.get_scalar(&self.frequency_parameter) {
            Ok(frequency) => {
                if self.last_frequency != Some(frequency) {
                    self.last_frequency = Some(frequency);
                    match period_for_frequency(frequency, self.min_period) {
                        Some(period) => {
                            info!(
                                "Forcing frequency now {} Hz, statistics period {:?} -> {:?}",
                                frequency, self.period, period
                            );
                            self.period = period;
                            report.period_change = Some(period);
                        }
                        None => warn!(
                            "Forcing frequency {} Hz gives no period, keeping {:?}",
                            frequency, self.period
                        ),
                    }
                }
            }
            Err(e) => {
                warn!("Could not read forcing frequency: {}", e);
                report.failures.push(e);
            }
        }

        report
    }

    fn sample(accessor: &RealtimeAccessor, signal: &TrackedSignal) -> Result<Vec<f64>> {
        let sample = accessor.get_one(&signal.name)?.into_vector(&signal.name)?;
        if sample.len() != signal.history.width() {
            return Err(RigError::HarmonicLengthMismatch {
                signal: signal.name.clone(),
                expected: signal.history.width(),
                actual: sample.len(),
            });
        }
        Ok(sample)
    }
}
