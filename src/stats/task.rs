use super::engine::{RollingStatsEngine, TickReport};
use crate::error::{Result, RigError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters shared between the statistics task and its owner
#[derive(Debug)]
struct TaskCounters {
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
    dropped_firings: AtomicU64,
    restarts: AtomicU64,
    period_ms: AtomicU64,
    running: AtomicBool,
}

impl TaskCounters {
    fn new(period: Duration) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            failed_ticks: AtomicU64::new(0),
            dropped_firings: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            period_ms: AtomicU64::new(period.as_millis() as u64),
            running: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> TaskMetrics {
        TaskMetrics {
            ticks: self.ticks.load(Ordering::Relaxed),
            failed_ticks: self.failed_ticks.load(Ordering::Relaxed),
            dropped_firings: self.dropped_firings.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            period: Duration::from_millis(self.period_ms.load(Ordering::Relaxed)),
            running: self.running.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of statistics task activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMetrics {
    /// Completed ticks, including ones with failed reads
    pub ticks: u64,
    /// Ticks where at least one read failed
    pub failed_ticks: u64,
    /// Firings skipped because the previous tick was still running
    pub dropped_firings: u64,
    /// Restarts caused by forcing-frequency changes
    pub restarts: u64,
    pub period: Duration,
    pub running: bool,
}

/// Background task firing `RollingStatsEngine::tick` on a period
///
/// Ticks never overlap: a firing that comes due while a tick is still
/// running is dropped rather than queued. When a tick reports a new period
/// the schedule is stopped and started again with that period. Stopping is
/// cooperative and never interrupts a tick in progress. Dropping the task
/// stops it.
pub struct StatsTask {
    cancel: CancellationToken,
    counters: Arc<TaskCounters>,
    join: Option<JoinHandle<()>>,
}

impl StatsTask {
    /// Spawn the task on `runtime`, first firing one `period` from now
    pub fn start(engine: RollingStatsEngine, runtime: &Handle) -> Self {
        let period = engine.current_period();
        let cancel = CancellationToken::new();
        let counters = Arc::new(TaskCounters::new(period));
        counters.running.store(true, Ordering::Relaxed);

        info!("Starting statistics task with period {:?}", period);

        let join = runtime.spawn(run_schedule(
            engine,
            period,
            cancel.clone(),
            Arc::clone(&counters),
        ));

        Self {
            cancel,
            counters,
            join: Some(join),
        }
    }

    /// Disable future firings; a no-op when already stopped
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Stopping statistics task");
            self.cancel.cancel();
        }
    }

    /// Stop and wait for any in-flight tick to finish
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stop();
        if let Some(join) = self.join.take() {
            join.await
                .map_err(|e| RigError::system(format!("Statistics task failed: {}", e)))?;
            info!("Statistics task stopped");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.counters.running.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> TaskMetrics {
        self.counters.snapshot()
    }
}

impl Drop for StatsTask {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_schedule(
    mut engine: RollingStatsEngine,
    mut period: Duration,
    cancel: CancellationToken,
    counters: Arc<TaskCounters>,
) {
    'schedule: loop {
        let mut next_firing = Instant::now() + period;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'schedule,
                _ = tokio::time::sleep_until(next_firing) => {}
            }

            // Board calls block, so the tick runs on the blocking pool and
            // hands the engine back when done.
            let outcome = tokio::task::spawn_blocking(move || {
                let report = engine.tick();
                (engine, report)
            })
            .await;

            let report = match outcome {
                Ok((returned, report)) => {
                    engine = returned;
                    report
                }
                Err(e) => {
                    error!("Statistics tick panicked, task terminating: {}", e);
                    break 'schedule;
                }
            };

            record_tick(&counters, &report);

            // Firings that came due during the tick are dropped
            let now = Instant::now();
            next_firing += period;
            if now >= next_firing {
                let late = now - next_firing;
                let missed = (late.as_nanos() / period.as_nanos().max(1)) as u32 + 1;
                next_firing += period * missed;
                counters
                    .dropped_firings
                    .fetch_add(missed as u64, Ordering::Relaxed);
                debug!("Tick overran, dropped {} firing(s)", missed);
            }

            if let Some(new_period) = report.period_change {
                period = new_period;
                counters
                    .period_ms
                    .store(period.as_millis() as u64, Ordering::Relaxed);
                counters.restarts.fetch_add(1, Ordering::Relaxed);
                debug!("Restarting statistics schedule with period {:?}", period);
                continue 'schedule;
            }
        }
    }

    counters.running.store(false, Ordering::Relaxed);
}

fn record_tick(counters: &TaskCounters, report: &TickReport) {
    counters.ticks.fetch_add(1, Ordering::Relaxed);
    if !report.is_clean() {
        counters.failed_ticks.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Statistics tick had {} failed read(s), {} signal(s) updated",
            report.failures.len(),
            report.signals_updated
        );
    }
}
