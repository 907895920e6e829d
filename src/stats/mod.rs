mod engine;
mod history;
mod task;

pub use engine::{period_for_frequency, RollingStatsEngine, SnapshotSlot, TickReport};
pub use history::{HistoryBuffer, StatsSnapshot};
pub use task::{StatsTask, TaskMetrics};

/// Suffix of the computed parameter exposing a signal's running mean
pub const MEAN_SUFFIX: &str = "_ave";
/// Suffix of the computed parameter exposing a signal's running variance
pub const VARIANCE_SUFFIX: &str = "_var";
