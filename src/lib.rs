pub mod accessor;
pub mod board;
pub mod capture;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod stats;
pub mod value;

pub use accessor::RealtimeAccessor;
pub use board::{Board, CaptureStatus, Handle, SimulatedBoard};
pub use capture::{CaptureController, CaptureData, CaptureMetadata, CaptureState, RunOptions};
pub use config::{AveragingConfig, BoardConfig, CaptureConfig, ParameterEntry, RigConfig};
pub use error::{DriverError, Result, RigError};
pub use registry::{Binding, ComputeFn, ParameterRegistry};
pub use session::Session;
pub use stats::{
    period_for_frequency, HistoryBuffer, RollingStatsEngine, StatsSnapshot, StatsTask,
    TaskMetrics,
};
pub use value::{Reading, Selection, Value};
