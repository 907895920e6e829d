use crate::accessor::RealtimeAccessor;
use crate::board::Board;
use crate::capture::{CaptureController, CaptureData, RunOptions};
use crate::config::RigConfig;
use crate::error::{Result, RigError};
use crate::registry::ParameterRegistry;
use crate::stats::{
    RollingStatsEngine, SnapshotSlot, StatsSnapshot, StatsTask, TaskMetrics, MEAN_SUFFIX,
    VARIANCE_SUFFIX,
};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle as RuntimeHandle;
use tracing::{error, info};

/// One board session: handles, registry, statistics task and capture channel
///
/// All board handles are resolved once in [`Session::open`]. The statistics
/// task lives exactly as long as the session; it is stopped on `close`, on
/// drop, and when `open` fails after the task was started.
pub struct Session {
    config: RigConfig,
    registry: Arc<ParameterRegistry>,
    accessor: RealtimeAccessor,
    capture: CaptureController,
    stats: StatsTask,
    snapshots: HashMap<String, SnapshotSlot>,
}

impl Session {
    /// Bring up a session on `board` using the parameter catalogue in `config`
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(board: Arc<dyn Board>, config: RigConfig) -> Result<Self> {
        config.validate()?;

        let runtime = RuntimeHandle::try_current()
            .map_err(|e| RigError::system(format!("No tokio runtime for statistics task: {}", e)))?;

        info!("Opening session on board {}", config.board.id);
        board.select(config.board.id)?;

        let registry = Arc::new(ParameterRegistry::new(board));
        for entry in &config.parameters {
            registry.register_direct(&entry.name, &entry.address)?;
        }
        let accessor = RealtimeAccessor::new(Arc::clone(&registry));

        let engine = RollingStatsEngine::new(accessor.clone(), &config.averaging)?;
        let slots = engine.slots();

        // From here on any early return drops `stats`, which stops the task
        let stats = StatsTask::start(engine, &runtime);

        for (signal, slot) in &slots {
            if let Err(e) = register_snapshot_parameters(&registry, signal, slot) {
                error!("Session bring-up failed after statistics start: {}", e);
                return Err(e);
            }
        }

        let capture = CaptureController::new(Arc::clone(&registry));

        info!(
            "Session open: {} parameters, tracking {:?}",
            registry.len(),
            config.averaging.signals
        );

        Ok(Self {
            config,
            registry,
            accessor,
            capture,
            stats,
            snapshots: slots.into_iter().collect(),
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    pub fn accessor(&self) -> &RealtimeAccessor {
        &self.accessor
    }

    pub fn capture(&mut self) -> &mut CaptureController {
        &mut self.capture
    }

    pub fn stats_metrics(&self) -> TaskMetrics {
        self.stats.metrics()
    }

    /// Latest published statistics for a tracked signal
    pub fn snapshot(&self, signal: &str) -> Option<Arc<StatsSnapshot>> {
        self.snapshots.get(signal).map(|slot| slot.load_full())
    }

    /// `run` on the capture controller with the configured defaults
    pub async fn run_capture(&mut self) -> Result<Option<CaptureData>> {
        let options = RunOptions::from(&self.config.capture);
        self.capture.run(&options).await
    }

    /// Stop the statistics task and wait for an in-flight tick to finish
    pub async fn close(mut self) -> Result<()> {
        info!("Closing session on board {}", self.config.board.id);
        self.stats.shutdown().await
    }
}

fn register_snapshot_parameters(
    registry: &ParameterRegistry,
    signal: &str,
    slot: &SnapshotSlot,
) -> Result<()> {
    let mean = Arc::clone(slot);
    registry.register_computed(&format!("{}{}", signal, MEAN_SUFFIX), move |_| {
        Ok(Value::Vector(mean.load().mean.clone()))
    })?;

    let variance = Arc::clone(slot);
    registry.register_computed(&format!("{}{}", signal, VARIANCE_SUFFIX), move |_| {
        Ok(Value::Vector(variance.load().variance.clone()))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimulatedBoard;
    use crate::capture::CaptureState;
    use std::time::Duration;

    fn rig_board() -> Arc<SimulatedBoard> {
        Arc::new(
            SimulatedBoard::new()
                .with_value("Model/Sine/Frequency", 10.0)
                .with_value("Model/Harmonics/Disp", vec![1.0, 2.0, 3.0])
                .with_value("Model/Harmonics/Out", vec![4.0, 5.0, 6.0, 7.0, 8.0])
                .with_value("Model/Accel", 0.5),
        )
    }

    fn rig_config() -> RigConfig {
        let mut config = RigConfig::default();
        for (name, address) in [
            ("freq", "Model/Sine/Frequency"),
            ("disp_harm", "Model/Harmonics/Disp"),
            ("out_harm", "Model/Harmonics/Out"),
            ("accel", "Model/Accel"),
        ] {
            config.add_parameter(name, address);
        }
        config.averaging.depth = 3;
        config.capture.wait_period_seconds = 0.01;
        config
    }

    #[tokio::test]
    async fn test_open_registers_catalogue_and_statistics() {
        let board = rig_board();
        let session = Session::open(board.clone(), rig_config()).unwrap();

        assert_eq!(board.selected_board(), Some(0));
        assert_eq!(
            session.registry().computed_names(),
            vec!["disp_harm_ave", "disp_harm_var", "out_harm_ave", "out_harm_var"]
        );
        assert_eq!(session.registry().direct_names().len(), 4);
        assert!(session.stats_metrics().running);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_statistics_readable_through_accessor() {
        let session = Session::open(rig_board(), rig_config()).unwrap();

        // depth 3 at 10 Hz fills the history well within half a second
        tokio::time::sleep(Duration::from_millis(550)).await;

        let values = session
            .accessor()
            .get_many(&["disp_harm_ave", "disp_harm_var"])
            .unwrap();
        assert_eq!(values[0], Value::Vector(vec![1.0, 2.0, 3.0]));
        assert_eq!(values[1], Value::Vector(vec![0.0, 0.0, 0.0]));
        assert_eq!(session.snapshot("out_harm").unwrap().samples, 3);

        assert!(matches!(
            session.accessor().set_one("disp_harm_ave", vec![0.0; 3]),
            Err(RigError::ReadOnlyParameter { .. })
        ));

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_open_stops_statistics_task() {
        let board = rig_board();
        let mut config = rig_config();
        // collides with the computed mean registered after the task starts
        config.add_parameter("out_harm_ave", "Model/Accel");

        let err = Session::open(board.clone(), config).err().unwrap();
        assert!(matches!(err, RigError::NameAlreadyRegistered { name } if name == "out_harm_ave"));

        // let any tick already handed to the blocking pool finish
        tokio::time::sleep(Duration::from_millis(50)).await;
        let reads = board.read_count();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(board.read_count(), reads);
    }

    #[tokio::test]
    async fn test_unknown_address_fails_open() {
        let mut config = rig_config();
        config.add_parameter("ghost", "Model/Ghost");
        assert!(matches!(
            Session::open(rig_board(), config),
            Err(RigError::Driver(_))
        ));
    }

    #[tokio::test]
    async fn test_capture_through_session() {
        let board = rig_board();
        let mut config = rig_config();
        config.capture.as_struct = true;
        let mut session = Session::open(board.clone(), config).unwrap();

        session.capture().configure(&["accel"], 4, 0).unwrap();
        let data = session.run_capture().await.unwrap().unwrap();
        let labeled = data.into_labeled().unwrap();
        assert_eq!(labeled["accel"], vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(session.capture().state(), CaptureState::Idle);

        assert!(matches!(
            session.capture().configure(&["disp_harm_ave"], 4, 0),
            Err(RigError::UnknownStreamParameter { .. })
        ));

        session.close().await.unwrap();
    }

    #[test]
    fn test_open_requires_runtime() {
        assert!(matches!(
            Session::open(rig_board(), rig_config()),
            Err(RigError::System { .. })
        ));
    }
}
