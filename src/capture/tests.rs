use super::*;
use crate::board::SimulatedBoard;
use crate::error::RigError;
use crate::registry::ParameterRegistry;
use crate::value::Value;
use std::sync::Arc;
use std::time::Duration;

fn create_test_controller(latency: usize) -> (Arc<SimulatedBoard>, CaptureController) {
    let board = Arc::new(
        SimulatedBoard::new()
            .with_value("Model/Accel", 1.0)
            .with_value("Model/Drive", 100.0)
            .with_capture_latency(latency),
    );
    let registry = Arc::new(ParameterRegistry::new(board.clone()));
    registry.register_direct("accel", "Model/Accel").unwrap();
    registry.register_direct("drive", "Model/Drive").unwrap();
    registry
        .register_computed("drive2", |a| Ok(Value::Scalar(a.get_scalar("drive")? * 2.0)))
        .unwrap();
    (board, CaptureController::new(registry))
}

fn fast_options() -> RunOptions {
    RunOptions {
        wait_period: Duration::from_millis(5),
        ..RunOptions::default()
    }
}

#[test]
fn test_configure_programs_board() {
    let (board, mut capture) = create_test_controller(0);
    assert_eq!(capture.state(), CaptureState::Idle);

    capture.configure(&["drive", "accel"], 500, 3).unwrap();

    let (handles, samples, decimation) = board.capture_configuration();
    assert_eq!(handles.len(), 2);
    assert_eq!(samples, 500);
    assert_eq!(decimation, 4);
    assert_eq!(capture.parameters(), ["drive", "accel"]);
    assert_eq!(capture.state(), CaptureState::Configured);
}

#[test]
fn test_configure_rejects_computed_parameter() {
    let (_board, mut capture) = create_test_controller(0);
    let err = capture.configure(&["accel", "drive2"], 0, 0).unwrap_err();
    assert!(matches!(err, RigError::UnknownStreamParameter { name } if name == "drive2"));
    assert_eq!(capture.state(), CaptureState::Idle);
    assert!(capture.parameters().is_empty());
}

#[test]
fn test_configure_rejects_unknown_parameter() {
    let (_board, mut capture) = create_test_controller(0);
    assert!(matches!(
        capture.configure(&["nope"], 0, 0),
        Err(RigError::UnknownParameter { .. })
    ));
}

#[test]
fn test_failed_reconfigure_keeps_previous_order() {
    let (_board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 10, 0).unwrap();
    assert!(capture.configure(&["drive2"], 10, 0).is_err());
    assert_eq!(capture.parameters(), ["accel"]);
}

#[test]
fn test_configure_rejects_unrepresentable_downsample() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 10, 1).unwrap();

    assert!(matches!(
        capture.configure(&["drive"], 10, u32::MAX),
        Err(RigError::InvalidDownsample { downsample: u32::MAX })
    ));
    // board keeps the earlier program
    assert_eq!(board.capture_configuration().2, 2);
    assert_eq!(capture.parameters(), ["accel"]);

    capture.configure(&["drive"], 10, u32::MAX - 1).unwrap();
    assert_eq!(board.capture_configuration().2, u32::MAX);
}

#[test]
fn test_start_rejected_by_board() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 10, 0).unwrap();
    board.reject_start(true);

    assert!(matches!(capture.start(), Err(RigError::StartCaptureFailed)));
    assert_eq!(capture.state(), CaptureState::Configured);
}

#[test]
fn test_poll_before_and_after_ready() {
    let (_board, mut capture) = create_test_controller(2);
    capture.configure(&["accel", "drive"], 4, 0).unwrap();
    capture.start().unwrap();
    assert_eq!(capture.state(), CaptureState::Capturing);

    assert_eq!(capture.poll(false).unwrap(), None);
    assert_eq!(capture.poll(false).unwrap(), None);

    let rows = capture.poll(false).unwrap().unwrap().into_matrix().unwrap();
    assert_eq!(
        rows,
        vec![vec![1.0, 2.0, 3.0, 4.0], vec![100.0, 101.0, 102.0, 103.0]]
    );
    assert_eq!(capture.state(), CaptureState::Idle);
}

#[test]
fn test_poll_as_struct_keys_by_configured_names() {
    let (_board, mut capture) = create_test_controller(0);
    capture.configure(&["drive", "accel"], 2, 0).unwrap();
    capture.start().unwrap();

    let labeled = capture.poll(true).unwrap().unwrap().into_labeled().unwrap();
    let mut keys: Vec<&str> = labeled.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["accel", "drive"]);
    assert_eq!(labeled["drive"], vec![100.0, 101.0]);
    assert_eq!(labeled["accel"], vec![1.0, 2.0]);
}

#[test]
fn test_poll_as_struct_row_count_mismatch() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["drive", "accel"], 2, 0).unwrap();
    capture.start().unwrap();
    board.set_capture_data(vec![vec![1.0, 2.0]]);

    assert!(matches!(
        capture.poll(true),
        Err(RigError::CaptureLabelMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_zero_sample_count_uses_board_default() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 0, 0).unwrap();
    assert_eq!(board.capture_configuration().1, 0);
    capture.start().unwrap();

    let rows = capture.poll(false).unwrap().unwrap().into_matrix().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_empty());
}

#[tokio::test]
async fn test_run_starts_waits_and_fetches() {
    let (board, mut capture) = create_test_controller(3);
    capture.configure(&["accel"], 3, 1).unwrap();

    let data = capture.run(&fast_options()).await.unwrap().unwrap();
    assert_eq!(data.row_count(), 1);
    assert_eq!(board.start_count(), 1);
    assert!(board.status_query_count() >= 4);
    assert_eq!(capture.metadata().unwrap().decimation, 2);
    assert!(capture.metadata().unwrap().started_at.is_some());
}

#[tokio::test]
async fn test_run_without_start_never_starts_hardware() {
    let (board, mut capture) = create_test_controller(1);
    capture.configure(&["accel", "drive"], 3, 0).unwrap();

    let options = RunOptions {
        start: false,
        as_struct: true,
        ..fast_options()
    };
    let data = capture.run(&options).await.unwrap().unwrap();

    assert_eq!(board.start_count(), 0);
    assert_eq!(data.row_count(), 2);
    assert!(data.into_labeled().is_some());
}

#[tokio::test]
async fn test_run_aborts_when_start_rejected() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 3, 0).unwrap();
    board.reject_start(true);

    assert!(matches!(
        capture.run(&fast_options()).await,
        Err(RigError::StartCaptureFailed)
    ));
    assert_eq!(board.status_query_count(), 0);
}

#[tokio::test]
async fn test_run_times_out_on_stalled_board() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 3, 0).unwrap();
    board.stall_capture(true);

    let options = RunOptions {
        timeout: Some(Duration::from_millis(50)),
        ..fast_options()
    };
    let err = capture.run(&options).await.unwrap_err();
    assert!(matches!(err, RigError::CaptureTimeout { waited_ms } if waited_ms >= 50));
    assert_eq!(capture.state(), CaptureState::Capturing);
}

#[tokio::test]
async fn test_run_rejects_zero_wait_period() {
    let (board, mut capture) = create_test_controller(0);
    capture.configure(&["accel"], 3, 0).unwrap();
    let options = RunOptions {
        wait_period: Duration::ZERO,
        ..RunOptions::default()
    };
    assert!(capture.run(&options).await.is_err());
    assert_eq!(board.start_count(), 0);
}
