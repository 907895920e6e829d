mod interface;
mod simulated;

pub use interface::{Board, CaptureStatus, Handle};
pub use simulated::SimulatedBoard;
