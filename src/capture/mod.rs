mod controller;
mod types;
#[cfg(test)]
mod tests;

pub use controller::CaptureController;
pub use types::{CaptureData, CaptureMetadata, CaptureState, RunOptions};
