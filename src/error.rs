//! Engine error taxonomy.
//!
//! Setup problems surface as [`EngineError`] from the composition root.
//! Everything that can go wrong inside a tick is deliberately *not* here:
//! not-ready subsystems no-op silently, and scene/processor faults are
//! caught and logged at their boundary. No failure halts the frame loop.

use thiserror::Error;

/// Errors surfaced while assembling or starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No mount point names the presentation surface host. The engine logs
    /// and stays inert rather than crashing.
    #[error("no mount point configured for the presentation surface")]
    MountMissing,

    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Errors from the marker-tracking subsystem's startup. Format details of
/// the calibration and pattern files belong to the tracker implementation;
/// the bridge only relays what went wrong.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("failed to load camera calibration '{path}': {reason}")]
    Calibration { path: String, reason: String },

    #[error("failed to load marker pattern '{path}': {reason}")]
    Pattern { path: String, reason: String },
}

/// Errors from the vision runtime collaborator.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("frame decode failed: {0}")]
    Decode(String),
}
