//! Hardware failure taxonomy.

use thiserror::Error;

/// Errors surfaced by modulator and camera operations.
///
/// During a run these are fatal for the individual being measured, not for
/// the run: the engine logs them, leaves the individual unevaluated, and
/// moves on.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// The modulator refused or failed an image write.
    #[error("modulator board {board} rejected an image of {len} bytes")]
    WriteRejected { board: usize, len: usize },

    /// A board index outside the modulator's range was addressed.
    #[error("modulator board {board} does not exist (device has {count})")]
    UnknownBoard { board: usize, count: usize },

    /// The camera produced no frame.
    #[error("camera acquisition returned no frame")]
    AcquisitionFailed,

    /// The camera produced fewer bytes than its geometry requires.
    #[error("camera frame incomplete: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Two evaluations reached the hardware at the same time.
    #[error("hardware channel is busy; concurrent evaluation detected")]
    ChannelBusy,

    /// The camera refused an exposure change.
    #[error("camera rejected exposure change to {requested_ms} ms")]
    ExposureRejected { requested_ms: f64 },
}
