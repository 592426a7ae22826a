// src/error.rs

//! Error taxonomy for fill, playback and reconfiguration operations.

/// Convenience result type used across the session API.
pub type FillResult<T> = Result<T, FillError>;

/// Errors surfaced by [`crate::session::WaveSession`] operations.
///
/// Every variant except `WorkerFault` and `Surface` is raised before the raster
/// is touched.
#[derive(thiserror::Error, Debug)]
pub enum FillError {
    /// Another fill, playback or reconfiguration is still running.
    #[error("locked: a {active} operation is already running")]
    LockConflict { active: &'static str },

    /// History index out of bounds, or `end < start`.
    #[error("invalid history range {start}..={end} (history holds {len} entries)")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// The fill color cannot be told apart from the blank or margin color.
    #[error("fill color {fill:?} is indistinguishable from the {against} color {other:?}")]
    ColorConflict {
        fill: [u8; 4],
        against: &'static str,
        other: [u8; 4],
    },

    /// Seed coordinate outside the raster.
    #[error("pixel ({x}, {y}) is outside the {width}x{height} raster")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker failed to initialize, crashed, or sent a message that does not
    /// fit the current operation.
    #[error("worker {worker} fault: {reason}")]
    WorkerFault { worker: usize, reason: String },

    /// The display surface refused a frame.
    #[error("display surface failed to present")]
    Surface(#[source] anyhow::Error),
}

impl FillError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn worker_fault(worker: usize, reason: impl Into<String>) -> Self {
        Self::WorkerFault {
            worker,
            reason: reason.into(),
        }
    }
}
