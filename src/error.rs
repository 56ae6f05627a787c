use thiserror::Error;

/// Failure of a single capture-predict cycle.
///
/// Cycle errors are recorded in the live error slot and never end the
/// session. `Cancelled` is filtered out before it reaches the slot.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LiveError {
    #[error("Could not capture a frame from webcam: {0}")]
    Capture(String),

    #[error("Inference failed ({0})")]
    PredictionStatus(u16),

    #[error("Inference failed: {0}")]
    PredictionFailed(String),

    #[error("request cancelled")]
    Cancelled,
}

impl LiveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LiveError::Cancelled)
    }

    /// HTTP status of a rejected prediction, if that is what failed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LiveError::PredictionStatus(code) => Some(*code),
            _ => None,
        }
    }
}

/// Convenience Result alias for the live engine.
pub type LiveResult<T> = std::result::Result<T, LiveError>;
