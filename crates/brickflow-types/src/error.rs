//! Unified error taxonomy for the pipeline runtime.
//!
//! Every failure surfaced by the executor falls into one of a fixed set of
//! classes. The classification drives recovery policy: validation and
//! configuration errors are fatal to the step, cancellation always propagates,
//! and everything else is eligible for try/except recovery and retry.

/// Unified error type for the pipeline runtime.
#[derive(Debug, thiserror::Error)]
pub enum BrickError {
    /// Evaluated arguments failed the brick's input schema. Fatal to the
    /// step, never retried; carries the offending property path.
    #[error("Invalid input for brick '{brick}' at '{property}': {message}")]
    InputValidation {
        brick: String,
        property: String,
        message: String,
    },

    /// A well-formed but semantically invalid situation raised intentionally
    /// by a brick (e.g. "row not found"). Eligible for try/except recovery.
    #[error("Brick '{brick}' error: {message}")]
    Business { brick: String, message: String },

    /// Malformed pipeline shape. Fatal, surfaced immediately, never retried.
    #[error("Pipeline configuration error: {0}")]
    Configuration(String),

    /// A pipeline references a brick id with no registered implementation.
    #[error("No brick registered for id '{id}'")]
    UnknownBrick { id: String },

    /// The shared abort signal fired. Always fatal and always propagates,
    /// bypassing try/except recovery and retry loops.
    #[error("Run cancelled")]
    Cancelled,

    /// Fallback when a retry loop exhausts its attempts without recording a
    /// concrete last error.
    #[error("Retries exhausted for brick '{brick}' after {attempts} attempts")]
    RetriesExhausted { brick: String, attempts: usize },

    /// Runaway-pipeline guard tripped.
    #[error("Step limit reached: {steps} steps")]
    StepLimitReached { steps: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl BrickError {
    /// Returns `true` if the error was raised by the shared abort signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BrickError::Cancelled)
    }

    /// Returns `true` if the error may be handled by a try/except brick or
    /// retried by a retry brick.
    ///
    /// Input validation, configuration and unknown-brick errors are fatal to
    /// the pipeline; cancellation propagates unconditionally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BrickError::Business { .. }
                | BrickError::Other(_)
                | BrickError::Io(_)
                | BrickError::Json(_)
                | BrickError::RetriesExhausted { .. }
        )
    }
}

/// A convenience alias for `Result<T, BrickError>`.
pub type Result<T> = std::result::Result<T, BrickError>;
