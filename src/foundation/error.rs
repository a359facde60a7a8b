use crate::foundation::core::ProcessId;

/// Convenience result type used across sortlast.
pub type CompositeResult<T> = Result<T, CompositeError>;

/// Error taxonomy for setup, ordering and compositing.
///
/// The first four variants are advisory guards: they leave the context usable and are
/// reported to the caller of the failing operation without aborting anything.
#[derive(thiserror::Error, Debug)]
pub enum CompositeError {
    /// `setup` could not obtain a process group handle.
    #[error("process group unavailable; context left uninitialized")]
    MissingGroup,

    /// A composite call was issued before a successful `setup`.
    #[error("composite called without a valid context (setup has not succeeded)")]
    InvalidContext,

    /// The engine produced no color data on the coordinating rank.
    #[error("composition engine returned no color data on root rank {rank}")]
    EngineResultUnavailable {
        /// Rank that expected the result.
        rank: ProcessId,
    },

    /// The registry has no anchor for an id the visibility order needs.
    #[error("no centroid registered for process {id}")]
    MissingCentroid {
        /// Process id lacking an anchor.
        id: ProcessId,
    },

    /// Invalid caller-provided geometry, buffers or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure reported by the composition engine itself.
    #[error("engine error: {0}")]
    Engine(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositeError {
    /// Build a [`CompositeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompositeError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Whether this is one of the non-fatal guard conditions.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            Self::MissingGroup
                | Self::InvalidContext
                | Self::EngineResultUnavailable { .. }
                | Self::MissingCentroid { .. }
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
