use crate::readback::ReadbackError;
use std::path::PathBuf;

/// Convenience result type used across framepipe.
pub type FramepipeResult<T> = Result<T, FramepipeError>;

/// Top-level error taxonomy used by session and encoder APIs.
///
/// Only construction-time variants are ever returned from [`crate::EncoderSession`]
/// constructors. Per-frame conditions (`GpuReadback`, `QueueOverflow`, `PipeWrite`) are
/// logged and counted while the pipeline keeps running.
#[derive(thiserror::Error, Debug)]
pub enum FramepipeError {
    /// Invalid user-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// The encoder executable could not be located.
    #[error("encoder executable not found (searched: {})", display_paths(.searched))]
    ExecutableNotFound {
        /// Every location that was checked.
        searched: Vec<PathBuf>,
    },

    /// The graphics backend cannot perform asynchronous readback.
    #[error("unsupported platform feature: {0}")]
    UnsupportedPlatformFeature(String),

    /// A single frame's GPU readback failed.
    #[error("gpu readback error: {0}")]
    GpuReadback(#[from] ReadbackError),

    /// A submission was rejected because too many readbacks are outstanding.
    #[error("readback queue overflow: {max_in_flight} requests already in flight")]
    QueueOverflow {
        /// Configured in-flight limit.
        max_in_flight: usize,
    },

    /// Writing into the encoder's input stream failed.
    #[error("pipe write failure: {0}")]
    PipeWrite(String),

    /// The session was already closed.
    #[error("session is closed")]
    SessionClosed,

    /// Spawning, waiting on, or collecting output from the encoder failed.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramepipeError {
    /// Build a [`FramepipeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FramepipeError::UnsupportedPlatformFeature`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedPlatformFeature(msg.into())
    }

    /// Build a [`FramepipeError::PipeWrite`] value.
    pub fn pipe_write(msg: impl Into<String>) -> Self {
        Self::PipeWrite(msg.into())
    }

    /// Build a [`FramepipeError::Encoder`] value.
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Return `true` for errors that drop a single frame but leave the session running.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Self::GpuReadback(_) | Self::QueueOverflow { .. } | Self::PipeWrite(_)
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<nothing>".to_owned();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
