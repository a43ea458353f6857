//! Error types shared by the engine, the host loop and the config loader.

use std::io;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// `play` was asked for a key the behavior graph does not contain.
    #[error("state \"{key}\" not found")]
    UnknownState { key: String },

    /// An animation state refers to a frame player the machine never registered.
    #[error("frame player index {index} not found ({registered} registered)")]
    UnknownFramePlayer { index: usize, registered: usize },

    /// A playback range that cannot be walked on its sheet.
    #[error("invalid playback range: {reason}")]
    InvalidRange { reason: String },

    /// Malformed pet description.
    #[error("invalid pet config: {0}")]
    Config(String),

    #[error("failed to parse pet config")]
    Json(#[from] serde_json::Error),

    #[error("failed to read pet config")]
    Io(#[from] io::Error),

    /// Drawing or placement failed for one tick.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl Error {
    /// Configuration errors stop the host; everything else is retried next tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Surface(_))
    }

    pub(crate) fn invalid_range(reason: impl Into<String>) -> Self {
        Error::InvalidRange {
            reason: reason.into(),
        }
    }
}

/// Failure reported by a [`crate::surface::RenderSurface`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface is not attached to a container")]
    Detached,
    #[error("sheet {0} has no texture on this surface")]
    MissingSheet(usize),
    #[error("draw failed: {0}")]
    Draw(String),
}
