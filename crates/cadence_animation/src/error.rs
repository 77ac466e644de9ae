//! Playback error types

use crate::playback::PlaybackId;
use thiserror::Error;

/// Errors surfaced by the playback engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The playback was disposed (or never existed in this scheduler)
    #[error("playback {0:?} has been disposed")]
    Disposed(PlaybackId),

    /// A playback was requested as a different kind or value type than it holds
    #[error("playback {id:?} holds a `{expected}`, requested as `{found}`")]
    TypeMismatch {
        id: PlaybackId,
        expected: &'static str,
        found: &'static str,
    },

    /// A sequence or parallel has children the timeline math cannot handle
    #[error("malformed composite {composite:?}: {reason}")]
    Structural {
        composite: PlaybackId,
        reason: String,
    },

    /// `play()` was called before the required values were set
    #[error("playback {id:?} cannot play without {missing}")]
    Unconfigured {
        id: PlaybackId,
        missing: &'static str,
    },

    /// A composite-only operation was called on a leaf
    #[error("playback {0:?} is not a sequence or parallel")]
    NotAComposite(PlaybackId),

    /// A motion-only operation was called on a timer or composite
    #[error("playback {0:?} is not a motion")]
    NotAMotion(PlaybackId),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
