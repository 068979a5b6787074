use std::path::PathBuf;

use thiserror::Error;

use crate::gamepak::MAX_ROM_SIZE;

/// Errors raised while building a [`GamePak`](crate::gamepak::GamePak).
///
/// Each violated ROM rule has its own variant so the host can show a
/// specific message.
#[derive(Debug, Error)]
pub enum GamePakError {
    #[error("ROM image is empty")]
    Empty,

    #[error("ROM size {size} is not a power of two")]
    NotPowerOfTwo { size: usize },

    #[error("ROM size {size} exceeds the {MAX_ROM_SIZE}-byte limit")]
    TooLarge { size: usize },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by the emulation engine boundary.
#[derive(Debug, Error)]
#[error("engine {operation} failed: {message}")]
pub struct EngineError {
    pub operation: &'static str,
    pub message: String,
}

impl EngineError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Errors surfaced by session lifecycle calls.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    GamePak(#[from] GamePakError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn tick thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Renderer lifecycle failure.
///
/// Transient failures are retried on the next frame; permanent ones take the
/// renderer out of service until it is swapped.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer not ready: {0}")]
    Transient(String),

    #[error("renderer unusable: {0}")]
    Permanent(String),
}

impl RenderError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}
