//! SDL2 + OpenGL host adapters for the parallax session runtime.

pub mod audio;
pub mod config;
pub mod host;
pub mod input;
pub mod rom_path;
pub mod video;

use parallax_core::error::{RenderError, SessionError};
use thiserror::Error;

pub use host::{Host, HostOptions, RendererFactory, run, standard_renderer};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("SDL: {0}")]
    Sdl(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    RomPath(#[from] rom_path::RomPathError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// Install the global `tracing` subscriber.
///
/// Honors `RUST_LOG`; defaults to `info`. Calling it twice is harmless.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
