//! Session tuning knobs.
//!
//! The host deserializes these from a TOML file; every field has a default
//! so a partial (or missing) file is always valid.
//!
//! ```toml
//! tick_default_ms = 16
//! tick_max_ms = 50
//! auto_save = true
//! save_slots = 4
//! renderer = "interlaced"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which renderer variant the host installs at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererMode {
    /// Draw the emulated screen straight to the window.
    #[default]
    Direct,
    /// Side-by-side stereo image composited by an interlacer.
    Interlaced,
    /// Side-by-side stereo image handed to a stereoscopic display SDK.
    Sdk,
}

impl RendererMode {
    /// The next mode in cycling order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Direct => Self::Interlaced,
            Self::Interlaced => Self::Sdk,
            Self::Sdk => Self::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Nominal duration of one tick, in milliseconds.
    pub tick_default_ms: u64,
    /// Upper bound on the duration hint passed to the engine.
    pub tick_max_ms: u64,
    /// Whether `perform_auto_save` writes the `auto` slot.
    pub auto_save: bool,
    /// Number of numbered save-state slots exposed per pak.
    pub save_slots: u32,
    /// Root for per-pak data directories. `None` keeps data next to the ROM.
    pub data_dir: Option<PathBuf>,
    pub renderer: RendererMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_default_ms: 16,
            tick_max_ms: 50,
            auto_save: true,
            save_slots: 4,
            data_dir: None,
            renderer: RendererMode::Direct,
        }
    }
}

impl SessionConfig {
    pub fn tick_default(&self) -> Duration {
        Duration::from_millis(self.tick_default_ms)
    }

    /// Never shorter than [`tick_default`](Self::tick_default).
    pub fn tick_max(&self) -> Duration {
        Duration::from_millis(self.tick_max_ms.max(self.tick_default_ms))
    }
}
