//! Boundary to the opaque emulation engine.
//!
//! The engine does its own internal synchronization: every method takes
//! `&self` and may be called from the control, tick or render thread. The
//! runtime only guarantees that `tick` has a single caller at a time and that
//! `destroy` runs exactly once, after which the handle turns every call into
//! a no-op.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::RendererMode;
use crate::error::EngineError;
use crate::input::{InputSink, InputState};

/// Operations the runtime consumes from an emulation core.
pub trait EmulationEngine: Send + Sync + 'static {
    /// Install a ROM image and its battery-backed save memory.
    fn load(&self, rom: &[u8], save_memory: &[u8]) -> Result<(), EngineError>;

    fn unload(&self);

    fn save_state(&self, path: &Path) -> Result<(), EngineError>;

    fn load_state(&self, path: &Path) -> Result<(), EngineError>;

    fn reset(&self);

    /// Advance emulation by roughly `hint`. Returns the virtual time actually
    /// progressed.
    fn tick(&self, hint: Duration) -> Duration;

    /// Copy the cartridge's save memory into `buffer`.
    fn read_save_memory(&self, buffer: &mut [u8]);

    /// Latch a new button mask. Atomic from the engine's point of view.
    fn update_input(&self, state: InputState);

    fn start_audio(&self) {}

    fn stop_audio(&self) {}

    /// Move up to `buffer.len()` produced mono samples into `buffer`,
    /// returning how many were written. Engines without audio write none.
    fn fill_audio(&self, _buffer: &mut [i16]) -> usize {
        0
    }

    // Per-variant video hooks. The engine draws the emulated screen (or the
    // side-by-side stereo pair) into whatever framebuffer is bound.

    fn surface_created(&self, _mode: RendererMode) {}

    fn surface_changed(&self, _mode: RendererMode, _width: u32, _height: u32) {}

    fn draw_frame(&self, _mode: RendererMode) {}

    fn destroy_renderer(&self, _mode: RendererMode) {}

    fn resume_renderer(&self, _mode: RendererMode) {}

    /// Release the native engine. Called exactly once by [`EngineHandle`].
    fn destroy(&self);
}

/// Owns an engine and guards it against use after destruction.
pub struct EngineHandle<E: EmulationEngine> {
    engine: E,
    destroyed: AtomicBool,
}

impl<E: EmulationEngine> EngineHandle<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Destroy the engine. Returns `false` if it was already destroyed.
    pub fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::info!("destroying emulation engine");
        self.engine.destroy();
        true
    }

    /// Borrow the engine if it is still alive.
    fn live(&self) -> Option<&E> {
        if self.is_destroyed() {
            tracing::debug!("engine call after destroy ignored");
            None
        } else {
            Some(&self.engine)
        }
    }

    /// Direct access for hosts and tests that need engine-specific API.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn load(&self, rom: &[u8], save_memory: &[u8]) -> Result<(), EngineError> {
        match self.live() {
            Some(engine) => engine.load(rom, save_memory),
            None => Ok(()),
        }
    }

    pub fn unload(&self) {
        if let Some(engine) = self.live() {
            engine.unload();
        }
    }

    pub fn save_state(&self, path: &Path) -> Result<(), EngineError> {
        match self.live() {
            Some(engine) => engine.save_state(path),
            None => Ok(()),
        }
    }

    pub fn load_state(&self, path: &Path) -> Result<(), EngineError> {
        match self.live() {
            Some(engine) => engine.load_state(path),
            None => Ok(()),
        }
    }

    pub fn reset(&self) {
        if let Some(engine) = self.live() {
            engine.reset();
        }
    }

    pub fn tick(&self, hint: Duration) -> Duration {
        self.live().map_or(Duration::ZERO, |engine| engine.tick(hint))
    }

    pub fn fill_audio(&self, buffer: &mut [i16]) -> usize {
        self.live()
            .map_or(0, |engine| engine.fill_audio(buffer).min(buffer.len()))
    }

    pub fn read_save_memory(&self, buffer: &mut [u8]) {
        if let Some(engine) = self.live() {
            engine.read_save_memory(buffer);
        }
    }

    pub fn surface_created(&self, mode: RendererMode) {
        if let Some(engine) = self.live() {
            engine.surface_created(mode);
        }
    }

    pub fn surface_changed(&self, mode: RendererMode, width: u32, height: u32) {
        if let Some(engine) = self.live() {
            engine.surface_changed(mode, width, height);
        }
    }

    pub fn draw_frame(&self, mode: RendererMode) {
        if let Some(engine) = self.live() {
            engine.draw_frame(mode);
        }
    }

    pub fn destroy_renderer(&self, mode: RendererMode) {
        if let Some(engine) = self.live() {
            engine.destroy_renderer(mode);
        }
    }

    pub fn resume_renderer(&self, mode: RendererMode) {
        if let Some(engine) = self.live() {
            engine.resume_renderer(mode);
        }
    }
}

impl<E: EmulationEngine> InputSink for EngineHandle<E> {
    fn update_input(&self, state: InputState) {
        if let Some(engine) = self.live() {
            engine.update_input(state);
        }
    }
}

impl<E: EmulationEngine> crate::audio::AudioOutput for EngineHandle<E> {
    fn start(&self) {
        if let Some(engine) = self.live() {
            engine.start_audio();
        }
    }

    fn stop(&self) {
        if let Some(engine) = self.live() {
            engine.stop_audio();
        }
    }
}

impl<E: EmulationEngine> crate::render::FrameSource for EngineHandle<E> {
    fn surface_created(&self, mode: RendererMode) {
        EngineHandle::surface_created(self, mode);
    }

    fn surface_changed(&self, mode: RendererMode, width: u32, height: u32) {
        EngineHandle::surface_changed(self, mode, width, height);
    }

    fn draw_frame(&self, mode: RendererMode) {
        EngineHandle::draw_frame(self, mode);
    }

    fn destroy(&self, mode: RendererMode) {
        self.destroy_renderer(mode);
    }

    fn resume(&self, mode: RendererMode) {
        self.resume_renderer(mode);
    }
}
