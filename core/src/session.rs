//! The play session: one engine, its clock, input and audio.
//!
//! A session is constructed explicitly and passed by reference to whatever
//! needs it. Teardown is explicit too: [`Session::shutdown`] pauses, unloads
//! and destroys the engine exactly once, and `Drop` calls it as a backstop.

use std::sync::Arc;

use crate::audio::{AudioOutput, AudioSession};
use crate::clock::{ClockState, EmulationClock};
use crate::config::SessionConfig;
use crate::engine::{EmulationEngine, EngineHandle};
use crate::error::SessionError;
use crate::gamepak::{GamePak, SlotId};
use crate::input::InputAggregator;

pub struct Session<E: EmulationEngine> {
    engine: Arc<EngineHandle<E>>,
    clock: EmulationClock<E>,
    input: InputAggregator,
    audio: AudioSession,
    config: SessionConfig,
}

impl<E: EmulationEngine> Session<E> {
    /// Build a session whose audio is driven by the engine itself.
    pub fn new(engine: E, config: SessionConfig) -> Self {
        let engine = Arc::new(EngineHandle::new(engine));
        let output: Arc<dyn AudioOutput> = engine.clone();
        Self::assemble(engine, output, config)
    }

    /// Build a session that plays audio through a host-provided output.
    pub fn with_audio_output(engine: E, output: Arc<dyn AudioOutput>, config: SessionConfig) -> Self {
        Self::assemble(Arc::new(EngineHandle::new(engine)), output, config)
    }

    fn assemble(
        engine: Arc<EngineHandle<E>>,
        output: Arc<dyn AudioOutput>,
        config: SessionConfig,
    ) -> Self {
        Self {
            clock: EmulationClock::new(Arc::clone(&engine), &config),
            input: InputAggregator::new(engine.clone()),
            audio: AudioSession::new(output),
            engine,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<EngineHandle<E>> {
        &self.engine
    }

    pub fn input(&self) -> &InputAggregator {
        &self.input
    }

    pub fn audio(&self) -> &AudioSession {
        &self.audio
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn gamepak(&self) -> Option<&GamePak> {
        self.clock.gamepak()
    }

    pub fn load(&mut self, pak: GamePak) -> Result<(), SessionError> {
        self.audio.stop();
        self.clock.load(pak)
    }

    pub fn unload(&mut self) -> Result<(), SessionError> {
        self.audio.stop();
        self.clock.unload()
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.clock.resume()?;
        if self.clock.is_running() {
            self.audio.start();
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.audio.stop();
        self.clock.pause()
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.audio.stop();
        self.clock.reset()
    }

    pub fn save_state(&mut self, slot: SlotId) -> Result<bool, SessionError> {
        self.audio.stop();
        self.clock.save_state(slot)
    }

    pub fn load_state(&mut self, slot: SlotId) -> Result<bool, SessionError> {
        self.audio.stop();
        self.clock.load_state(slot)
    }

    pub fn perform_auto_save(&mut self) -> Result<bool, SessionError> {
        self.audio.stop();
        self.clock.perform_auto_save()
    }

    /// Stop everything and destroy the engine. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), SessionError> {
        if self.engine.is_destroyed() {
            return Ok(());
        }
        let result = self.pause().and_then(|()| self.clock.unload());
        self.engine.destroy();
        result
    }
}

impl<E: EmulationEngine> Drop for Session<E> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "session teardown failed");
        }
    }
}
