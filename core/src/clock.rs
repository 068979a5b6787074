//! Real-time emulation clock.
//!
//! The clock owns the loaded [`GamePak`] and drives the engine's `tick` from
//! a dedicated thread while running. Pausing joins that thread before
//! flushing save memory, so the engine is never ticked and read at the same
//! time.
//!
//! ```text
//! Unloaded --load--> Loaded --resume--> Running
//!    ^                 |  ^               |
//!    +-----unload------+  +----pause------+
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::engine::{EmulationEngine, EngineHandle};
use crate::error::SessionError;
use crate::gamepak::{GamePak, SAVE_MEMORY_SIZE, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Unloaded,
    Loaded,
    Running,
}

/// Tick pacing policy.
///
/// After each tick the next duration hint is the measured elapsed time
/// clamped to `[default, max]`. A fast tick therefore still requests the
/// default duration next time; the loop never tries to catch up below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPacer {
    default: Duration,
    max: Duration,
}

impl TickPacer {
    pub fn new(default: Duration, max: Duration) -> Self {
        Self {
            default,
            max: max.max(default),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.tick_default(), config.tick_max())
    }

    pub fn default_duration(&self) -> Duration {
        self.default
    }

    /// Time left to sleep after a tick that took `elapsed`.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        (elapsed < self.default).then(|| self.default - elapsed)
    }

    pub fn next_hint(&self, elapsed: Duration) -> Duration {
        elapsed.clamp(self.default, self.max)
    }
}

pub struct EmulationClock<E: EmulationEngine> {
    engine: Arc<EngineHandle<E>>,
    pacer: TickPacer,
    auto_save: bool,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    pak: Option<GamePak>,
}

impl<E: EmulationEngine> EmulationClock<E> {
    pub fn new(engine: Arc<EngineHandle<E>>, config: &SessionConfig) -> Self {
        Self {
            engine,
            pacer: TickPacer::from_config(config),
            auto_save: config.auto_save,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            pak: None,
        }
    }

    pub fn state(&self) -> ClockState {
        if self.is_running() {
            ClockState::Running
        } else if self.pak.is_some() {
            ClockState::Loaded
        } else {
            ClockState::Unloaded
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn gamepak(&self) -> Option<&GamePak> {
        self.pak.as_ref()
    }

    /// Load `pak`, replacing whatever was loaded before.
    pub fn load(&mut self, pak: GamePak) -> Result<(), SessionError> {
        if self.engine.is_destroyed() {
            tracing::debug!("load ignored: engine destroyed");
            return Ok(());
        }
        self.pause()?;
        let save_memory = pak.load_save_memory()?;
        self.engine.load(pak.rom(), &save_memory)?;
        tracing::info!(
            rom_bytes = pak.rom().len(),
            save = %pak.save_path().display(),
            "game pak loaded"
        );
        self.pak = Some(pak);
        Ok(())
    }

    pub fn unload(&mut self) -> Result<(), SessionError> {
        if self.pak.is_none() {
            return Ok(());
        }
        self.pause()?;
        self.engine.unload();
        self.pak = None;
        tracing::info!("game pak unloaded");
        Ok(())
    }

    /// Start the tick thread. Does nothing when nothing is loaded or the
    /// thread is already running.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.pak.is_none() {
            tracing::debug!("resume ignored: nothing loaded");
            return Ok(());
        }
        if self.worker.is_some() {
            tracing::debug!("resume ignored: already running");
            return Ok(());
        }
        if self.engine.is_destroyed() {
            tracing::debug!("resume ignored: engine destroyed");
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let engine = Arc::clone(&self.engine);
        let pacer = self.pacer;
        let spawned = std::thread::Builder::new()
            .name("emulation-tick".into())
            .spawn(move || tick_loop(&engine, &running, pacer));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                tracing::info!("emulation resumed");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(SessionError::Spawn(e))
            }
        }
    }

    /// Stop the tick thread, wait for it to exit, then persist save memory.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.running.store(false, Ordering::Release);
        if let Err(panic) = worker.join() {
            std::panic::resume_unwind(panic);
        }
        tracing::info!("emulation paused");

        self.flush_save_memory()
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.pak.is_none() {
            return Ok(());
        }
        self.pause()?;
        self.engine.reset();
        tracing::info!("emulation reset");
        Ok(())
    }

    /// Save a state to `slot`. Returns `false` when nothing is loaded or the
    /// engine is gone.
    pub fn save_state(&mut self, slot: SlotId) -> Result<bool, SessionError> {
        if self.pak.is_none() || self.engine.is_destroyed() {
            return Ok(false);
        }
        self.pause()?;
        let Some(pak) = &self.pak else {
            return Ok(false);
        };

        let path = pak.slot_path(slot);
        let dir = pak.save_state_dir();
        std::fs::create_dir_all(&dir).map_err(|source| SessionError::Io { path: dir, source })?;
        self.engine.save_state(&path)?;
        tracing::info!(%slot, path = %path.display(), "state saved");
        Ok(true)
    }

    /// Restore the state in `slot`. Returns `false` when nothing is loaded or
    /// the engine is gone.
    pub fn load_state(&mut self, slot: SlotId) -> Result<bool, SessionError> {
        if self.pak.is_none() || self.engine.is_destroyed() {
            return Ok(false);
        }
        self.pause()?;
        let Some(pak) = &self.pak else {
            return Ok(false);
        };

        let path = pak.slot_path(slot);
        self.engine.load_state(&path)?;
        tracing::info!(%slot, path = %path.display(), "state loaded");
        Ok(true)
    }

    /// Write the `auto` slot if auto-save is enabled. Returns whether a state
    /// was written.
    pub fn perform_auto_save(&mut self) -> Result<bool, SessionError> {
        if !self.auto_save {
            return Ok(false);
        }
        self.save_state(SlotId::Auto)
    }

    /// Persist the engine's save memory. A destroyed engine has nothing to
    /// read, so the file on disk is left untouched.
    fn flush_save_memory(&self) -> Result<(), SessionError> {
        let Some(pak) = &self.pak else {
            return Ok(());
        };
        if self.engine.is_destroyed() {
            tracing::debug!("save memory flush skipped: engine destroyed");
            return Ok(());
        }
        let mut buffer = vec![0u8; SAVE_MEMORY_SIZE];
        self.engine.read_save_memory(&mut buffer);
        pak.store_save_memory(&buffer)?;
        tracing::debug!(path = %pak.save_path().display(), "save memory written");
        Ok(())
    }
}

impl<E: EmulationEngine> Drop for EmulationClock<E> {
    fn drop(&mut self) {
        // Never leave a detached tick thread behind.
        if let Some(worker) = self.worker.take() {
            self.running.store(false, Ordering::Release);
            let _ = worker.join();
        }
    }
}

fn tick_loop<E: EmulationEngine>(engine: &EngineHandle<E>, running: &AtomicBool, pacer: TickPacer) {
    let mut hint = pacer.default_duration();
    while running.load(Ordering::Acquire) {
        let started = Instant::now();
        let progressed = engine.tick(hint);
        let elapsed = started.elapsed();

        if let Some(rest) = pacer.remaining(elapsed) {
            std::thread::sleep(rest);
        }
        hint = pacer.next_hint(elapsed);
        tracing::trace!(?elapsed, ?progressed, ?hint, "tick");
    }
}
