use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A sink that can be started and stopped, e.g. the engine's mixer or a host
/// playback device.
pub trait AudioOutput: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Audio lifecycle that follows the clock: started on resume, stopped on
/// pause. Both transitions are idempotent.
pub struct AudioSession {
    output: Arc<dyn AudioOutput>,
    playing: AtomicBool,
}

impl AudioSession {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            playing: AtomicBool::new(false),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn start(&self) {
        if !self.playing.swap(true, Ordering::AcqRel) {
            tracing::debug!("audio start");
            self.output.start();
        }
    }

    pub fn stop(&self) {
        if self.playing.swap(false, Ordering::AcqRel) {
            tracing::debug!("audio stop");
            self.output.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingAudio;

    #[test]
    fn start_and_stop_are_idempotent() {
        let output = Arc::new(CountingAudio::default());
        let audio = AudioSession::new(output.clone());

        audio.stop();
        audio.start();
        audio.start();
        assert!(audio.is_playing());
        audio.stop();
        audio.stop();

        assert_eq!(output.starts(), 1);
        assert_eq!(output.stops(), 1);
    }
}
