use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use parallax_core::audio::AudioOutput;
use parallax_core::engine::{EmulationEngine, EngineHandle};
use sdl2::audio::{AudioCallback, AudioDevice, AudioSpecDesired};

use crate::HostError;

/// Number of samples over which to fade in/out (~5.8 ms at 44.1 kHz).
const FADE_SAMPLES: u32 = 256;

/// Most samples kept queued (~185 ms at 44.1 kHz). When the engine outruns
/// the device the oldest samples are dropped.
const MAX_QUEUED_SAMPLES: usize = 8192;

/// Samples pulled from the engine per `fill_audio` call.
const PUMP_CHUNK: usize = 1024;

/// Shared audio ring buffer. [`pump`] moves engine samples in;
/// the SDL audio callback thread pops them out.
pub type AudioRing = Arc<Mutex<VecDeque<i16>>>;

/// Gain envelope applied when playback starts and stops.
#[derive(Debug)]
struct Envelope {
    was_playing: bool,
    fade_in_pos: u32,
    fade_out_pos: u32,
}

impl Envelope {
    fn new() -> Self {
        Self {
            was_playing: false,
            fade_in_pos: FADE_SAMPLES,
            fade_out_pos: FADE_SAMPLES,
        }
    }

    /// Restart the matching ramp on a play/stop transition.
    fn observe(&mut self, playing: bool) {
        if playing != self.was_playing {
            if playing {
                self.fade_in_pos = 0;
            } else {
                self.fade_out_pos = 0;
            }
            self.was_playing = playing;
        }
    }

    /// Gain for the next sample, or `None` once fully silent.
    fn next_gain(&mut self) -> Option<f32> {
        if self.was_playing {
            if self.fade_in_pos < FADE_SAMPLES {
                let gain = self.fade_in_pos as f32 / FADE_SAMPLES as f32;
                self.fade_in_pos += 1;
                Some(gain)
            } else {
                Some(1.0)
            }
        } else if self.fade_out_pos < FADE_SAMPLES {
            let gain = 1.0 - (self.fade_out_pos as f32 / FADE_SAMPLES as f32);
            self.fade_out_pos += 1;
            Some(gain)
        } else {
            None
        }
    }
}

pub struct AudioPlayer {
    buffer: AudioRing,
    playing: Arc<AtomicBool>,
    envelope: Envelope,
}

impl AudioCallback for AudioPlayer {
    type Channel = i16;
    fn callback(&mut self, out: &mut [i16]) {
        self.envelope.observe(self.playing.load(Ordering::Acquire));
        let mut buf = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        for sample in out.iter_mut() {
            *sample = match self.envelope.next_gain() {
                Some(gain) => {
                    let raw = buf.pop_front().unwrap_or(0);
                    (raw as f32 * gain) as i16
                }
                None => 0,
            };
        }
    }
}

/// [`AudioOutput`] backed by an SDL playback device.
///
/// The device itself keeps running for the whole host lifetime; start and
/// stop only flip the envelope so playback fades instead of clicking.
#[derive(Clone)]
pub struct SdlAudioOutput {
    ring: AudioRing,
    playing: Arc<AtomicBool>,
}

impl SdlAudioOutput {
    /// Ring the engine should push samples into.
    pub fn ring(&self) -> AudioRing {
        Arc::clone(&self.ring)
    }
}

impl AudioOutput for SdlAudioOutput {
    fn start(&self) {
        self.playing.store(true, Ordering::Release);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Release);
    }
}

/// Move every sample the engine has produced into `ring`.
pub fn pump<E: EmulationEngine>(engine: &EngineHandle<E>, ring: &AudioRing) {
    let mut chunk = [0i16; PUMP_CHUNK];
    loop {
        let n = engine.fill_audio(&mut chunk);
        if n == 0 {
            break;
        }
        let mut buf = ring.lock().unwrap_or_else(PoisonError::into_inner);
        buf.extend(&chunk[..n]);
        let excess = buf.len().saturating_sub(MAX_QUEUED_SAMPLES);
        buf.drain(..excess);
        if n < PUMP_CHUNK {
            break;
        }
    }
}

/// Open an SDL2 playback device.
///
/// Returns the running device (must be kept alive) and the output handle to
/// give to the session. If `sample_rate` is 0, returns `None` (engine has no
/// audio).
pub fn init(
    sdl_audio: &sdl2::AudioSubsystem,
    sample_rate: u32,
) -> Result<Option<(AudioDevice<AudioPlayer>, SdlAudioOutput)>, HostError> {
    if sample_rate == 0 {
        return Ok(None);
    }

    let output = SdlAudioOutput {
        ring: Arc::new(Mutex::new(VecDeque::with_capacity(4096))),
        playing: Arc::new(AtomicBool::new(false)),
    };

    let desired_spec = AudioSpecDesired {
        freq: Some(sample_rate as i32),
        channels: Some(1),
        samples: Some(512), // ~11.6 ms at 44100 Hz
    };

    let device = sdl_audio
        .open_playback(None, &desired_spec, |_spec| AudioPlayer {
            buffer: output.ring(),
            playing: Arc::clone(&output.playing),
            envelope: Envelope::new(),
        })
        .map_err(HostError::Sdl)?;

    // Silence until the session starts audio; the envelope handles gating.
    device.resume();
    Ok(Some((device, output)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::testing::FakeEngine;

    #[test]
    fn silent_before_first_start() {
        let mut env = Envelope::new();
        env.observe(false);
        assert_eq!(env.next_gain(), None);
    }

    #[test]
    fn start_ramps_up_from_zero() {
        let mut env = Envelope::new();
        env.observe(true);
        assert_eq!(env.next_gain(), Some(0.0));
        for _ in 1..FADE_SAMPLES {
            env.next_gain();
        }
        assert_eq!(env.next_gain(), Some(1.0));
    }

    #[test]
    fn stop_ramps_down_then_goes_silent() {
        let mut env = Envelope::new();
        env.observe(true);
        for _ in 0..FADE_SAMPLES {
            env.next_gain();
        }
        env.observe(false);
        assert_eq!(env.next_gain(), Some(1.0));
        for _ in 1..FADE_SAMPLES {
            assert!(env.next_gain().is_some());
        }
        assert_eq!(env.next_gain(), None);
    }

    fn ring() -> AudioRing {
        Arc::new(Mutex::new(VecDeque::new()))
    }

    #[test]
    fn pump_moves_engine_samples_in_order() {
        let engine = EngineHandle::new(FakeEngine::default());
        let samples: Vec<i16> = (0..3000).map(|i| i as i16).collect();
        engine.engine().queue_audio(&samples);
        let ring = ring();

        pump(&engine, &ring);

        let queued: Vec<i16> = ring.lock().unwrap().iter().copied().collect();
        assert_eq!(queued, samples);
        assert_eq!(engine.fill_audio(&mut [0; 4]), 0);
    }

    #[test]
    fn pump_drops_oldest_beyond_cap() {
        let engine = EngineHandle::new(FakeEngine::default());
        let samples: Vec<i16> = (0..10_000).map(|i| i as i16).collect();
        engine.engine().queue_audio(&samples);
        let ring = ring();

        pump(&engine, &ring);

        let buf = ring.lock().unwrap();
        assert_eq!(buf.len(), MAX_QUEUED_SAMPLES);
        assert_eq!(buf.front().copied(), Some((10_000 - MAX_QUEUED_SAMPLES) as i16));
        assert_eq!(buf.back().copied(), Some(9_999));
    }

    #[test]
    fn pump_after_destroy_queues_nothing() {
        let engine = EngineHandle::new(FakeEngine::default());
        engine.engine().queue_audio(&[1, 2, 3]);
        engine.destroy();
        let ring = ring();

        pump(&engine, &ring);

        assert!(ring.lock().unwrap().is_empty());
    }

    #[test]
    fn output_toggles_shared_flag() {
        let output = SdlAudioOutput {
            ring: Arc::new(Mutex::new(VecDeque::new())),
            playing: Arc::new(AtomicBool::new(false)),
        };
        output.start();
        assert!(output.playing.load(Ordering::Acquire));
        output.stop();
        assert!(!output.playing.load(Ordering::Acquire));
    }
}
