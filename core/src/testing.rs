//! Fakes for exercising the runtime without a real engine or GPU.
//!
//! Every fake records what it was asked to do so tests can assert on call
//! counts and ordering. Handles are cheap clones sharing the same log.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::audio::AudioOutput;
use crate::config::RendererMode;
use crate::engine::EmulationEngine;
use crate::error::{EngineError, RenderError};
use crate::input::{InputSink, InputState};
use crate::render::{
    Compositor, FrameSource, FramebufferId, GraphicsApi, Renderer, StereoFrame, StereoSdk,
    TextureId,
};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineCounters {
    pub loads: usize,
    pub unloads: usize,
    pub ticks: usize,
    pub resets: usize,
    pub save_states: usize,
    pub load_states: usize,
    pub save_memory_reads: usize,
    pub input_updates: usize,
    pub audio_starts: usize,
    pub audio_stops: usize,
    pub destroy: usize,
}

#[derive(Default)]
struct EngineLog {
    counters: EngineCounters,
    hints: Vec<Duration>,
    last_input: Option<InputState>,
    last_rom_len: usize,
    last_save_memory: Vec<u8>,
    state_paths: Vec<PathBuf>,
    pending_audio: VecDeque<i16>,
}

/// Engine that counts calls and optionally sleeps inside `tick`.
#[derive(Default)]
pub struct FakeEngine {
    log: Mutex<EngineLog>,
    tick_delay: Duration,
    save_memory_fill: u8,
    in_tick: AtomicBool,
    concurrent_ticks: AtomicUsize,
}

impl FakeEngine {
    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = delay;
        self
    }

    /// Byte the engine reports for every save-memory cell.
    pub fn with_save_memory(mut self, fill: u8) -> Self {
        self.save_memory_fill = fill;
        self
    }

    pub fn counters(&self) -> EngineCounters {
        self.log.lock().counters
    }

    pub fn hints(&self) -> Vec<Duration> {
        self.log.lock().hints.clone()
    }

    pub fn last_input(&self) -> Option<InputState> {
        self.log.lock().last_input
    }

    pub fn last_rom_len(&self) -> usize {
        self.log.lock().last_rom_len
    }

    pub fn last_save_memory(&self) -> Vec<u8> {
        self.log.lock().last_save_memory.clone()
    }

    pub fn state_paths(&self) -> Vec<PathBuf> {
        self.log.lock().state_paths.clone()
    }

    pub fn is_ticking(&self) -> bool {
        self.in_tick.load(Ordering::Acquire)
    }

    /// Queue samples for the next `fill_audio` calls.
    pub fn queue_audio(&self, samples: &[i16]) {
        self.log.lock().pending_audio.extend(samples);
    }

    /// Highest number of overlapping `tick` calls seen.
    pub fn max_concurrent_ticks(&self) -> usize {
        self.concurrent_ticks.load(Ordering::Acquire)
    }
}

impl EmulationEngine for FakeEngine {
    fn load(&self, rom: &[u8], save_memory: &[u8]) -> Result<(), EngineError> {
        let mut log = self.log.lock();
        log.counters.loads += 1;
        log.last_rom_len = rom.len();
        log.last_save_memory = save_memory.to_vec();
        Ok(())
    }

    fn unload(&self) {
        self.log.lock().counters.unloads += 1;
    }

    fn save_state(&self, path: &Path) -> Result<(), EngineError> {
        std::fs::write(path, b"fake state")
            .map_err(|e| EngineError::new("save_state", e.to_string()))?;
        let mut log = self.log.lock();
        log.counters.save_states += 1;
        log.state_paths.push(path.to_path_buf());
        Ok(())
    }

    fn load_state(&self, path: &Path) -> Result<(), EngineError> {
        if !path.exists() {
            return Err(EngineError::new("load_state", "no such state"));
        }
        let mut log = self.log.lock();
        log.counters.load_states += 1;
        log.state_paths.push(path.to_path_buf());
        Ok(())
    }

    fn reset(&self) {
        self.log.lock().counters.resets += 1;
    }

    fn tick(&self, hint: Duration) -> Duration {
        if self.in_tick.swap(true, Ordering::AcqRel) {
            self.concurrent_ticks.fetch_max(2, Ordering::AcqRel);
        } else {
            self.concurrent_ticks.fetch_max(1, Ordering::AcqRel);
        }
        if !self.tick_delay.is_zero() {
            std::thread::sleep(self.tick_delay);
        }
        {
            let mut log = self.log.lock();
            log.counters.ticks += 1;
            log.hints.push(hint);
        }
        self.in_tick.store(false, Ordering::Release);
        hint
    }

    fn read_save_memory(&self, buffer: &mut [u8]) {
        buffer.fill(self.save_memory_fill);
        self.log.lock().counters.save_memory_reads += 1;
    }

    fn update_input(&self, state: InputState) {
        let mut log = self.log.lock();
        log.counters.input_updates += 1;
        log.last_input = Some(state);
    }

    fn start_audio(&self) {
        self.log.lock().counters.audio_starts += 1;
    }

    fn stop_audio(&self) {
        self.log.lock().counters.audio_stops += 1;
    }

    fn fill_audio(&self, buffer: &mut [i16]) -> usize {
        let mut log = self.log.lock();
        let n = buffer.len().min(log.pending_audio.len());
        for (slot, sample) in buffer.iter_mut().zip(log.pending_audio.drain(..n)) {
            *slot = sample;
        }
        n
    }

    fn destroy(&self) {
        self.log.lock().counters.destroy += 1;
    }
}

// ---------------------------------------------------------------------------
// Input / audio
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<InputState>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<InputState> {
        self.published.lock().clone()
    }
}

impl InputSink for RecordingSink {
    fn update_input(&self, state: InputState) {
        self.published.lock().push(state);
    }
}

#[derive(Default)]
pub struct CountingAudio {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl CountingAudio {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::Acquire)
    }
}

impl AudioOutput for CountingAudio {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::AcqRel);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Graphics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlCall {
    CreateTexture(u32),
    CreateFramebuffer(u32),
    BindTexture(Option<u32>),
    BindFramebuffer(Option<u32>),
    TexImage,
    Attach(u32),
    DeleteTexture(u32),
    DeleteFramebuffer(u32),
}

struct GlLog {
    calls: Vec<GlCall>,
    next_id: u32,
    context_valid: bool,
    last_storage: Option<(u32, u32)>,
}

/// Graphics API that hands out increasing object ids and logs every call.
#[derive(Clone)]
pub struct FakeGraphics {
    log: Arc<Mutex<GlLog>>,
}

impl Default for FakeGraphics {
    fn default() -> Self {
        Self {
            log: Arc::new(Mutex::new(GlLog {
                calls: Vec::new(),
                next_id: 1,
                context_valid: true,
                last_storage: None,
            })),
        }
    }
}

impl FakeGraphics {
    pub fn calls(&self) -> Vec<GlCall> {
        self.log.lock().calls.clone()
    }

    pub fn count(&self, call: GlCall) -> usize {
        self.log.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn count_deletes(&self) -> usize {
        self.log
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, GlCall::DeleteTexture(_) | GlCall::DeleteFramebuffer(_)))
            .count()
    }

    pub fn last_storage(&self) -> Option<(u32, u32)> {
        self.log.lock().last_storage
    }

    pub fn set_context_valid(&self, valid: bool) {
        self.log.lock().context_valid = valid;
    }

    fn next_id(&self) -> u32 {
        let mut log = self.log.lock();
        let id = log.next_id;
        log.next_id += 1;
        id
    }

    fn push(&self, call: GlCall) {
        self.log.lock().calls.push(call);
    }
}

impl GraphicsApi for FakeGraphics {
    fn is_context_valid(&self) -> bool {
        self.log.lock().context_valid
    }

    fn create_texture(&mut self) -> TextureId {
        let id = self.next_id();
        self.push(GlCall::CreateTexture(id));
        TextureId(id)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = self.next_id();
        self.push(GlCall::CreateFramebuffer(id));
        FramebufferId(id)
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.push(GlCall::BindTexture(texture.map(|t| t.0)));
    }

    fn tex_image_2d_rgb(&mut self, width: u32, height: u32) {
        let mut log = self.log.lock();
        log.calls.push(GlCall::TexImage);
        log.last_storage = Some((width, height));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.push(GlCall::BindFramebuffer(framebuffer.map(|f| f.0)));
    }

    fn framebuffer_texture_2d(&mut self, texture: TextureId) {
        self.push(GlCall::Attach(texture.0));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.push(GlCall::DeleteTexture(texture.0));
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.push(GlCall::DeleteFramebuffer(framebuffer.0));
    }
}

// ---------------------------------------------------------------------------
// Renderers and presentation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererEvent {
    Created(u32, u32),
    Changed(u32, u32),
    Draw,
    Resume,
    Destroy,
}

#[derive(Default)]
struct RendererLog {
    events: Vec<RendererEvent>,
    destroyed_on: Option<String>,
    failing_creates: usize,
    fail_permanently: bool,
}

/// Renderer that logs its lifecycle and can be told to fail creation.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<RendererLog>>,
    draw_delay: Option<Duration>,
    drawing: Arc<AtomicBool>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make each draw take `delay`, to hold the shared lock for a while.
    pub fn with_draw_delay(mut self, delay: Duration) -> Self {
        self.draw_delay = Some(delay);
        self
    }

    /// Fail the next `count` creations; permanent failures never recover.
    pub fn fail_next_creates(&self, count: usize, permanent: bool) {
        let mut log = self.log.lock();
        log.failing_creates = count;
        log.fail_permanently = permanent;
    }

    pub fn events(&self) -> Vec<RendererEvent> {
        self.log.lock().events.clone()
    }

    pub fn count(&self, event: RendererEvent) -> usize {
        self.log.lock().events.iter().filter(|e| **e == event).count()
    }

    pub fn count_created(&self) -> usize {
        self.log
            .lock()
            .events
            .iter()
            .filter(|e| matches!(e, RendererEvent::Created(..)))
            .count()
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing.load(Ordering::Acquire)
    }

    /// Name of the thread that called `destroy`, if any.
    pub fn destroyed_on(&self) -> Option<String> {
        self.log.lock().destroyed_on.clone()
    }
}

impl Renderer for RecordingRenderer {
    fn on_surface_created(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let mut log = self.log.lock();
        if log.fail_permanently && log.failing_creates > 0 {
            return Err(RenderError::Permanent("scripted failure".into()));
        }
        if log.failing_creates > 0 {
            log.failing_creates -= 1;
            return Err(RenderError::Transient("scripted failure".into()));
        }
        log.events.push(RendererEvent::Created(width, height));
        Ok(())
    }

    fn on_surface_changed(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.log.lock().events.push(RendererEvent::Changed(width, height));
        Ok(())
    }

    fn on_draw_frame(&self) {
        self.drawing.store(true, Ordering::Release);
        if let Some(delay) = self.draw_delay {
            std::thread::sleep(delay);
        }
        self.log.lock().events.push(RendererEvent::Draw);
        self.drawing.store(false, Ordering::Release);
    }

    fn destroy(&self) {
        let mut log = self.log.lock();
        log.events.push(RendererEvent::Destroy);
        log.destroyed_on = std::thread::current().name().map(str::to_owned);
    }

    fn on_resume(&self) {
        self.log.lock().events.push(RendererEvent::Resume);
    }
}

#[derive(Default)]
struct SourceLog {
    created: Vec<RendererMode>,
    sizes: Vec<(RendererMode, u32, u32)>,
    draws: Vec<RendererMode>,
    destroys: Vec<RendererMode>,
}

/// Frame source that records which variant asked for what.
#[derive(Default)]
pub struct RecordingSource {
    log: Mutex<SourceLog>,
}

impl RecordingSource {
    pub fn draws(&self, mode: RendererMode) -> usize {
        self.log.lock().draws.iter().filter(|m| **m == mode).count()
    }

    pub fn destroys(&self, mode: RendererMode) -> usize {
        self.log.lock().destroys.iter().filter(|m| **m == mode).count()
    }

    pub fn created(&self, mode: RendererMode) -> usize {
        self.log.lock().created.iter().filter(|m| **m == mode).count()
    }

    pub fn last_size(&self, mode: RendererMode) -> Option<(u32, u32)> {
        self.log
            .lock()
            .sizes
            .iter()
            .rev()
            .find(|(m, _, _)| *m == mode)
            .map(|&(_, w, h)| (w, h))
    }
}

impl FrameSource for RecordingSource {
    fn surface_created(&self, mode: RendererMode) {
        self.log.lock().created.push(mode);
    }

    fn surface_changed(&self, mode: RendererMode, width: u32, height: u32) {
        self.log.lock().sizes.push((mode, width, height));
    }

    fn draw_frame(&self, mode: RendererMode) {
        self.log.lock().draws.push(mode);
    }

    fn destroy(&self, mode: RendererMode) {
        self.log.lock().destroys.push(mode);
    }
}

#[derive(Clone, Default)]
pub struct RecordingCompositor {
    frames: Arc<Mutex<Vec<StereoFrame>>>,
    destroyed: Arc<AtomicUsize>,
}

impl RecordingCompositor {
    pub fn frames(&self) -> Vec<StereoFrame> {
        self.frames.lock().clone()
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl Compositor for RecordingCompositor {
    fn composite(&mut self, frame: &StereoFrame) {
        self.frames.lock().push(*frame);
    }

    fn destroy(&mut self) {
        self.destroyed.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Default)]
struct SdkLog {
    submitted: Vec<StereoFrame>,
    reject_configure: bool,
    destroyed: usize,
}

/// Stereo SDK double; can be told to refuse the display.
#[derive(Clone, Default)]
pub struct ScriptedSdk {
    log: Arc<Mutex<SdkLog>>,
}

impl ScriptedSdk {
    pub fn reject_configure(&self) {
        self.log.lock().reject_configure = true;
    }

    pub fn submitted(&self) -> Vec<StereoFrame> {
        self.log.lock().submitted.clone()
    }

    pub fn destroyed(&self) -> usize {
        self.log.lock().destroyed
    }
}

impl StereoSdk for ScriptedSdk {
    fn configure(&mut self, _width: u32, _height: u32) -> Result<(), RenderError> {
        if self.log.lock().reject_configure {
            Err(RenderError::Permanent("display not supported".into()))
        } else {
            Ok(())
        }
    }

    fn submit(&mut self, frame: &StereoFrame) {
        self.log.lock().submitted.push(*frame);
    }

    fn destroy(&mut self) {
        self.log.lock().destroyed += 1;
    }
}
