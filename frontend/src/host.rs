//! SDL2 window, GL context and the host event loop.
//!
//! The loop runs on the thread that owns the GL context, so it doubles as
//! the render thread: every iteration drains SDL events on behalf of the
//! control side, then draws one frame through the [`RendererHotSwap`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parallax_core::config::RendererMode;
use parallax_core::engine::EmulationEngine;
use parallax_core::gamepak::SlotId;
use parallax_core::render::{
    DirectRenderer, FrameSource, InterlacedRenderer, Renderer, RendererHotSwap,
    StereoFramebufferPipeline,
};
use parallax_core::session::Session;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Scancode;
use sdl2::video::{GLContext, GLProfile, SwapInterval, Window};

use crate::HostError;
use crate::audio::{self, AudioPlayer, SdlAudioOutput};
use crate::input::KeyMap;
use crate::video::{self, BlitCompositor, GlGraphics};

/// Slot used by the quick save / quick load hotkeys.
const QUICK_SLOT: SlotId = SlotId::Index(0);

#[derive(Debug, Clone)]
pub struct HostOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Output sample rate; 0 opens no audio device.
    pub sample_rate: u32,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            title: "Parallax".to_string(),
            width: 960,
            height: 640,
            sample_rate: 44_100,
        }
    }
}

/// Builds the renderer for a mode, or `None` if the mode is unavailable.
pub trait RendererFactory {
    fn build(&mut self, mode: RendererMode, gfx: &GlGraphics) -> Option<Box<dyn Renderer>>;
}

impl<F> RendererFactory for F
where
    F: FnMut(RendererMode, &GlGraphics) -> Option<Box<dyn Renderer>>,
{
    fn build(&mut self, mode: RendererMode, gfx: &GlGraphics) -> Option<Box<dyn Renderer>> {
        self(mode, gfx)
    }
}

/// Renderers available without a stereo display SDK: direct drawing, and
/// the interlaced path composited by a plain blit.
pub fn standard_renderer(
    mode: RendererMode,
    source: &Arc<dyn FrameSource>,
    gfx: &GlGraphics,
) -> Option<Box<dyn Renderer>> {
    match mode {
        RendererMode::Direct => Some(Box::new(DirectRenderer::new(Arc::clone(source)))),
        RendererMode::Interlaced => Some(Box::new(InterlacedRenderer::new(
            Arc::clone(source),
            StereoFramebufferPipeline::new(gfx.clone()),
            Box::new(BlitCompositor::new(gfx.context_flag())),
        ))),
        RendererMode::Sdk => None,
    }
}

/// SDL state that must outlive the session's audio output.
pub struct Host {
    sdl: sdl2::Sdl,
    _video: sdl2::VideoSubsystem,
    window: Window,
    _gl_context: GLContext,
    gfx: GlGraphics,
    _audio_device: Option<sdl2::audio::AudioDevice<AudioPlayer>>,
    audio_output: Option<SdlAudioOutput>,
}

impl Host {
    pub fn new(options: &HostOptions) -> Result<Self, HostError> {
        let sdl = sdl2::init().map_err(HostError::Sdl)?;
        let video = sdl.video().map_err(HostError::Sdl)?;

        let gl_attr = video.gl_attr();
        gl_attr.set_context_profile(GLProfile::Core);
        gl_attr.set_context_version(3, 3);

        let window = video
            .window(&options.title, options.width, options.height)
            .opengl()
            .resizable()
            .position_centered()
            .build()
            .map_err(|e| HostError::Sdl(e.to_string()))?;

        let gl_context = window.gl_create_context().map_err(HostError::Sdl)?;
        window.gl_make_current(&gl_context).map_err(HostError::Sdl)?;
        video::load_gl(&video);
        if let Err(e) = video.gl_set_swap_interval(SwapInterval::VSync) {
            tracing::warn!(error = %e, "vsync unavailable");
        }

        let sdl_audio = sdl.audio().map_err(HostError::Sdl)?;
        let (audio_device, audio_output) = match audio::init(&sdl_audio, options.sample_rate)? {
            Some((device, output)) => (Some(device), Some(output)),
            None => (None, None),
        };

        tracing::info!(
            width = options.width,
            height = options.height,
            audio = audio_output.is_some(),
            "host window created"
        );

        Ok(Self {
            sdl,
            _video: video,
            window,
            _gl_context: gl_context,
            gfx: GlGraphics::new(Arc::new(AtomicBool::new(true))),
            _audio_device: audio_device,
            audio_output,
        })
    }

    /// Audio output to hand to [`Session::with_audio_output`].
    pub fn audio_output(&self) -> Option<SdlAudioOutput> {
        self.audio_output.clone()
    }

    pub fn graphics(&self) -> &GlGraphics {
        &self.gfx
    }
}

/// Run the event loop until the window closes or Escape is pressed.
///
/// `session` should already have a pak loaded; it is resumed on entry and
/// paused on exit. Renderers are built by `factory`, starting with the
/// session's configured mode.
pub fn run<E, F>(
    host: Host,
    session: &mut Session<E>,
    swap: &RendererHotSwap,
    key_map: &KeyMap,
    mut factory: F,
) -> Result<(), HostError>
where
    E: EmulationEngine,
    F: RendererFactory,
{
    let mut mode = session.config().renderer;
    match factory.build(mode, &host.gfx) {
        Some(renderer) => swap.rebind(renderer),
        None => {
            tracing::warn!(?mode, "configured renderer unavailable, using direct");
            mode = RendererMode::Direct;
            if let Some(renderer) = factory.build(mode, &host.gfx) {
                swap.rebind(renderer);
            }
        }
    }

    let (width, height) = host.window.drawable_size();
    swap.on_surface_created(width, height)?;
    swap.on_surface_changed(width, height)?;
    session.resume()?;

    let ring = host.audio_output.as_ref().map(SdlAudioOutput::ring);
    let mut event_pump = host.sdl.event_pump().map_err(HostError::Sdl)?;
    loop {
        let mut quit = false;
        for event in event_pump.poll_iter() {
            match handle_event(event, session, swap, key_map, &mut factory, &host.gfx, &mut mode) {
                Ok(true) => {}
                Ok(false) => quit = true,
                Err(e) => tracing::error!(error = %e, "event handling failed"),
            }
        }
        if quit {
            break;
        }

        if let Some(ring) = &ring {
            audio::pump(session.engine(), ring);
        }

        clear_default_framebuffer();
        swap.on_draw_frame();
        host.window.gl_swap_window();
    }

    swap.destroy();
    host.gfx.context_flag().store(false, Ordering::Release);
    session.pause()?;
    session.perform_auto_save()?;
    Ok(())
}

/// Returns `Ok(false)` when the host should exit.
fn handle_event<E, F>(
    event: Event,
    session: &mut Session<E>,
    swap: &RendererHotSwap,
    key_map: &KeyMap,
    factory: &mut F,
    gfx: &GlGraphics,
    mode: &mut RendererMode,
) -> Result<bool, HostError>
where
    E: EmulationEngine,
    F: RendererFactory,
{
    match event {
        Event::Quit { .. }
        | Event::KeyDown {
            scancode: Some(Scancode::Escape),
            ..
        } => return Ok(false),

        Event::KeyDown {
            scancode: Some(sc),
            repeat: false,
            ..
        } => match sc {
            Scancode::F1 => {
                session.reset()?;
                session.resume()?;
            }
            Scancode::F2 => cycle_renderer(swap, factory, gfx, mode),
            Scancode::F5 => {
                if session.save_state(QUICK_SLOT)? {
                    tracing::info!(slot = %QUICK_SLOT, "state saved");
                }
                session.resume()?;
            }
            Scancode::F8 => {
                if session.load_state(QUICK_SLOT)? {
                    tracing::info!(slot = %QUICK_SLOT, "state loaded");
                }
                session.resume()?;
            }
            _ => {
                if let Some(button) = key_map.get(sc) {
                    session.input().press(button);
                }
            }
        },

        Event::KeyUp {
            scancode: Some(sc), ..
        } => {
            if let Some(button) = key_map.get(sc) {
                session.input().release(button);
            }
        }

        Event::Window { win_event, .. } => match win_event {
            WindowEvent::SizeChanged(w, h) => {
                let (w, h) = (w.max(0) as u32, h.max(0) as u32);
                swap.on_surface_changed(w, h)?;
            }
            WindowEvent::FocusLost => {
                session.input().clear();
                session.pause()?;
                session.perform_auto_save()?;
            }
            WindowEvent::FocusGained => {
                session.resume()?;
                swap.on_resume();
            }
            _ => {}
        },

        _ => {}
    }
    Ok(true)
}

/// Swap to the next mode the factory can build, wrapping around.
fn cycle_renderer<F: RendererFactory>(
    swap: &RendererHotSwap,
    factory: &mut F,
    gfx: &GlGraphics,
    mode: &mut RendererMode,
) {
    let mut candidate = mode.next();
    while candidate != *mode {
        if let Some(renderer) = factory.build(candidate, gfx) {
            tracing::info!(from = ?*mode, to = ?candidate, "switching renderer");
            swap.swap_renderer(renderer);
            *mode = candidate;
            return;
        }
        tracing::debug!(mode = ?candidate, "renderer unavailable, skipping");
        candidate = candidate.next();
    }
}

fn clear_default_framebuffer() {
    unsafe {
        gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        gl::ClearColor(0.0, 0.0, 0.0, 1.0);
        gl::Clear(gl::COLOR_BUFFER_BIT);
    }
}
