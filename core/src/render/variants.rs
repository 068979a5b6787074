//! The three concrete renderers.
//!
//! - [`DirectRenderer`] lets the engine draw straight onto the window.
//! - [`InterlacedRenderer`] has the engine draw a side-by-side stereo pair
//!   into an off-screen target, then hands it to a [`Compositor`].
//! - [`SdkStereoRenderer`] does the same but submits the pair to a
//!   stereoscopic display SDK.

use std::sync::Arc;

use parking_lot::Mutex;

use super::graphics::{GraphicsApi, SurfaceValidity};
use super::stereo::{StereoFrame, StereoFramebufferPipeline};
use super::{FrameSource, Renderer};
use crate::config::RendererMode;
use crate::error::RenderError;

/// Size used for the off-screen target until the real surface size arrives.
const PLACEHOLDER_SIZE: (u32, u32) = (1, 1);

pub struct DirectRenderer {
    source: Arc<dyn FrameSource>,
}

impl DirectRenderer {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }
}

impl Renderer for DirectRenderer {
    fn on_surface_created(&self, _width: u32, _height: u32) -> Result<(), RenderError> {
        self.source.surface_created(RendererMode::Direct);
        Ok(())
    }

    fn on_surface_changed(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.source
            .surface_changed(RendererMode::Direct, width, height);
        Ok(())
    }

    fn on_draw_frame(&self) {
        self.source.draw_frame(RendererMode::Direct);
    }

    fn destroy(&self) {
        self.source.destroy(RendererMode::Direct);
    }

    fn on_resume(&self) {
        self.source.resume(RendererMode::Direct);
    }
}

/// Combines the two halves of a side-by-side frame into the final image.
pub trait Compositor: Send {
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn composite(&mut self, frame: &StereoFrame);

    fn destroy(&mut self) {}
}

/// Stereoscopic display SDK that takes over presentation.
pub trait StereoSdk: Send {
    /// Called when the display surface is (re)configured. An SDK that cannot
    /// drive the display at all should return a permanent error.
    fn configure(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    fn submit(&mut self, frame: &StereoFrame);

    fn destroy(&mut self);
}

/// Draw one side-by-side frame into the pipeline, or skip the frame if the
/// target is not ready.
fn draw_stereo_pass<G: GraphicsApi>(
    pipeline: &mut StereoFramebufferPipeline<G>,
    source: &dyn FrameSource,
    mode: RendererMode,
) -> Option<StereoFrame> {
    let frame = pipeline.prepared_frame()?;
    let gfx = pipeline.graphics_mut();
    gfx.bind_framebuffer(Some(frame.framebuffer));
    source.draw_frame(mode);
    gfx.bind_framebuffer(None);
    Some(frame)
}

fn require_context<G: GraphicsApi>(pipeline: &StereoFramebufferPipeline<G>) -> Result<(), RenderError> {
    if pipeline.graphics().is_context_valid() {
        Ok(())
    } else {
        Err(RenderError::Transient("graphics context is not current".into()))
    }
}

struct InterlacedState<G: GraphicsApi> {
    pipeline: StereoFramebufferPipeline<G>,
    compositor: Box<dyn Compositor>,
}

pub struct InterlacedRenderer<G: GraphicsApi> {
    source: Arc<dyn FrameSource>,
    state: Mutex<InterlacedState<G>>,
    validity: SurfaceValidity,
}

impl<G: GraphicsApi> InterlacedRenderer<G> {
    pub fn new(
        source: Arc<dyn FrameSource>,
        pipeline: StereoFramebufferPipeline<G>,
        compositor: Box<dyn Compositor>,
    ) -> Self {
        let validity = pipeline.validity();
        Self {
            source,
            state: Mutex::new(InterlacedState {
                pipeline,
                compositor,
            }),
            validity,
        }
    }

    /// Handle for reporting loss of the off-screen surface.
    pub fn validity(&self) -> SurfaceValidity {
        self.validity.clone()
    }
}

impl<G: GraphicsApi> Renderer for InterlacedRenderer<G> {
    fn on_surface_created(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        require_context(&state.pipeline)?;
        let (w, h) = if width > 0 && height > 0 {
            (width, height)
        } else {
            PLACEHOLDER_SIZE
        };
        state.pipeline.on_surface_created(w, h);
        self.source.surface_created(RendererMode::Interlaced);
        Ok(())
    }

    fn on_surface_changed(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        state.pipeline.on_surface_changed(width, height);
        state.compositor.resize(width, height);
        self.source
            .surface_changed(RendererMode::Interlaced, width, height);
        Ok(())
    }

    fn on_draw_frame(&self) {
        let mut state = self.state.lock();
        let InterlacedState {
            pipeline,
            compositor,
        } = &mut *state;
        if let Some(frame) = draw_stereo_pass(pipeline, self.source.as_ref(), RendererMode::Interlaced) {
            compositor.composite(&frame);
        }
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        state.compositor.destroy();
        state.pipeline.destroy();
        self.source.destroy(RendererMode::Interlaced);
    }

    fn on_resume(&self) {
        self.source.resume(RendererMode::Interlaced);
    }
}

struct SdkState<G: GraphicsApi> {
    pipeline: StereoFramebufferPipeline<G>,
    sdk: Box<dyn StereoSdk>,
}

pub struct SdkStereoRenderer<G: GraphicsApi> {
    source: Arc<dyn FrameSource>,
    state: Mutex<SdkState<G>>,
    validity: SurfaceValidity,
}

impl<G: GraphicsApi> SdkStereoRenderer<G> {
    pub fn new(
        source: Arc<dyn FrameSource>,
        pipeline: StereoFramebufferPipeline<G>,
        sdk: Box<dyn StereoSdk>,
    ) -> Self {
        let validity = pipeline.validity();
        Self {
            source,
            state: Mutex::new(SdkState { pipeline, sdk }),
            validity,
        }
    }

    /// Handle the SDK's callbacks use to report that its surface is gone.
    pub fn validity(&self) -> SurfaceValidity {
        self.validity.clone()
    }
}

impl<G: GraphicsApi> Renderer for SdkStereoRenderer<G> {
    fn on_surface_created(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        require_context(&state.pipeline)?;
        let (w, h) = if width > 0 && height > 0 {
            (width, height)
        } else {
            PLACEHOLDER_SIZE
        };
        state.pipeline.on_surface_created(w, h);
        self.source.surface_created(RendererMode::Sdk);
        Ok(())
    }

    fn on_surface_changed(&self, width: u32, height: u32) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        state.sdk.configure(width, height)?;
        state.pipeline.on_surface_changed(width, height);
        self.source.surface_changed(RendererMode::Sdk, width, height);
        Ok(())
    }

    fn on_draw_frame(&self) {
        let mut state = self.state.lock();
        let SdkState { pipeline, sdk } = &mut *state;
        if let Some(frame) = draw_stereo_pass(pipeline, self.source.as_ref(), RendererMode::Sdk) {
            sdk.submit(&frame);
        }
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        state.sdk.destroy();
        state.pipeline.destroy();
        self.source.destroy(RendererMode::Sdk);
    }

    fn on_resume(&self) {
        self.source.resume(RendererMode::Sdk);
    }
}
