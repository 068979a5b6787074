//! Display renderers and the machinery to swap them at runtime.

pub mod graphics;
pub mod hotswap;
pub mod stereo;
pub mod variants;

pub use graphics::{FramebufferId, GraphicsApi, SurfaceProvider, SurfaceValidity, TextureId};
pub use hotswap::RendererHotSwap;
pub use stereo::{FramebufferTarget, StereoFrame, StereoFramebufferPipeline};
pub use variants::{Compositor, DirectRenderer, InterlacedRenderer, SdkStereoRenderer, StereoSdk};

use crate::config::RendererMode;
use crate::error::RenderError;

/// Lifecycle every renderer variant implements.
///
/// All methods are invoked from the render thread. They take `&self` because
/// the active renderer is reached through a shared lock; variants keep their
/// mutable graphics state behind their own mutex.
pub trait Renderer: Send + Sync {
    fn on_surface_created(&self, width: u32, height: u32) -> Result<(), RenderError>;

    fn on_surface_changed(&self, width: u32, height: u32) -> Result<(), RenderError>;

    fn on_draw_frame(&self);

    /// Release every resource. Called exactly once by the hot swap.
    fn destroy(&self);

    fn on_resume(&self) {}
}

/// Emulated video output, drawn into whatever framebuffer is bound.
pub trait FrameSource: Send + Sync {
    fn surface_created(&self, mode: RendererMode);

    fn surface_changed(&self, mode: RendererMode, width: u32, height: u32);

    fn draw_frame(&self, mode: RendererMode);

    fn destroy(&self, mode: RendererMode);

    fn resume(&self, _mode: RendererMode) {}
}

/// Placeholder installed before the first real renderer is bound.
#[derive(Debug, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn on_surface_created(&self, _width: u32, _height: u32) -> Result<(), RenderError> {
        Ok(())
    }

    fn on_surface_changed(&self, _width: u32, _height: u32) -> Result<(), RenderError> {
        Ok(())
    }

    fn on_draw_frame(&self) {}

    fn destroy(&self) {}
}
