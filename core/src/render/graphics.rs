//! Graphics calls consumed by the off-screen stereo pipeline.
//!
//! The surface is deliberately tiny: 2D textures, framebuffers, RGB storage
//! and a single color attachment. Implementations must be called from the
//! thread that owns the graphics context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

pub trait GraphicsApi: Send {
    /// Whether the context that owns previously created objects still
    /// exists. Deleting objects of a lost context is skipped.
    fn is_context_valid(&self) -> bool;

    fn create_texture(&mut self) -> TextureId;

    fn create_framebuffer(&mut self) -> FramebufferId;

    /// Bind a 2D texture, or unbind with `None`.
    fn bind_texture(&mut self, texture: Option<TextureId>);

    /// Allocate RGB / unsigned-byte storage for the bound 2D texture.
    fn tex_image_2d_rgb(&mut self, width: u32, height: u32);

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Attach `texture` as color attachment 0 of the bound framebuffer.
    fn framebuffer_texture_2d(&mut self, texture: TextureId);

    fn delete_texture(&mut self, texture: TextureId);

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
}

/// Platform surface object wrapped around the off-screen texture (for
/// example a compositor input surface). Recreated whenever the pipeline's
/// objects are.
pub trait SurfaceProvider: Send {
    fn recreate(&mut self, texture: TextureId);

    fn release(&mut self);
}

/// Cross-thread validity flag for the platform surface.
///
/// Whoever observes the surface going away calls [`invalidate`]; the render
/// thread notices on its next frame and rebuilds its objects.
///
/// [`invalidate`]: SurfaceValidity::invalidate
#[derive(Debug, Clone)]
pub struct SurfaceValidity(Arc<AtomicBool>);

impl SurfaceValidity {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_valid(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub(crate) fn mark_valid(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Default for SurfaceValidity {
    fn default() -> Self {
        Self::new()
    }
}
