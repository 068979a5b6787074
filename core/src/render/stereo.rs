//! Off-screen color target for side-by-side stereo rendering.
//!
//! The inner renderer draws one upside-down side-by-side image into the
//! pipeline's framebuffer; the resulting texture is then handed to an
//! interlacer or a display SDK. Storage is only reallocated when the target
//! goes stale (size change, fresh objects), never once per frame.

use super::graphics::{FramebufferId, GraphicsApi, SurfaceProvider, SurfaceValidity, TextureId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramebufferTarget {
    pub texture: Option<TextureId>,
    pub framebuffer: Option<FramebufferId>,
    pub size: Option<(u32, u32)>,
    pub stale: bool,
}

/// A prepared side-by-side frame ready for compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoFrame {
    pub texture: TextureId,
    pub framebuffer: FramebufferId,
    pub width: u32,
    pub height: u32,
}

pub struct StereoFramebufferPipeline<G: GraphicsApi> {
    gfx: G,
    target: FramebufferTarget,
    validity: SurfaceValidity,
    surface: Option<Box<dyn SurfaceProvider>>,
}

impl<G: GraphicsApi> StereoFramebufferPipeline<G> {
    pub fn new(gfx: G) -> Self {
        Self {
            gfx,
            target: FramebufferTarget {
                stale: true,
                ..FramebufferTarget::default()
            },
            validity: SurfaceValidity::new(),
            surface: None,
        }
    }

    pub fn with_surface_provider(mut self, surface: Box<dyn SurfaceProvider>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn target(&self) -> &FramebufferTarget {
        &self.target
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.target.texture
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.target.size
    }

    pub fn graphics(&self) -> &G {
        &self.gfx
    }

    pub fn graphics_mut(&mut self) -> &mut G {
        &mut self.gfx
    }

    /// Handle for invalidating the surface from another thread.
    pub fn validity(&self) -> SurfaceValidity {
        self.validity.clone()
    }

    pub fn invalidate(&self) {
        self.validity.invalidate();
    }

    /// Create graphics objects if needed. `width`/`height` may be a
    /// placeholder; the real size arrives with `on_surface_changed`.
    pub fn on_surface_created(&mut self, width: u32, height: u32) {
        if self.target.texture.is_none()
            || self.target.framebuffer.is_none()
            || !self.validity.is_valid()
        {
            self.recreate_objects();
        }
        if width > 0 && height > 0 {
            self.target.size = Some((width, height));
        }
        self.target.stale = true;
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if self.target.size != Some((width, height)) {
            self.target.size = Some((width, height));
            self.target.stale = true;
        }
    }

    /// Framebuffer ready for drawing, or `None` if this frame must be
    /// skipped because the target is not fully known yet.
    pub fn prepared_framebuffer(&mut self) -> Option<FramebufferId> {
        if !self.validity.is_valid() {
            tracing::debug!("stereo surface invalidated, recreating graphics objects");
            self.recreate_objects();
        }

        if !self.target.stale {
            return self.target.framebuffer;
        }

        let (Some(framebuffer), Some((width, height)), Some(texture)) =
            (self.target.framebuffer, self.target.size, self.target.texture)
        else {
            return None;
        };

        self.gfx.bind_texture(Some(texture));
        self.gfx.tex_image_2d_rgb(width, height);
        self.gfx.bind_framebuffer(Some(framebuffer));
        self.gfx.framebuffer_texture_2d(texture);
        self.gfx.bind_framebuffer(None);
        self.gfx.bind_texture(None);
        self.target.stale = false;
        tracing::debug!(width, height, "stereo target storage allocated");
        Some(framebuffer)
    }

    /// Prepared framebuffer plus its texture and size.
    pub fn prepared_frame(&mut self) -> Option<StereoFrame> {
        let framebuffer = self.prepared_framebuffer()?;
        let texture = self.target.texture?;
        let (width, height) = self.target.size?;
        Some(StereoFrame {
            texture,
            framebuffer,
            width,
            height,
        })
    }

    pub fn destroy(&mut self) {
        self.delete_objects();
    }

    fn recreate_objects(&mut self) {
        self.delete_objects();
        let texture = self.gfx.create_texture();
        let framebuffer = self.gfx.create_framebuffer();
        if let Some(surface) = &mut self.surface {
            surface.recreate(texture);
        }
        self.target.texture = Some(texture);
        self.target.framebuffer = Some(framebuffer);
        self.target.stale = true;
        self.validity.mark_valid();
    }

    fn delete_objects(&mut self) {
        let texture = self.target.texture.take();
        let framebuffer = self.target.framebuffer.take();
        if let Some(surface) = &mut self.surface {
            surface.release();
        }
        if !self.gfx.is_context_valid() {
            return;
        }
        if let Some(framebuffer) = framebuffer {
            self.gfx.delete_framebuffer(framebuffer);
        }
        if let Some(texture) = texture {
            self.gfx.delete_texture(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGraphics, GlCall};

    fn pipeline() -> StereoFramebufferPipeline<FakeGraphics> {
        StereoFramebufferPipeline::new(FakeGraphics::default())
    }

    #[test]
    fn nothing_prepared_before_surface_callbacks() {
        let mut p = pipeline();
        assert_eq!(p.prepared_framebuffer(), None);
        assert_eq!(p.graphics().count(GlCall::TexImage), 0);
    }

    #[test]
    fn objects_without_size_skip_frame() {
        let mut p = pipeline();
        p.on_surface_created(0, 0);
        assert_eq!(p.prepared_framebuffer(), None);
    }

    #[test]
    fn storage_allocated_once_until_resize() {
        let mut p = pipeline();
        p.on_surface_created(1, 1);
        p.on_surface_changed(1920, 1080);

        let fb = p.prepared_framebuffer();
        assert!(fb.is_some());
        for _ in 0..5 {
            assert_eq!(p.prepared_framebuffer(), fb);
        }
        assert_eq!(p.graphics().count(GlCall::TexImage), 1);
        assert_eq!(p.graphics().last_storage(), Some((1920, 1080)));

        p.on_surface_changed(1920, 1080);
        p.prepared_framebuffer();
        assert_eq!(p.graphics().count(GlCall::TexImage), 1);

        p.on_surface_changed(1280, 720);
        p.prepared_framebuffer();
        assert_eq!(p.graphics().count(GlCall::TexImage), 2);
        assert_eq!(p.graphics().last_storage(), Some((1280, 720)));
    }

    #[test]
    fn preparation_attaches_texture_to_framebuffer() {
        let mut p = pipeline();
        p.on_surface_created(640, 480);
        p.prepared_framebuffer();

        let tex = p.texture().unwrap();
        let calls = p.graphics().calls();
        let attach = calls.iter().position(|c| *c == GlCall::Attach(tex.0)).unwrap();
        let storage = calls.iter().position(|c| *c == GlCall::TexImage).unwrap();
        assert!(storage < attach);
        assert_eq!(calls.last(), Some(&GlCall::BindTexture(None)));
    }

    #[test]
    fn invalidation_recreates_objects() {
        let mut p = pipeline();
        p.on_surface_created(800, 600);
        let first = p.prepared_framebuffer().unwrap();
        let old_texture = p.texture().unwrap();

        p.validity().invalidate();
        let second = p.prepared_framebuffer().unwrap();

        assert_ne!(first, second);
        let gfx = p.graphics();
        assert!(gfx.calls().contains(&GlCall::DeleteTexture(old_texture.0)));
        assert!(gfx.calls().contains(&GlCall::DeleteFramebuffer(first.0)));
        assert_eq!(gfx.count(GlCall::TexImage), 2);
    }

    #[test]
    fn lost_context_skips_deletion() {
        let mut p = pipeline();
        p.on_surface_created(800, 600);
        p.prepared_framebuffer();

        p.graphics_mut().set_context_valid(false);
        p.invalidate();
        p.prepared_framebuffer();

        let gfx = p.graphics();
        assert_eq!(gfx.count_deletes(), 0);
        assert_eq!(gfx.count(GlCall::TexImage), 2);
    }
}
