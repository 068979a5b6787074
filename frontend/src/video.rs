//! OpenGL bindings for the render pipeline.
//!
//! [`GlGraphics`] issues the handful of GL calls the off-screen stereo
//! target needs; [`BlitCompositor`] copies a finished side-by-side frame to
//! the window. Both must only be used on the thread that owns the window's
//! GL context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parallax_core::render::{Compositor, FramebufferId, GraphicsApi, StereoFrame, TextureId};

/// Load GL function pointers for the current context.
pub fn load_gl(video: &sdl2::VideoSubsystem) {
    gl::load_with(|name| video.gl_get_proc_address(name) as *const _);
}

/// [`GraphicsApi`] over the raw `gl` bindings.
///
/// The context flag is shared with the host so objects are never deleted
/// after the window (and with it the context) has gone away.
#[derive(Clone)]
pub struct GlGraphics {
    context_alive: Arc<AtomicBool>,
}

impl GlGraphics {
    pub fn new(context_alive: Arc<AtomicBool>) -> Self {
        Self { context_alive }
    }

    pub fn context_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.context_alive)
    }
}

impl GraphicsApi for GlGraphics {
    fn is_context_valid(&self) -> bool {
        self.context_alive.load(Ordering::Acquire)
    }

    fn create_texture(&mut self) -> TextureId {
        let mut id = 0;
        // SAFETY: a GL context is current on this thread and `id` is a valid
        // out-pointer for one name.
        unsafe {
            gl::GenTextures(1, &mut id);
            gl::BindTexture(gl::TEXTURE_2D, id);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
        TextureId(id)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let mut id = 0;
        // SAFETY: see create_texture.
        unsafe { gl::GenFramebuffers(1, &mut id) };
        FramebufferId(id)
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        unsafe { gl::BindTexture(gl::TEXTURE_2D, texture.map_or(0, |t| t.0)) };
    }

    fn tex_image_2d_rgb(&mut self, width: u32, height: u32) {
        // SAFETY: a null data pointer only allocates storage.
        unsafe {
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGB as i32,
                width as i32,
                height as i32,
                0,
                gl::RGB,
                gl::UNSIGNED_BYTE,
                std::ptr::null(),
            );
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        unsafe { gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.map_or(0, |f| f.0)) };
    }

    fn framebuffer_texture_2d(&mut self, texture: TextureId) {
        unsafe {
            gl::FramebufferTexture2D(
                gl::FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                texture.0,
                0,
            );
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        unsafe { gl::DeleteTextures(1, &texture.0) };
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        unsafe { gl::DeleteFramebuffers(1, &framebuffer.0) };
    }
}

/// Compositor that blits the whole side-by-side frame onto the window.
///
/// Used when no interlacing hardware is present, which makes the stereo
/// path visible as two half-width images.
pub struct BlitCompositor {
    context_alive: Arc<AtomicBool>,
    dest: (u32, u32),
}

impl BlitCompositor {
    pub fn new(context_alive: Arc<AtomicBool>) -> Self {
        Self {
            context_alive,
            dest: (0, 0),
        }
    }

    /// Destination rectangle `(x0, y0, x1, y1)`, flipped vertically so the
    /// engine's top-down rows land the right way up.
    fn dest_rect(&self) -> (i32, i32, i32, i32) {
        let (w, h) = self.dest;
        (0, h as i32, w as i32, 0)
    }
}

impl Compositor for BlitCompositor {
    fn resize(&mut self, width: u32, height: u32) {
        self.dest = (width, height);
    }

    fn composite(&mut self, frame: &StereoFrame) {
        if !self.context_alive.load(Ordering::Acquire) || self.dest.0 == 0 || self.dest.1 == 0 {
            return;
        }
        let (dx0, dy0, dx1, dy1) = self.dest_rect();
        unsafe {
            gl::BindFramebuffer(gl::READ_FRAMEBUFFER, frame.framebuffer.0);
            gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, 0);
            gl::BlitFramebuffer(
                0,
                0,
                frame.width as i32,
                frame.height as i32,
                dx0,
                dy0,
                dx1,
                dy1,
                gl::COLOR_BUFFER_BIT,
                gl::LINEAR,
            );
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }
    }
}
