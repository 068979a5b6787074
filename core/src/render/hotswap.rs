//! Runtime replacement of the active renderer.
//!
//! The render thread calls in continuously through a shared lock; the
//! control thread swaps renderers under the exclusive lock, holding it only
//! for the pointer exchange. The replaced renderer is parked and destroyed
//! by the render thread at the start of its next frame, outside the lock, so
//! graphics objects are always released on the thread that owns the context.
//! Its successor is (re)initialized lazily on that same frame with the last
//! known surface size.
//!
//! Reinitialization failures follow [`RenderError::is_permanent`]: transient
//! failures leave the request pending and are retried every frame until they
//! succeed; permanent failures mark the renderer invalid and all further
//! frames are skipped until the next swap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{NoopRenderer, Renderer};
use crate::error::RenderError;

pub struct RendererHotSwap {
    active: RwLock<Box<dyn Renderer>>,
    needs_reinit: AtomicBool,
    /// Set once the current renderer received `on_surface_created`.
    created: AtomicBool,
    invalid: AtomicBool,
    reinit_guard: Mutex<()>,
    /// Replaced renderers awaiting destruction on the render thread.
    retired: Mutex<Vec<Box<dyn Renderer>>>,
    /// Last surface size as `width << 32 | height`; zero when unknown.
    surface_size: AtomicU64,
}

impl RendererHotSwap {
    /// Start with a no-op renderer; bind the real one with [`rebind`].
    ///
    /// [`rebind`]: Self::rebind
    pub fn new() -> Self {
        Self {
            active: RwLock::new(Box::new(NoopRenderer)),
            needs_reinit: AtomicBool::new(false),
            created: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
            reinit_guard: Mutex::new(()),
            retired: Mutex::new(Vec::new()),
            surface_size: AtomicU64::new(0),
        }
    }

    pub fn rebind(&self, renderer: Box<dyn Renderer>) {
        self.swap_renderer(renderer);
    }

    /// Install `renderer`. The previous one is destroyed by the next
    /// [`on_draw_frame`](Self::on_draw_frame) or [`destroy`](Self::destroy).
    pub fn swap_renderer(&self, renderer: Box<dyn Renderer>) {
        let old = {
            let mut active = self.active.write();
            let old = std::mem::replace(&mut *active, renderer);
            self.created.store(false, Ordering::Release);
            self.invalid.store(false, Ordering::Release);
            self.needs_reinit.store(true, Ordering::Release);
            old
        };
        tracing::debug!("renderer swapped");
        self.retired.lock().push(old);
    }

    pub fn needs_reinit(&self) -> bool {
        self.needs_reinit.load(Ordering::Acquire)
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        unpack_size(self.surface_size.load(Ordering::Acquire))
    }

    pub fn on_surface_created(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.record_size(width, height);
        let renderer = self.active.read();
        if self.invalid.load(Ordering::Acquire) {
            return Ok(());
        }
        let result = renderer.on_surface_created(width, height);
        match &result {
            Ok(()) => self.created.store(true, Ordering::Release),
            Err(e) => self.note_failure(e),
        }
        result
    }

    pub fn on_surface_changed(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.record_size(width, height);
        let renderer = self.active.read();
        if self.invalid.load(Ordering::Acquire) {
            return Ok(());
        }
        let result = renderer.on_surface_changed(width, height);
        match &result {
            // The surface callbacks already initialized the current renderer.
            Ok(()) if self.created.load(Ordering::Acquire) => {
                self.needs_reinit.store(false, Ordering::Release);
            }
            Ok(()) => {}
            Err(e) => self.note_failure(e),
        }
        result
    }

    pub fn on_resume(&self) {
        self.active.read().on_resume();
    }

    pub fn on_draw_frame(&self) {
        self.destroy_retired();
        let renderer = self.active.read();
        if self.invalid.load(Ordering::Acquire) {
            return;
        }

        if self.needs_reinit.load(Ordering::Acquire) {
            let _guard = self.reinit_guard.lock();
            if self.needs_reinit.load(Ordering::Acquire) && !self.reinitialize(&**renderer) {
                return;
            }
        }

        renderer.on_draw_frame();
    }

    /// Destroy the active renderer and any still parked, leaving a no-op in
    /// place. Call from the render thread.
    pub fn destroy(&self) {
        self.destroy_retired();
        let old = {
            let mut active = self.active.write();
            self.needs_reinit.store(false, Ordering::Release);
            std::mem::replace(&mut *active, Box::new(NoopRenderer))
        };
        old.destroy();
    }

    fn destroy_retired(&self) {
        let retired = std::mem::take(&mut *self.retired.lock());
        for renderer in retired {
            renderer.destroy();
        }
    }

    /// Returns whether the renderer is ready to draw this frame.
    fn reinitialize(&self, renderer: &dyn Renderer) -> bool {
        let Some((width, height)) = self.surface_size() else {
            return false;
        };

        let result = renderer
            .on_surface_created(width, height)
            .and_then(|()| renderer.on_surface_changed(width, height));

        match result {
            Ok(()) => {
                self.created.store(true, Ordering::Release);
                self.needs_reinit.store(false, Ordering::Release);
                tracing::debug!(width, height, "renderer reinitialized");
                true
            }
            Err(e) => {
                self.note_failure(&e);
                false
            }
        }
    }

    fn note_failure(&self, error: &RenderError) {
        if error.is_permanent() {
            tracing::warn!(%error, "renderer marked invalid");
            self.invalid.store(true, Ordering::Release);
            self.needs_reinit.store(false, Ordering::Release);
        } else {
            tracing::warn!(%error, "renderer initialization failed, retrying next frame");
            self.needs_reinit.store(true, Ordering::Release);
        }
    }

    fn record_size(&self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_size
                .store(pack_size(width, height), Ordering::Release);
        }
    }
}

impl Default for RendererHotSwap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RendererHotSwap {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn pack_size(width: u32, height: u32) -> u64 {
    (u64::from(width) << 32) | u64::from(height)
}

fn unpack_size(packed: u64) -> Option<(u32, u32)> {
    (packed != 0).then(|| ((packed >> 32) as u32, packed as u32))
}
