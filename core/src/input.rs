//! Controller input aggregation.
//!
//! Buttons are folded into a single [`InputState`] word held in an atomic.
//! The control thread mutates it; the engine sees it only through
//! [`InputSink::update_input`], which is called once per change.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

/// Logical buttons, in engine bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Right = 4,
    Left = 5,
    Up = 6,
    Down = 7,
    R = 8,
    L = 9,
}

impl Button {
    pub const ALL: [Button; 10] = [
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::R,
        Button::L,
    ];

    pub const fn mask(self) -> u32 {
        1 << self as u8
    }
}

/// Button bitmask as handed to the engine.
///
/// The idle value is [`InputState::SIGNATURE`], not zero; the signature bits
/// live above the button range and are never touched by button operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputState(u32);

impl InputState {
    pub const SIGNATURE: u32 = 0x5A00_0000;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_pressed(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    #[must_use]
    pub const fn with(self, button: Button) -> Self {
        Self(self.0 | button.mask())
    }

    #[must_use]
    pub const fn without(self, button: Button) -> Self {
        Self(self.0 & !button.mask())
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self(Self::SIGNATURE)
    }
}

impl fmt::Debug for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputState({:#010x})", self.0)
    }
}

/// Receiver of published input masks.
pub trait InputSink: Send + Sync {
    fn update_input(&self, state: InputState);
}

/// Folds button events into one mask and publishes every change.
///
/// Mutations and their publish happen under one lock, so concurrent callers
/// publish in the order their changes were applied and the sink always ends
/// up holding the current mask. Readers of [`state`](Self::state) never
/// take the lock.
pub struct InputAggregator {
    state: AtomicU32,
    publish: Mutex<()>,
    sink: Arc<dyn InputSink>,
}

impl InputAggregator {
    pub fn new(sink: Arc<dyn InputSink>) -> Self {
        Self {
            state: AtomicU32::new(InputState::SIGNATURE),
            publish: Mutex::new(()),
            sink,
        }
    }

    pub fn state(&self) -> InputState {
        InputState(self.state.load(Ordering::Acquire))
    }

    pub fn press(&self, button: Button) {
        self.apply(|state| state.with(button));
    }

    pub fn release(&self, button: Button) {
        self.apply(|state| state.without(button));
    }

    /// Apply every press, then every release, and publish at most once.
    pub fn update(&self, pressed: &[Button], released: &[Button]) {
        self.apply(|mut state| {
            for &button in pressed {
                state = state.with(button);
            }
            for &button in released {
                state = state.without(button);
            }
            state
        });
    }

    /// Release every button.
    pub fn clear(&self) {
        self.apply(|_| InputState::default());
    }

    fn apply(&self, change: impl FnOnce(InputState) -> InputState) {
        let _guard = self.publish.lock();
        let current = self.state();
        let next = change(current);
        if next != current {
            self.state.store(next.0, Ordering::Release);
            tracing::trace!(state = ?next, "publishing input");
            self.sink.update_input(next);
        }
    }
}
