pub mod audio;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod gamepak;
pub mod input;
pub mod render;
pub mod session;
/// Fakes for the engine, graphics and presentation seams.
///
/// Only built for this crate's tests or with the `test-utils` feature; not
/// part of the runtime API.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub mod prelude {
    pub use crate::audio::{AudioOutput, AudioSession};
    pub use crate::clock::{ClockState, EmulationClock, TickPacer};
    pub use crate::config::{RendererMode, SessionConfig};
    pub use crate::engine::{EmulationEngine, EngineHandle};
    pub use crate::error::{EngineError, GamePakError, RenderError, SessionError};
    pub use crate::gamepak::{GamePak, SaveSlot, SlotId};
    pub use crate::input::{Button, InputAggregator, InputSink, InputState};
    pub use crate::render::{FrameSource, Renderer, RendererHotSwap};
    pub use crate::session::Session;
}
