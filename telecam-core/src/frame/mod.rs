//! Frame buffers: raw RGB565 slots, converted display frames and the
//! hand-off between the receiving task and the display tick.

pub mod store;
pub mod types;

pub use store::{FrameStore, ReadyFrames};
pub use types::{BufferMode, DisplayFrame, FrameFormat};
