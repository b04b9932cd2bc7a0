//! # telecam-core
//!
//! Receive side of a remote camera link: reassembles RGB565 frames sent
//! over UDP or a serial line, converts them to RGB888 for display and
//! sends single-byte motion and stream commands back.
//!
//! This crate contains:
//! - **Pixel codec**: `rgb565_to_rgb888` and whole-frame conversion
//! - **Frame store**: raw slots, ready-flag hand-off, `DisplayFrame`
//! - **Codecs**: `SliceCodec`, `SentinelCodec`, `CommandCodec` for `tokio_util`
//! - **Framers**: `CountedSliceFramer` (UDP) and `SentinelFramer` (serial)
//! - **Commands**: `Command`, the single-slot `CommandMailbox`, `CommandSink`
//! - **Controller**: the display-tick task
//! - **Links**: `UdpLink` / `SerialLink` returning a `Link` handle
//! - **Error**: `LinkError`, `FramingError`, `CommandError` (`thiserror`)

pub mod codec;
pub mod command;
pub mod controller;
pub mod error;
pub mod frame;
pub mod framer;
pub mod link;
pub mod pixel;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{CommandCodec, Datagram, HexPayload, SentinelCodec, SliceCodec};
pub use command::{Command, CommandMailbox, CommandSink, Opcode};
pub use controller::{StreamConfig, StreamController};
pub use error::{CommandError, FramingError, LinkError};
pub use frame::{BufferMode, DisplayFrame, FrameFormat, FrameStore, ReadyFrames};
pub use framer::{CountedSliceFramer, SentinelFramer, SlicePolicy};
pub use link::{
    Link, LinkEndpoint, LinkEvent, SerialLink, SerialLinkConfig, UdpLink, UdpLinkConfig,
};
pub use pixel::{convert_frame, rgb565_to_rgb888};
pub use stats::{RateMeter, StreamStats};
