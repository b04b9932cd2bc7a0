//! Domain-specific error types for the telecam link.
//!
//! Transport failures end the task that hit them and surface through
//! [`Link::close`](crate::link::Link::close). Framing failures are
//! recoverable: the framer drops the frame in progress and keeps going.

use std::net::SocketAddr;
use thiserror::Error;

/// The canonical error type for link setup and the receive/send tasks.
#[derive(Debug, Error)]
pub enum LinkError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The UDP socket could not be bound to the local address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The socket or serial port reported an I/O error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    // ── Framing Errors ───────────────────────────────────────────
    /// A datagram did not carry exactly one slice.
    #[error("slice size mismatch: expected {expected} bytes, got {actual}")]
    SliceSize { expected: usize, actual: usize },

    // ── Setup Errors ─────────────────────────────────────────────
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A link task panicked or was aborted.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// ── FramingError ──────────────────────────────────────────────────

/// Recoverable failure while extracting a sentinel-delimited frame.
///
/// The codec has already reset its accumulator when it returns one of
/// these; the caller only needs to count it and keep reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// A payload character was not a hexadecimal digit.
    #[error("invalid hex digit {byte:#04x} at payload offset {position}")]
    InvalidHex { position: usize, byte: u8 },

    /// A start marker was seen but no end marker followed in time.
    #[error("payload exceeded {max} characters without an end marker (got {len})")]
    Overlong { len: usize, max: usize },

    /// The underlying reader failed.
    #[error("read error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FramingError {
    fn from(e: std::io::Error) -> Self {
        FramingError::Io(e.to_string())
    }
}

// ── CommandError ──────────────────────────────────────────────────

/// Errors produced on the outbound command channel.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A byte did not map to any known opcode.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// A command name could not be parsed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The transport refused the write.
    #[error("send failed: {0}")]
    Send(#[from] std::io::Error),
}
