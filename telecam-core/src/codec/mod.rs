//! `tokio_util` codecs for the three byte streams on the link:
//! inbound UDP slices, inbound serial hex frames and outbound commands.

pub mod command;
pub mod sentinel;
pub mod slice;

pub use command::{CommandCodec, encode_command};
pub use sentinel::{END_MARKER, HexPayload, START_MARKER, SentinelCodec};
pub use slice::{Datagram, SliceCodec};
