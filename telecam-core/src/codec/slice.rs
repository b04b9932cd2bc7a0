//! Datagram classifier for the counted-slice UDP stream.
//!
//! Plugged into `tokio_util::udp::UdpFramed`, which hands the decoder
//! exactly one datagram at a time. The codec never buffers across
//! datagrams: each call either yields the whole datagram or nothing.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// One inbound datagram, sorted by length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    /// Exactly one slice of frame data.
    Slice(Bytes),
    /// A single-byte acknowledgement from the remote peer.
    Ack(u8),
    /// Anything else. Whether this is fatal is up to the framer.
    Mismatched(Bytes),
}

/// Splits the UDP stream into [`Datagram`]s of a fixed slice size.
#[derive(Debug, Clone)]
pub struct SliceCodec {
    slice_size: usize,
}

impl SliceCodec {
    pub fn new(slice_size: usize) -> Self {
        Self { slice_size }
    }

    pub fn slice_size(&self) -> usize {
        self.slice_size
    }
}

impl Decoder for SliceCodec {
    type Item = Datagram;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let data = src.split().freeze();
        let item = match data.len() {
            n if n == self.slice_size => Datagram::Slice(data),
            1 => Datagram::Ack(data[0]),
            _ => Datagram::Mismatched(data),
        };
        Ok(Some(item))
    }
}
