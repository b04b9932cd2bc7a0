//! Sentinel-delimited hex framing for the serial transport.
//!
//! Bytes from the port are appended to an accumulator and run through
//! [`SentinelCodec`]. Each extracted payload is hex-decoded straight
//! into the store's active slot and completed. A payload with a bad hex
//! digit or one that overruns the accumulator bound is dropped. The
//! codec and accumulator are then reset and the framer goes back to
//! hunting for a start marker.

use std::sync::Arc;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use crate::codec::SentinelCodec;
use crate::error::FramingError;
use crate::frame::FrameStore;
use crate::stats::StreamCounters;

/// Result of one extracted span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// A frame was decoded and published with this sequence number.
    Frame(u64),
    /// A span was found but thrown away.
    Dropped(FramingError),
}

pub struct SentinelFramer {
    store: FrameStore,
    codec: SentinelCodec,
    buffer: BytesMut,
    counters: Arc<StreamCounters>,
}

impl SentinelFramer {
    pub fn new(store: FrameStore, counters: Arc<StreamCounters>) -> Self {
        let codec = SentinelCodec::for_frame_len(store.raw_len());
        Self {
            store,
            codec,
            buffer: BytesMut::with_capacity(8 * 1024),
            counters,
        }
    }

    /// Replace the codec, e.g. to change the payload bound.
    pub fn with_codec(mut self, codec: SentinelCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Bytes currently held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.codec.reset();
        self.buffer.clear();
    }

    /// Append a chunk read from the port and extract every complete
    /// span it finishes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Extracted> {
        self.counters.add_bytes(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(payload)) => {
                    match payload.decode_into(self.store.active_slot_mut()) {
                        Ok(()) => {
                            if payload.len() != self.store.raw_len() * 2 {
                                debug!(
                                    chars = payload.len(),
                                    expected = self.store.raw_len() * 2,
                                    "hex payload padded or truncated"
                                );
                            }
                            let superseded_before = self.store.frames_superseded();
                            let sequence = self.store.mark_frame_complete();
                            self.counters.add_completed(1);
                            self.counters.add_superseded(
                                self.store.frames_superseded() - superseded_before,
                            );
                            out.push(Extracted::Frame(sequence));
                        }
                        Err(e) => {
                            self.drop_frame(&e);
                            out.push(Extracted::Dropped(e));
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // The codec has already cleared its state.
                    self.drop_frame(&e);
                    out.push(Extracted::Dropped(e));
                    break;
                }
            }
        }
        out
    }

    fn drop_frame(&mut self, error: &FramingError) {
        warn!(%error, "dropping serial frame");
        self.counters.add_framing_errors(1);
        self.reset();
    }
}
