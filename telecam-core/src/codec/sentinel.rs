//! Sentinel-delimited hex framing for the serial variant.
//!
//! ## Wire format
//!
//! ```text
//! "FF11FF11FF11" <ASCII hex, two chars per raw byte> "EE22EE22EE22"
//! ```
//!
//! The decoder only finds frame boundaries and hands back the hex text
//! as a [`HexPayload`]; [`HexPayload::decode_into`] writes the raw bytes
//! straight into the destination slot, zero-padding short payloads and
//! truncating long ones.
//!
//! Bytes in front of a start marker are discarded, and every search
//! resumes where the last one stopped, so neither memory nor scan cost
//! grows with the length of the stream.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::FramingError;

// ── Constants ────────────────────────────────────────────────────

pub const START_MARKER: &[u8] = b"FF11FF11FF11";
pub const END_MARKER: &[u8] = b"EE22EE22EE22";

// ── HexPayload ───────────────────────────────────────────────────

/// The ASCII-hex text found between one pair of markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexPayload(Bytes);

impl HexPayload {
    pub fn new(text: impl Into<Bytes>) -> Self {
        Self(text.into())
    }

    /// Length of the hex text in characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode into `dst`, which defines the expected frame size.
    ///
    /// The text is treated as if right-padded with `'0'` (or cut) to
    /// exactly `2 * dst.len()` characters. An odd trailing digit
    /// therefore becomes the high nibble of the last byte.
    pub fn decode_into(&self, dst: &mut [u8]) -> Result<(), FramingError> {
        let text = &self.0[..self.0.len().min(dst.len() * 2)];
        let digit = |position: usize| -> Result<u8, FramingError> {
            match text.get(position) {
                None => Ok(0),
                Some(&byte) => hex_value(byte).ok_or(FramingError::InvalidHex { position, byte }),
            }
        };

        for (i, out) in dst.iter_mut().enumerate() {
            let hi = digit(2 * i)?;
            let lo = digit(2 * i + 1)?;
            *out = (hi << 4) | lo;
        }
        Ok(())
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── SentinelCodec ────────────────────────────────────────────────

/// Finds `START_MARKER … END_MARKER` spans in a byte stream.
#[derive(Debug, Clone)]
pub struct SentinelCodec {
    /// Offset of the payload in the buffer once a start marker is seen.
    payload_start: Option<usize>,
    /// Where the next marker search begins.
    scan_from: usize,
    /// Longest payload accepted while waiting for an end marker.
    max_payload: usize,
}

impl SentinelCodec {
    /// `max_payload` is in hex characters.
    pub fn new(max_payload: usize) -> Self {
        Self {
            payload_start: None,
            scan_from: 0,
            max_payload,
        }
    }

    /// A codec sized for frames of `raw_len` bytes. Payloads up to twice
    /// the expected length are waited for (and later truncated).
    pub fn for_frame_len(raw_len: usize) -> Self {
        Self::new(raw_len * 4)
    }

    /// Whether a start marker has been seen without its end marker.
    pub fn in_frame(&self) -> bool {
        self.payload_start.is_some()
    }

    /// Forget any partial frame. The caller clears the buffer.
    pub fn reset(&mut self) {
        self.payload_start = None;
        self.scan_from = 0;
    }
}

impl Decoder for SentinelCodec {
    type Item = HexPayload;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_start = match self.payload_start {
            Some(start) => start,
            None => match find(&src[self.scan_from.min(src.len())..], START_MARKER) {
                Some(pos) => {
                    // Drop everything before the marker.
                    src.advance(self.scan_from + pos);
                    self.payload_start = Some(START_MARKER.len());
                    self.scan_from = START_MARKER.len();
                    START_MARKER.len()
                }
                None => {
                    // Keep just enough to catch a marker split across reads.
                    let keep = START_MARKER.len() - 1;
                    if src.len() > keep {
                        src.advance(src.len() - keep);
                    }
                    self.scan_from = 0;
                    return Ok(None);
                }
            },
        };

        if let Some(pos) = find(&src[self.scan_from.min(src.len())..], END_MARKER) {
            let end = self.scan_from + pos;
            let span = src.split_to(end + END_MARKER.len()).freeze();
            self.reset();
            return Ok(Some(HexPayload(span.slice(payload_start..end))));
        }

        let len = src.len() - payload_start;
        if len > self.max_payload {
            self.reset();
            src.clear();
            return Err(FramingError::Overlong {
                len,
                max: self.max_payload,
            });
        }

        self.scan_from = src
            .len()
            .saturating_sub(END_MARKER.len() - 1)
            .max(payload_start);
        Ok(None)
    }
}

// ── Tests ────────────────────────────────────────────────────────
