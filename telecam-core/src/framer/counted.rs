//! Counted-slice framing for the UDP transport.
//!
//! A frame is `raw_len / slice_size` consecutive slices. The framer
//! counts accepted slices, writes slice `k` at offset `k * slice_size`
//! and completes the frame after the last one. There is no sequence
//! header on the wire, so after `k` lost datagrams every later frame
//! stays shifted by `k` slices. The shift persists until further loss
//! happens to bring the count back into step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::Datagram;
use crate::error::LinkError;
use crate::frame::FrameStore;
use crate::stats::StreamCounters;

/// What to do with a datagram that is neither a slice nor an ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlicePolicy {
    /// Stop the link with [`LinkError::SliceSize`].
    #[default]
    Strict,
    /// Log, count and discard it.
    Drop,
}

pub struct CountedSliceFramer {
    store: FrameStore,
    slice_size: usize,
    slice_count: usize,
    slices_received: usize,
    policy: SlicePolicy,
    counters: Arc<StreamCounters>,
}

impl CountedSliceFramer {
    /// Fails if `slice_size` is zero or does not divide the frame.
    pub fn new(
        store: FrameStore,
        slice_size: usize,
        policy: SlicePolicy,
        counters: Arc<StreamCounters>,
    ) -> Result<Self, LinkError> {
        let raw_len = store.raw_len();
        if slice_size == 0 || raw_len % slice_size != 0 {
            return Err(LinkError::InvalidConfig(format!(
                "slice size {slice_size} does not divide the {raw_len}-byte frame"
            )));
        }
        Ok(Self {
            slice_count: raw_len / slice_size,
            store,
            slice_size,
            slices_received: 0,
            policy,
            counters,
        })
    }

    pub fn slice_size(&self) -> usize {
        self.slice_size
    }

    /// Slices per frame.
    pub fn slice_count(&self) -> usize {
        self.slice_count
    }

    /// Slices accepted towards the current frame.
    pub fn slices_received(&self) -> usize {
        self.slices_received
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Drop the partially received frame.
    pub fn reset(&mut self) {
        if self.slices_received != 0 {
            debug!(discarded = self.slices_received, "partial frame reset");
        }
        self.slices_received = 0;
    }

    /// Route one classified datagram.
    ///
    /// Returns the sequence number of the frame it completed, if any.
    pub fn accept(&mut self, datagram: Datagram) -> Result<Option<u64>, LinkError> {
        match datagram {
            Datagram::Slice(bytes) => Ok(self.push_slice(&bytes)),
            Datagram::Ack(code) => {
                debug!(code, "ack from peer");
                self.counters.add_acks(1);
                Ok(None)
            }
            Datagram::Mismatched(bytes) => match self.policy {
                SlicePolicy::Strict => Err(LinkError::SliceSize {
                    expected: self.slice_size,
                    actual: bytes.len(),
                }),
                SlicePolicy::Drop => {
                    warn!(
                        expected = self.slice_size,
                        actual = bytes.len(),
                        "discarding datagram of unexpected size"
                    );
                    self.counters.add_discarded(1);
                    Ok(None)
                }
            },
        }
    }

    /// Store one slice.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is not exactly one slice long.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Option<u64> {
        assert_eq!(
            bytes.len(),
            self.slice_size,
            "slice of {} bytes pushed into a {}-byte framer",
            bytes.len(),
            self.slice_size
        );
        self.store
            .write_slice(self.slices_received * self.slice_size, bytes);
        self.slices_received += 1;
        self.counters.add_slices(1);
        self.counters.add_bytes(bytes.len() as u64);

        if self.slices_received < self.slice_count {
            return None;
        }
        self.slices_received = 0;
        let superseded_before = self.store.frames_superseded();
        let sequence = self.store.mark_frame_complete();
        self.counters.add_completed(1);
        self.counters
            .add_superseded(self.store.frames_superseded() - superseded_before);
        Some(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::BufferMode;
    use bytes::Bytes;

    const QVGA_RAW: usize = 320 * 240 * 2;

    fn framer(slice_size: usize, policy: SlicePolicy) -> CountedSliceFramer {
        CountedSliceFramer::new(
            FrameStore::new(BufferMode::Double),
            slice_size,
            policy,
            Arc::new(StreamCounters::default()),
        )
        .unwrap()
    }

    fn slice(k: usize, size: usize) -> Vec<u8> {
        (0..size).map(|i| ((k * 7 + i) % 251) as u8).collect()
    }

    #[test]
    fn rejects_slice_size_that_does_not_divide_frame() {
        let err = CountedSliceFramer::new(
            FrameStore::new(BufferMode::Double),
            1000,
            SlicePolicy::Strict,
            Arc::new(StreamCounters::default()),
        );
        assert!(matches!(err, Err(LinkError::InvalidConfig(_))));
    }

    #[test]
    fn default_slicing_is_240_slices() {
        assert_eq!(framer(640, SlicePolicy::Strict).slice_count(), 240);
        assert_eq!(framer(1280, SlicePolicy::Strict).slice_count(), 120);
    }

    #[test]
    fn full_frame_is_concatenation_and_completes_once() {
        let mut f = framer(640, SlicePolicy::Strict);
        let mut expected = Vec::with_capacity(QVGA_RAW);
        let mut completions = Vec::new();
        for k in 0..240 {
            let s = slice(k, 640);
            expected.extend_from_slice(&s);
            if let Some(seq) = f.push_slice(&s) {
                completions.push((k, seq));
            }
        }
        assert_eq!(completions, vec![(239, 1)]);
        assert_eq!(f.store().last_raw_frame().unwrap(), &expected[..]);
        assert_eq!(f.slices_received(), 0);
    }

    #[test]
    fn lost_slice_shifts_every_later_frame() {
        let mut f = framer(640, SlicePolicy::Strict);
        // First frame arrives one slice short.
        for k in 1..240 {
            assert_eq!(f.push_slice(&slice(k, 640)), None);
        }
        // Each later frame now completes on its own first slice.
        for frame in 0..3 {
            for k in 0..240 {
                let done = f.push_slice(&slice(k, 640));
                assert_eq!(done.is_some(), k == 0, "frame {frame} slice {k}");
            }
        }
        assert_eq!(f.slices_received(), 239);
    }

    #[test]
    fn short_frame_does_not_complete() {
        let mut f = framer(1280, SlicePolicy::Strict);
        for k in 0..119 {
            assert_eq!(f.push_slice(&slice(k, 1280)), None);
        }
        assert_eq!(f.slices_received(), 119);
        f.reset();
        assert_eq!(f.slices_received(), 0);
        assert_eq!(f.store().frames_completed(), 0);
    }

    #[test]
    fn acks_are_counted_not_stored() {
        let mut f = framer(640, SlicePolicy::Strict);
        assert_eq!(f.accept(Datagram::Ack(0x01)).unwrap(), None);
        assert_eq!(f.slices_received(), 0);
    }

    #[test]
    fn strict_policy_rejects_wrong_size() {
        let mut f = framer(640, SlicePolicy::Strict);
        let err = f.accept(Datagram::Mismatched(Bytes::from(vec![0u8; 17])));
        assert!(matches!(
            err,
            Err(LinkError::SliceSize {
                expected: 640,
                actual: 17
            })
        ));
    }

    #[test]
    fn drop_policy_discards_wrong_size() {
        let mut f = framer(640, SlicePolicy::Drop);
        f.accept(Datagram::Slice(Bytes::from(slice(0, 640)))).unwrap();
        assert_eq!(
            f.accept(Datagram::Mismatched(Bytes::from(vec![0u8; 3])))
                .unwrap(),
            None
        );
        assert_eq!(f.slices_received(), 1);
    }

    #[test]
    #[should_panic(expected = "slice of 10 bytes")]
    fn push_slice_checks_length() {
        framer(640, SlicePolicy::Strict).push_slice(&[0u8; 10]);
    }
}
