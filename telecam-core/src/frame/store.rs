//! Raw frame slots and the ready-frame hand-off.
//!
//! The [`FrameStore`] is owned by whichever task drives a framer. It
//! fills one raw slot at a time; on completion it converts that slot to
//! RGB888, publishes the result as an immutable [`DisplayFrame`] and, in
//! double-buffer mode, moves the fill index to the other slot.
//!
//! Readers hold a [`ReadyFrames`] handle. Publishing goes through a
//! `tokio::sync::watch` channel whose "changed" state is the ready flag:
//! it is set by [`FrameStore::mark_frame_complete`] and cleared by
//! [`ReadyFrames::take_ready_frame`]. Neither side ever holds a lock
//! while filling or rendering, and a reader can never observe a frame
//! that is still being written because published frames are never
//! mutated again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::frame::types::{BufferMode, DisplayFrame, FrameFormat};
use crate::pixel;

// ── ReadyFrames ──────────────────────────────────────────────────

/// Reader side of the frame store.
///
/// Clone this into the display task. Each clone tracks its own ready
/// flag, so two readers both see every frame.
#[derive(Clone)]
pub struct ReadyFrames {
    rx: watch::Receiver<Option<DisplayFrame>>,
    last_taken: Arc<AtomicU64>,
}

impl ReadyFrames {
    /// Returns the latest completed frame if one arrived since the last
    /// call, clearing the ready flag. Never blocks.
    pub fn take_ready_frame(&mut self) -> Option<DisplayFrame> {
        // An Err here means the store is gone; nothing new will arrive.
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        let frame = self.rx.borrow_and_update().clone()?;
        self.last_taken.fetch_max(frame.sequence, Ordering::AcqRel);
        Some(frame)
    }

    /// Whether a frame is waiting to be taken.
    pub fn is_ready(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait until the next frame is published.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn next_frame(&mut self) -> Option<DisplayFrame> {
        self.rx.changed().await.ok()?;
        let frame = self.rx.borrow_and_update().clone()?;
        self.last_taken.fetch_max(frame.sequence, Ordering::AcqRel);
        Some(frame)
    }
}

// ── FrameStore ───────────────────────────────────────────────────

/// Owner of the raw frame slots.
pub struct FrameStore {
    format: FrameFormat,
    mode: BufferMode,
    slots: Vec<Box<[u8]>>,
    /// Slot currently being written.
    fill: usize,
    /// Slot holding the most recently completed frame.
    completed: Option<usize>,
    sequence: u64,
    superseded: u64,
    publisher: watch::Sender<Option<DisplayFrame>>,
    local: ReadyFrames,
}

impl FrameStore {
    /// Create a QVGA store in the given buffering mode.
    pub fn new(mode: BufferMode) -> Self {
        Self::with_format(FrameFormat::QVGA, mode)
    }

    pub(crate) fn with_format(format: FrameFormat, mode: BufferMode) -> Self {
        let slots = (0..mode.slot_count())
            .map(|_| vec![0u8; format.raw_len()].into_boxed_slice())
            .collect();
        let (publisher, rx) = watch::channel(None);
        Self {
            format,
            mode,
            slots,
            fill: 0,
            completed: None,
            sequence: 0,
            superseded: 0,
            publisher,
            local: ReadyFrames {
                rx,
                last_taken: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    /// Size of one raw slot in bytes.
    pub fn raw_len(&self) -> usize {
        self.format.raw_len()
    }

    /// Index of the slot currently being written.
    pub fn fill_index(&self) -> usize {
        self.fill
    }

    /// Number of frames completed so far.
    pub fn frames_completed(&self) -> u64 {
        self.sequence
    }

    /// Frames that were replaced before any reader took them.
    pub fn frames_superseded(&self) -> u64 {
        self.superseded
    }

    /// A new reader handle for the display side.
    pub fn ready_frames(&self) -> ReadyFrames {
        ReadyFrames {
            rx: self.publisher.subscribe(),
            last_taken: Arc::clone(&self.local.last_taken),
        }
    }

    /// Copy `bytes` into the active slot at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the write would run past the end of the slot. Offsets
    /// must come from validated slice indices; an overrun is a bug in
    /// the caller, not bad input.
    pub fn write_slice(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.format.raw_len());
        let Some(end) = end else {
            panic!(
                "frame store overrun: offset {offset} + {} bytes exceeds raw buffer of {} bytes",
                bytes.len(),
                self.format.raw_len()
            );
        };
        trace!(offset, len = bytes.len(), slot = self.fill, "slice written");
        self.slots[self.fill][offset..end].copy_from_slice(bytes);
    }

    /// Mutable access to the whole active slot, for framers that decode
    /// in place.
    pub(crate) fn active_slot_mut(&mut self) -> &mut [u8] {
        &mut self.slots[self.fill]
    }

    /// Convert the just-filled slot, publish it and rotate slots.
    ///
    /// Returns the published frame's sequence number.
    pub fn mark_frame_complete(&mut self) -> u64 {
        let mut rgb = vec![0u8; self.format.display_len()];
        pixel::convert_frame(&self.slots[self.fill], &mut rgb);

        self.sequence += 1;
        let frame = DisplayFrame {
            sequence: self.sequence,
            completed_at: Instant::now(),
            format: self.format,
            data: rgb.into(),
        };

        // The previous frame was never taken by any reader.
        if self.sequence > 1 && self.local.last_taken.load(Ordering::Acquire) < self.sequence - 1 {
            self.superseded += 1;
        }

        self.publisher.send_replace(Some(frame));
        self.completed = Some(self.fill);
        self.fill = (self.fill + 1) % self.slots.len();

        debug!(
            sequence = self.sequence,
            next_slot = self.fill,
            "frame complete"
        );
        self.sequence
    }

    /// Non-blocking poll on the store's own reader handle.
    pub fn take_ready_frame(&mut self) -> Option<DisplayFrame> {
        self.local.take_ready_frame()
    }

    /// The raw bytes of the most recently completed frame.
    ///
    /// In [`BufferMode::Single`] the slot is reused immediately, so the
    /// contents may already hold part of the next frame.
    pub fn last_raw_frame(&self) -> Option<&[u8]> {
        self.completed.map(|idx| &*self.slots[idx])
    }
}

// ── Tests ────────────────────────────────────────────────────────
