//! Display-tick loop.
//!
//! On every tick the controller polls the ready flag, forwards the
//! newest frame to the event channel and publishes a stats snapshot.
//! The tick never waits on the receiver: if the event queue is full the
//! frame is counted as dropped and the next tick tries again with
//! whatever is newest by then.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::frame::{BufferMode, ReadyFrames};
use crate::link::{EventSender, LinkEvent};
use crate::stats::{RateMeter, StreamCounters, StreamStats};

/// Default display rate, matching the remote camera's nominal output.
pub const DEFAULT_TICK_HZ: u32 = 30;
/// Display rates outside this range are clamped.
pub const TICK_HZ_RANGE: std::ops::RangeInclusive<u32> = 1..=120;

/// Settings shared by every transport.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub tick_interval: Duration,
    pub buffer_mode: BufferMode,
    /// Capacity of the link event channel.
    pub event_queue: usize,
}

impl StreamConfig {
    /// Interval for `hz` ticks per second, clamped to [`TICK_HZ_RANGE`].
    pub fn tick_interval_for(hz: u32) -> Duration {
        let hz = hz.clamp(*TICK_HZ_RANGE.start(), *TICK_HZ_RANGE.end());
        Duration::from_secs(1) / hz
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval: Self::tick_interval_for(DEFAULT_TICK_HZ),
            buffer_mode: BufferMode::Double,
            event_queue: 8,
        }
    }
}

pub struct StreamController {
    frames: ReadyFrames,
    events: EventSender,
    counters: Arc<StreamCounters>,
    stats_tx: watch::Sender<StreamStats>,
    tick_interval: Duration,
    fps: RateMeter,
    throughput: RateMeter,
    last: StreamStats,
}

impl StreamController {
    pub fn new(
        frames: ReadyFrames,
        events: EventSender,
        counters: Arc<StreamCounters>,
        stats_tx: watch::Sender<StreamStats>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            frames,
            events,
            counters,
            stats_tx,
            tick_interval,
            fps: RateMeter::with_window(Duration::from_secs(2)),
            throughput: RateMeter::with_window(Duration::from_secs(2)),
            last: StreamStats::default(),
        }
    }

    /// One display tick. Returns the sequence number of the frame handed
    /// to the event channel, if any.
    pub fn tick(&mut self) -> Option<u64> {
        let delivered = self.frames.take_ready_frame().and_then(|frame| {
            let sequence = frame.sequence;
            if self.events.emit(LinkEvent::FrameReady(frame)) {
                self.counters.add_delivered(1);
                Some(sequence)
            } else {
                trace!(sequence, "event queue full, frame dropped");
                self.counters.add_dropped(1);
                None
            }
        });

        let mut stats = self.counters.snapshot();
        self.fps
            .record(stats.frames_completed - self.last.frames_completed);
        self.throughput
            .record(stats.bytes_received - self.last.bytes_received);
        stats.frames_per_second = self.fps.per_second();
        stats.bytes_per_second = self.throughput.per_second();
        self.stats_tx.send_replace(stats.clone());
        self.last = stats;

        delivered
    }

    /// Tick until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
        info!(
            delivered = self.last.frames_delivered,
            dropped = self.last.frames_dropped,
            "stream controller stopped"
        );
    }
}
