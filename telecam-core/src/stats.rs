//! Stream counters and rolling-rate estimates.
//!
//! The receiver and sender tasks bump lock-free counters in
//! [`StreamCounters`]. The stream controller samples them once per tick,
//! feeds the deltas into [`RateMeter`]s and publishes a [`StreamStats`]
//! snapshot over a `watch` channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Rolling-window rate meter.
///
/// Records `(timestamp, amount)` samples and reports the average rate
/// per second over the most recent `window`.
#[derive(Debug)]
pub struct RateMeter {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    total: u64,
}

impl RateMeter {
    /// Meter with a 1-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            window,
            total: 0,
        }
    }

    pub fn record(&mut self, amount: u64) {
        self.record_at(Instant::now(), amount);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, amount: u64) {
        self.samples.push_back((when, amount));
        self.total += amount;
        self.evict(when);
    }

    /// Average rate per second over the window.
    ///
    /// Callers that want a stalled stream to decay towards zero should
    /// keep recording zero-sized samples.
    pub fn per_second(&self) -> f64 {
        let (Some(&(first, first_amount)), Some(&(last, _))) =
            (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let span = last.duration_since(first);
        if span.is_zero() {
            return 0.0;
        }
        // The first sample marks the start of the span; its amount
        // accrued before it.
        (self.total - first_amount) as f64 / span.as_secs_f64()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, amount)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total = self.total.saturating_sub(amount);
            } else {
                break;
            }
        }
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Counters ─────────────────────────────────────────────────────

/// Monotonic counters shared by the link tasks.
#[derive(Debug, Default)]
pub struct StreamCounters {
    bytes_received: AtomicU64,
    slices_received: AtomicU64,
    slices_discarded: AtomicU64,
    acks_received: AtomicU64,
    framing_errors: AtomicU64,
    frames_completed: AtomicU64,
    frames_superseded: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    commands_sent: AtomicU64,
    commands_failed: AtomicU64,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $name(&self, n: u64) {
                self.$field.fetch_add(n, Ordering::Relaxed);
            }
        )*
    };
}

impl StreamCounters {
    bump! {
        add_bytes => bytes_received,
        add_slices => slices_received,
        add_discarded => slices_discarded,
        add_acks => acks_received,
        add_framing_errors => framing_errors,
        add_completed => frames_completed,
        add_superseded => frames_superseded,
        add_delivered => frames_delivered,
        add_dropped => frames_dropped,
        add_commands_sent => commands_sent,
        add_commands_failed => commands_failed,
    }

    /// Point-in-time copy of every counter. Rates are left at zero.
    pub fn snapshot(&self) -> StreamStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StreamStats {
            bytes_received: get(&self.bytes_received),
            slices_received: get(&self.slices_received),
            slices_discarded: get(&self.slices_discarded),
            acks_received: get(&self.acks_received),
            framing_errors: get(&self.framing_errors),
            frames_completed: get(&self.frames_completed),
            frames_superseded: get(&self.frames_superseded),
            frames_delivered: get(&self.frames_delivered),
            frames_dropped: get(&self.frames_dropped),
            commands_sent: get(&self.commands_sent),
            commands_failed: get(&self.commands_failed),
            frames_per_second: 0.0,
            bytes_per_second: 0.0,
        }
    }
}

/// Published once per controller tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub bytes_received: u64,
    pub slices_received: u64,
    pub slices_discarded: u64,
    pub acks_received: u64,
    pub framing_errors: u64,
    pub frames_completed: u64,
    pub frames_superseded: u64,
    /// Frames handed to the event channel.
    pub frames_delivered: u64,
    /// Frames the event channel had no room for.
    pub frames_dropped: u64,
    pub commands_sent: u64,
    pub commands_failed: u64,
    pub frames_per_second: f64,
    pub bytes_per_second: f64,
}
