//! Notifications from the link tasks to the controlling layer.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::command::Command;
use crate::frame::DisplayFrame;

/// Where a link is connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum LinkEndpoint {
    Udp { local: SocketAddr, remote: SocketAddr },
    Serial { port: String, baud_rate: u32 },
}

impl fmt::Display for LinkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEndpoint::Udp { local, remote } => write!(f, "udp {local} -> {remote}"),
            LinkEndpoint::Serial { port, baud_rate } => write!(f, "serial {port} @ {baud_rate}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The link is up. Always the first event of a link.
    Established(LinkEndpoint),
    /// A completed frame, already converted for display.
    FrameReady(DisplayFrame),
    CommandSent(Command),
    CommandFailed { command: Command, error: String },
    /// A link task stopped on a transport error. The link is shutting
    /// down; call `Link::close` to collect the error.
    Failed { task: &'static str, error: String },
    /// Emitted once by `Link::close` after every task has exited.
    Closed { error: Option<String> },
}

/// Non-blocking producer side of the event channel.
///
/// One slot beyond `capacity` is held back for the first
/// [`LinkEvent::Failed`], so a queue full of frames cannot swallow it.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<LinkEvent>,
    reserved: Arc<Mutex<Option<mpsc::OwnedPermit<LinkEvent>>>>,
}

impl EventSender {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1) + 1);
        let reserved = tx.clone().try_reserve_owned().ok();
        let sender = Self {
            tx,
            reserved: Arc::new(Mutex::new(reserved)),
        };
        (sender, rx)
    }

    /// Queue `event` without waiting. Returns `false` if the queue is
    /// full or nobody is listening any more.
    pub fn emit(&self, event: LinkEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                trace!(?event, "event queue full");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Queue `event` in the held-back slot, falling back to [`emit`]
    /// once the slot has been spent.
    ///
    /// [`emit`]: EventSender::emit
    pub fn emit_reserved(&self, event: LinkEvent) -> bool {
        let permit = self
            .reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match permit {
            Some(permit) => {
                permit.send(event);
                true
            }
            None => self.emit(event),
        }
    }

    /// Queue `event`, waiting for room. Only used for the final
    /// `Closed` notification.
    pub async fn emit_wait(&self, event: LinkEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_never_blocks_on_full_queue() {
        let (events, mut rx) = EventSender::channel(1);
        assert!(events.emit(LinkEvent::CommandSent(Command::start_stream())));
        assert!(!events.emit(LinkEvent::CommandSent(Command::stop_stream())));
        assert!(matches!(
            rx.try_recv(),
            Ok(LinkEvent::CommandSent(c)) if c == Command::start_stream()
        ));
    }

    #[test]
    fn reserved_slot_survives_a_full_queue() {
        let (events, mut rx) = EventSender::channel(1);
        assert!(events.emit(LinkEvent::CommandSent(Command::start_stream())));
        assert!(!events.emit(LinkEvent::CommandSent(Command::stop_stream())));

        let failed = || LinkEvent::Failed {
            task: "receiver",
            error: "unplugged".into(),
        };
        assert!(events.clone().emit_reserved(failed()));
        // Spent; the next one has to find ordinary room.
        assert!(!events.emit_reserved(failed()));

        assert!(matches!(rx.try_recv(), Ok(LinkEvent::CommandSent(_))));
        assert!(matches!(
            rx.try_recv(),
            Ok(LinkEvent::Failed { task: "receiver", .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn endpoint_display() {
        let ep = LinkEndpoint::Serial {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 921_600,
        };
        assert_eq!(ep.to_string(), "serial /dev/ttyUSB0 @ 921600");
    }
}
