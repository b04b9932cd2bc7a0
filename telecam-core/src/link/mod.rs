//! Running links: the receiver, command sender and display-tick tasks
//! for one endpoint, owned through a [`Link`] handle.

pub mod event;
pub mod serial;
pub mod udp;

pub use event::{EventSender, LinkEndpoint, LinkEvent};
pub use serial::{SerialLink, SerialLinkConfig};
pub use udp::{UdpLink, UdpLinkConfig};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::command::{Command, CommandMailbox, CommandSender, CommandSink};
use crate::controller::{StreamConfig, StreamController};
use crate::error::LinkError;
use crate::frame::ReadyFrames;
use crate::stats::{StreamCounters, StreamStats};

const CLOSED_EVENT_TIMEOUT: Duration = Duration::from_millis(250);

type LinkTask = (&'static str, JoinHandle<Result<(), LinkError>>);

// ── LinkRuntime ──────────────────────────────────────────────────

/// Plumbing shared by every transport while a link is being assembled.
pub(crate) struct LinkRuntime {
    endpoint: LinkEndpoint,
    announced: bool,
    cancel: CancellationToken,
    mailbox: CommandMailbox,
    events: EventSender,
    events_rx: mpsc::Receiver<LinkEvent>,
    counters: Arc<StreamCounters>,
    stats_rx: watch::Receiver<StreamStats>,
    controller: StreamController,
    tasks: Vec<LinkTask>,
}

impl LinkRuntime {
    /// Sets up the channels. Nothing is spawned or announced until a
    /// task is added.
    pub(crate) fn new(endpoint: LinkEndpoint, stream: &StreamConfig, frames: ReadyFrames) -> Self {
        let cancel = CancellationToken::new();
        let (events, events_rx) = EventSender::channel(stream.event_queue);
        let counters = Arc::new(StreamCounters::default());
        let (stats_tx, stats_rx) = watch::channel(StreamStats::default());
        let controller = StreamController::new(
            frames,
            events.clone(),
            counters.clone(),
            stats_tx,
            stream.tick_interval,
        );

        Self {
            endpoint,
            announced: false,
            cancel,
            mailbox: CommandMailbox::new(),
            events,
            events_rx,
            counters,
            stats_rx,
            controller,
            tasks: Vec::with_capacity(3),
        }
    }

    pub(crate) fn counters(&self) -> Arc<StreamCounters> {
        self.counters.clone()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Queue `Established` ahead of anything a task may report.
    fn announce(&mut self) {
        if self.announced {
            return;
        }
        self.announced = true;
        info!(endpoint = %self.endpoint, "link established");
        self.events.emit(LinkEvent::Established(self.endpoint.clone()));
    }

    pub(crate) fn spawn_sender<S>(&mut self, sink: S)
    where
        S: CommandSink + 'static,
    {
        self.announce();
        let sender = CommandSender::new(
            self.mailbox.clone(),
            sink,
            self.events.clone(),
            self.counters.clone(),
        );
        let token = self.cancel.clone();
        let handle = tokio::spawn(async move {
            sender.run(token).await;
            Ok(())
        });
        self.tasks.push(("sender", handle));
    }

    /// Spawn an async receiver. An error ends the whole link.
    pub(crate) fn spawn_receiver<F>(&mut self, receiver: F)
    where
        F: Future<Output = Result<(), LinkError>> + Send + 'static,
    {
        self.announce();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let result = receiver.await;
            report_failure("receiver", &result, &events, &cancel);
            result
        });
        self.tasks.push(("receiver", handle));
    }

    /// Spawn a receiver that does blocking reads on the blocking pool.
    pub(crate) fn spawn_blocking_receiver<F>(&mut self, receiver: F)
    where
        F: FnOnce() -> Result<(), LinkError> + Send + 'static,
    {
        self.announce();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let result = receiver();
            report_failure("receiver", &result, &events, &cancel);
            result
        });
        self.tasks.push(("receiver", handle));
    }

    /// Start the display tick and hand the running tasks to a [`Link`].
    pub(crate) fn establish(mut self) -> Link {
        self.announce();
        let token = self.cancel.clone();
        let controller = self.controller;
        self.tasks.push((
            "controller",
            tokio::spawn(async move {
                controller.run(token).await;
                Ok(())
            }),
        ));

        Link {
            endpoint: self.endpoint,
            cancel: self.cancel,
            mailbox: self.mailbox,
            events: self.events,
            events_rx: Some(self.events_rx),
            stats_rx: self.stats_rx,
            tasks: self.tasks,
        }
    }
}

fn report_failure(
    task: &'static str,
    result: &Result<(), LinkError>,
    events: &EventSender,
    cancel: &CancellationToken,
) {
    if let Err(e) = result {
        error!(task, error = %e, "link task failed");
        events.emit_reserved(LinkEvent::Failed {
            task,
            error: e.to_string(),
        });
        cancel.cancel();
    }
}

// ── Link ─────────────────────────────────────────────────────────

/// Handle to a running link.
///
/// Dropping the handle cancels the tasks without waiting for them;
/// prefer [`Link::close`].
pub struct Link {
    endpoint: LinkEndpoint,
    cancel: CancellationToken,
    mailbox: CommandMailbox,
    events: EventSender,
    events_rx: Option<mpsc::Receiver<LinkEvent>>,
    stats_rx: watch::Receiver<StreamStats>,
    tasks: Vec<LinkTask>,
}

impl Link {
    pub fn endpoint(&self) -> &LinkEndpoint {
        &self.endpoint
    }

    /// The `command_requested` entry point. Clone it into the UI layer.
    pub fn commands(&self) -> CommandMailbox {
        self.mailbox.clone()
    }

    /// Deposit a command, replacing any not yet sent.
    pub fn request(&self, cmd: Command) {
        self.mailbox.deposit(cmd);
    }

    /// The event stream. Returns `None` after the first call.
    pub fn events(&mut self) -> Option<mpsc::Receiver<LinkEvent>> {
        self.events_rx.take()
    }

    pub fn stats(&self) -> watch::Receiver<StreamStats> {
        self.stats_rx.clone()
    }

    /// Whether the link is shutting down, either because `close` was
    /// called or because a task failed.
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the link starts shutting down.
    pub async fn closing(&self) {
        self.cancel.cancelled().await;
    }

    /// Cancel every task, wait for them and report the first error.
    pub async fn close(mut self) -> Result<(), LinkError> {
        self.cancel.cancel();

        let mut first_error = None;
        for (name, handle) in std::mem::take(&mut self.tasks) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join) => Err(LinkError::Task(join)),
            };
            if let Err(e) = outcome {
                debug!(task = name, error = %e, "link task ended with error");
                first_error.get_or_insert(e);
            }
        }

        info!(endpoint = %self.endpoint, "link closed");
        let closed = LinkEvent::Closed {
            error: first_error.as_ref().map(ToString::to_string),
        };
        // Nobody may be draining the queue any more.
        if tokio::time::timeout(CLOSED_EVENT_TIMEOUT, self.events.emit_wait(closed))
            .await
            .is_err()
        {
            debug!("event queue full, closed notification not delivered");
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
