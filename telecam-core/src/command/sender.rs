//! The command sender task.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandMailbox, CommandSink};
use crate::link::{EventSender, LinkEvent};
use crate::stats::StreamCounters;

/// Drains the mailbox into a [`CommandSink`] until cancelled.
pub struct CommandSender<S> {
    mailbox: CommandMailbox,
    sink: S,
    events: EventSender,
    counters: Arc<StreamCounters>,
}

impl<S: CommandSink> CommandSender<S> {
    pub fn new(
        mailbox: CommandMailbox,
        sink: S,
        events: EventSender,
        counters: Arc<StreamCounters>,
    ) -> Self {
        Self {
            mailbox,
            sink,
            events,
            counters,
        }
    }

    /// Send every command deposited until `cancel` fires.
    ///
    /// A command still pending at cancellation is sent once more so a
    /// final stop-stream reaches the peer. Send failures are reported as
    /// events and never retried.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let cmd = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cmd = self.mailbox.recv() => cmd,
            };
            self.transmit(cmd).await;
        }

        if let Some(cmd) = self.mailbox.take() {
            debug!(%cmd, "flushing pending command");
            self.transmit(cmd).await;
        }
        info!("command sender stopped");
    }

    async fn transmit(&mut self, cmd: Command) {
        match self.sink.send_command(cmd).await {
            Ok(()) => {
                debug!(%cmd, "command sent");
                self.counters.add_commands_sent(1);
                self.events.emit(LinkEvent::CommandSent(cmd));
            }
            Err(e) => {
                warn!(%cmd, error = %e, "command send failed");
                self.counters.add_commands_failed(1);
                self.events.emit(LinkEvent::CommandFailed {
                    command: cmd,
                    error: e.to_string(),
                });
            }
        }
    }
}
