//! Single-slot, last-writer-wins command mailbox.
//!
//! The slot is a `std::sync::Mutex<Option<Command>>` that is only ever
//! held for a swap, paired with a `tokio::sync::Notify` that plays the
//! role of the condition variable. `Notify` keeps at most one permit,
//! so any number of deposits while the sender is busy wake it once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::debug;

use crate::command::types::Command;

#[derive(Debug, Default)]
struct Inner {
    slot: Mutex<Option<Command>>,
    notify: Notify,
    deposits: AtomicU64,
    overwritten: AtomicU64,
}

/// Producer/consumer handle to the mailbox. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CommandMailbox {
    inner: Arc<Inner>,
}

impl CommandMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Command>> {
        // The slot holds plain data; a panic elsewhere cannot leave it
        // half-updated.
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put `cmd` in the slot, replacing anything not yet sent, and wake
    /// the sender.
    ///
    /// Returns the command that was overwritten, if any.
    pub fn deposit(&self, cmd: Command) -> Option<Command> {
        let replaced = self.slot().replace(cmd);
        self.inner.deposits.fetch_add(1, Ordering::Relaxed);
        if let Some(old) = replaced {
            self.inner.overwritten.fetch_add(1, Ordering::Relaxed);
            debug!(%old, new = %cmd, "pending command overwritten");
        }
        self.inner.notify.notify_one();
        replaced
    }

    /// Remove and return the pending command without waiting.
    pub fn take(&self) -> Option<Command> {
        self.slot().take()
    }

    /// Peek at the pending command.
    pub fn pending(&self) -> Option<Command> {
        *self.slot()
    }

    /// Wait until a command is present, then take it.
    pub async fn recv(&self) -> Command {
        loop {
            if let Some(cmd) = self.take() {
                return cmd;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Total number of deposits.
    pub fn deposits(&self) -> u64 {
        self.inner.deposits.load(Ordering::Relaxed)
    }

    /// Deposits that replaced an unsent command.
    pub fn overwritten(&self) -> u64 {
        self.inner.overwritten.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::types::Opcode;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn last_writer_wins() {
        let mb = CommandMailbox::new();
        assert_eq!(mb.deposit(Command::new(Opcode::Advance)), None);
        assert_eq!(
            mb.deposit(Command::new(Opcode::TurnLeft)),
            Some(Command::new(Opcode::Advance))
        );
        assert_eq!(mb.take(), Some(Command::new(Opcode::TurnLeft)));
        assert_eq!(mb.take(), None);
        assert_eq!(mb.deposits(), 2);
        assert_eq!(mb.overwritten(), 1);
    }

    #[test]
    fn idle_receiver_is_woken_by_deposit() {
        let mb = CommandMailbox::new();
        let mut recv = task::spawn(mb.recv());
        assert_pending!(recv.poll());

        mb.deposit(Command::stop_stream());
        assert!(recv.is_woken());
        assert_ready_eq!(recv.poll(), Command::stop_stream());
    }

    #[test]
    fn two_deposits_before_wake_deliver_only_the_second() {
        let mb = CommandMailbox::new();
        let mut recv = task::spawn(mb.recv());
        assert_pending!(recv.poll());

        mb.deposit(Command::new(Opcode::Advance));
        mb.deposit(Command::new(Opcode::Retreat));
        assert_ready_eq!(recv.poll(), Command::new(Opcode::Retreat));

        // Nothing left, and the spare permit does not produce a command.
        let mut again = task::spawn(mb.recv());
        assert_pending!(again.poll());
        assert_pending!(again.poll());
    }

    #[test]
    fn deposit_before_first_wait_is_not_lost() {
        let mb = CommandMailbox::new();
        mb.deposit(Command::start_stream());
        let mut recv = task::spawn(mb.recv());
        assert_ready_eq!(recv.poll(), Command::start_stream());
    }
}
