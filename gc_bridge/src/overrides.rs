//! Bounded queue of operator overrides.
//!
//! Producers never block: when the queue is full the oldest pending override
//! is dropped so the most recent ones survive. The control cycle drains every
//! pending override in arrival order.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use gc_proto::ManualOverride;

#[derive(Debug, Clone)]
pub struct ManualOverrideQueue {
    sender: Sender<ManualOverride>,
    receiver: Receiver<ManualOverride>,
}

/// Outcome of [`ManualOverrideQueue::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full; the returned override was discarded to make room.
    Displaced(ManualOverride),
}

impl ManualOverrideQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self { sender, receiver }
    }

    pub fn push(&self, mut item: ManualOverride) -> PushOutcome {
        let mut displaced = None;
        loop {
            match self.sender.try_send(item) {
                Ok(()) => break,
                Err(TrySendError::Full(rejected)) => {
                    item = rejected;
                    if let Ok(oldest) = self.receiver.try_recv() {
                        tracing::warn!(
                            target: "gc_bridge::overrides",
                            command = ?oldest.command,
                            team = %oldest.team,
                            "overrides.dropped=buffer_full"
                        );
                        displaced = Some(oldest);
                    }
                }
                // both ends live in self, so the channel cannot disconnect
                Err(TrySendError::Disconnected(_)) => unreachable!("override queue disconnected"),
            }
        }
        match displaced {
            Some(oldest) => PushOutcome::Displaced(oldest),
            None => PushOutcome::Queued,
        }
    }

    /// Take the oldest pending override without blocking.
    pub fn pop(&self) -> Option<ManualOverride> {
        self.receiver.try_recv().ok()
    }

    /// Take every pending override without blocking.
    pub fn drain(&self) -> Vec<ManualOverride> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
