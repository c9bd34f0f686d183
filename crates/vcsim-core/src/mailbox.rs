//! Per-process mailboxes and the registry that routes to them
//!
//! Every process owns exactly one [`Mailbox`]: an unbounded FIFO with many
//! writers (any process holding an edge to the owner) and a single reader
//! (the owner). The [`MailboxRegistry`] is built once per run and handed to
//! each process by `Arc`, so repeated runs never share queues.

use crate::clock::ProcessId;
use crate::message::Message;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Receiving half of one process's mailbox
#[derive(Debug)]
pub struct Mailbox {
    owner: ProcessId,
    inbox: UnboundedReceiver<Message>,
}

impl Mailbox {
    /// Process that owns this mailbox
    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    /// Dequeue one message without waiting
    pub fn try_next(&mut self) -> Option<Message> {
        match self.inbox.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Dequeue everything currently queued, in arrival order
    pub fn drain(&mut self) -> Vec<Message> {
        let mut drained = Vec::with_capacity(self.inbox.len());
        while let Some(message) = self.try_next() {
            drained.push(message);
        }
        drained
    }

    /// Wait for the next message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbox.recv().await
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.inbox.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.inbox.is_empty()
    }
}

/// Routing table from process id to mailbox, one per run
#[derive(Debug, Clone)]
pub struct MailboxRegistry {
    senders: Vec<UnboundedSender<Message>>,
}

impl MailboxRegistry {
    /// Create `n` mailboxes and the registry that writes to them
    ///
    /// The returned mailboxes are ordered by process id.
    pub fn new(n: usize) -> (Self, Vec<Mailbox>) {
        let (senders, mailboxes): (Vec<_>, Vec<_>) = (0..n)
            .map(|pid| {
                let (tx, rx) = mpsc::unbounded_channel();
                (
                    tx,
                    Mailbox {
                        owner: ProcessId(pid),
                        inbox: rx,
                    },
                )
            })
            .unzip();
        (Self { senders }, mailboxes)
    }

    /// Number of registered mailboxes
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// True when no mailbox is registered
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Enqueue `message` on `to`'s mailbox
    ///
    /// Returns the message back if the target is unknown or has already
    /// shut down.
    pub fn deliver(&self, to: ProcessId, message: Message) -> Result<(), Message> {
        match self.senders.get(to.index()) {
            Some(sender) => sender.send(message).map_err(|err| err.0),
            None => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VectorClock;
    use crate::message::{MessageId, Payload};

    fn message(sender: usize, seq: u64) -> Message {
        Message {
            sender: ProcessId(sender),
            id: MessageId {
                sender: ProcessId(sender),
                seq,
            },
            payload: Payload::Full(VectorClock::new(2)),
        }
    }

    #[test]
    fn test_mailboxes_are_ordered_by_owner() {
        let (registry, mailboxes) = MailboxRegistry::new(3);
        assert_eq!(registry.len(), 3);
        let owners: Vec<_> = mailboxes.iter().map(Mailbox::owner).collect();
        assert_eq!(owners, vec![ProcessId(0), ProcessId(1), ProcessId(2)]);
    }

    #[test]
    fn test_fifo_per_producer() {
        let (registry, mut mailboxes) = MailboxRegistry::new(2);
        for seq in 1..=3 {
            registry.deliver(ProcessId(1), message(0, seq)).unwrap();
        }

        let drained = mailboxes[1].drain();
        let seqs: Vec<_> = drained.iter().map(|m| m.id.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(mailboxes[1].is_empty());
        assert!(mailboxes[0].try_next().is_none());
    }

    #[test]
    fn test_deliver_to_unknown_process_returns_message() {
        let (registry, _mailboxes) = MailboxRegistry::new(1);
        let rejected = registry.deliver(ProcessId(4), message(0, 1)).unwrap_err();
        assert_eq!(rejected.id.seq, 1);
    }

    #[test]
    fn test_deliver_after_owner_dropped_fails() {
        let (registry, mut mailboxes) = MailboxRegistry::new(2);
        drop(mailboxes.pop());
        assert!(registry.deliver(ProcessId(1), message(0, 1)).is_err());
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let (registry, mut mailboxes) = MailboxRegistry::new(4);
        let registry = std::sync::Arc::new(registry);

        let mut handles = Vec::new();
        for sender in 1..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for seq in 1..=50 {
                    registry.deliver(ProcessId(0), message(sender, seq)).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let drained = mailboxes[0].drain();
        assert_eq!(drained.len(), 150);
        for sender in 1..4 {
            let seqs: Vec<_> = drained
                .iter()
                .filter(|m| m.sender == ProcessId(sender))
                .map(|m| m.id.seq)
                .collect();
            assert_eq!(seqs, (1..=50).collect::<Vec<_>>());
        }
    }
}
