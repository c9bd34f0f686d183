//! Messages exchanged between logical processes

use crate::clock::{ProcessId, VectorClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-sender message identifier, rendered as `m<sender><k>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    /// Process that created the message
    pub sender: ProcessId,
    /// 1-based send sequence number at the sender
    pub seq: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}{}", self.sender.external(), self.seq)
    }
}

/// Clock information carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Complete copy of the sender's clock
    Full(VectorClock),
    /// Selected `(index, value)` entries only
    Selective(BTreeMap<usize, u64>),
}

impl Payload {
    /// Number of clock entries transmitted
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Full(clock) => clock.len(),
            Self::Selective(entries) => entries.len(),
        }
    }

    /// Transmitted entries as `(index, value)` pairs
    pub fn entries(&self) -> Vec<(usize, u64)> {
        match self {
            Self::Full(clock) => clock.as_slice().iter().copied().enumerate().collect(),
            Self::Selective(entries) => entries.iter().map(|(i, v)| (*i, *v)).collect(),
        }
    }

    /// Value transmitted for `index`, if any
    pub fn value_for(&self, index: usize) -> Option<u64> {
        match self {
            Self::Full(clock) => clock.as_slice().get(index).copied(),
            Self::Selective(entries) => entries.get(&index).copied(),
        }
    }

    /// Merge this payload into `clock` and return how many entries advanced
    pub fn apply_to(&self, clock: &mut VectorClock) -> usize {
        match self {
            Self::Full(remote) => clock.merge(remote),
            Self::Selective(entries) => clock.merge_entries(entries.iter().map(|(i, v)| (*i, *v))),
        }
    }
}

/// A message in flight between two mailboxes
///
/// Created by the sender, owned by the receiving mailbox while queued and
/// consumed exactly once by the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sending process
    pub sender: ProcessId,
    /// Identifier unique per sender
    pub id: MessageId,
    /// Clock entries
    pub payload: Payload,
}
