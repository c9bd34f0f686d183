//! Per-process event logs and the merged run log
//!
//! Each process appends an [`EventRecord`] for every step it executes, with
//! the clock snapshot taken after the step. At the end of a run the per-process
//! logs are merged into one deterministic sequence. The merge order is for
//! presentation only; it is not a causal order.

use crate::algorithm::Algorithm;
use crate::clock::{ProcessId, VectorClock};
use crate::errors::{Result, ResultExt};
use crate::message::MessageId;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of an internal event, rendered as `e<pid><k>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Process that executed the event
    pub process: ProcessId,
    /// 1-based internal event counter at that process
    pub seq: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}{}", self.process.external(), self.seq)
    }
}

/// What a process did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Local step with no communication
    Internal {
        /// Event identifier
        event: EventId,
    },
    /// Send branch taken by a process without outbound neighbors
    NoNeighbors {
        /// Event identifier
        event: EventId,
    },
    /// Message handed to a neighbor's mailbox
    Send {
        /// Message identifier
        message: MessageId,
        /// Receiving process
        to: ProcessId,
        /// Clock entries carried by the payload
        entries: usize,
        /// Algorithm that built the payload
        algorithm: Algorithm,
    },
    /// Message taken from the own mailbox and merged
    Receive {
        /// Message identifier
        message: MessageId,
        /// Sending process
        from: ProcessId,
        /// `(index, value)` entries carried by the payload
        updates: Vec<(usize, u64)>,
    },
}

impl EventKind {
    /// Action text between the process label and the timestamp
    pub fn action_text(&self) -> String {
        match self {
            Self::Internal { event } => format!("executes internal event {event}"),
            Self::NoNeighbors { event } => {
                format!("executes internal event (no neighbors) {event}")
            }
            Self::Send {
                message,
                to,
                entries,
                algorithm,
            } => format!(
                "{} {message} to {to}, sent_entries={entries}",
                algorithm.send_verb()
            ),
            Self::Receive { message, from, .. } => format!("receives {message} from {from}"),
        }
    }

    /// True for steps that advance the owner's own index
    pub fn is_local_step(&self) -> bool {
        !matches!(self, Self::Receive { .. })
    }
}

/// One logged step with the clock as it stood afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Process that logged the event
    pub process: ProcessId,
    /// Position in that process's log
    pub local_seq: u64,
    /// Run-wide capture sequence number
    pub global_seq: u64,
    /// Wall-clock capture time
    pub captured_at: DateTime<Local>,
    /// What happened
    pub kind: EventKind,
    /// Clock snapshot after the step
    pub clock: VectorClock,
}

impl EventRecord {
    /// Capture time in milliseconds since the Unix epoch
    pub fn captured_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }

    /// `<ProcessLabel> <action text> at <HH:MM:SS>, vc: [<entries> ]`
    pub fn render(&self) -> String {
        format!(
            "{} {} at {}, vc: [{}]",
            self.process,
            self.kind.action_text(),
            self.captured_at.format("%H:%M:%S"),
            self.clock
        )
    }
}

/// Run-wide capture counter shared by every process of one run
#[derive(Debug, Clone, Default)]
pub struct Sequencer(Arc<AtomicU64>);

impl Sequencer {
    /// Fresh counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next sequence number
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Ordered local log of one process
#[derive(Debug, Clone)]
pub struct ProcessLog {
    process: ProcessId,
    sequencer: Sequencer,
    records: Vec<EventRecord>,
}

impl ProcessLog {
    /// Empty log for `process`
    pub fn new(process: ProcessId, sequencer: Sequencer) -> Self {
        Self {
            process,
            sequencer,
            records: Vec::new(),
        }
    }

    /// Append an event with the post-step clock snapshot
    pub fn record(&mut self, kind: EventKind, clock: &VectorClock) -> &EventRecord {
        let record = EventRecord {
            process: self.process,
            local_seq: self.records.len() as u64,
            global_seq: self.sequencer.next(),
            captured_at: Local::now(),
            kind,
            clock: clock.clone(),
        };
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Owning process
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Records in emission order
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Consume into records
    pub fn into_records(self) -> Vec<EventRecord> {
        self.records
    }
}

// =============================================================================
// Merging
// =============================================================================

/// Key used to order entries from different processes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOrder {
    /// Capture millisecond, then process id, then per-process position
    #[default]
    WallClock,
    /// Run-wide capture sequence number
    Logical,
}

/// Total order key of one merged entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderingKey {
    /// Capture millisecond or run-wide sequence number
    pub primary: i64,
    /// Originating process
    pub process: ProcessId,
    /// Position in the originating log
    pub local_seq: u64,
}

impl OrderingKey {
    /// Key of `record` under `order`
    pub fn for_record(record: &EventRecord, order: MergeOrder) -> Self {
        let primary = match order {
            MergeOrder::WallClock => record.captured_ms(),
            MergeOrder::Logical => i64::try_from(record.global_seq).unwrap_or(i64::MAX),
        };
        Self {
            primary,
            process: record.process,
            local_seq: record.local_seq,
        }
    }
}

/// One line of the merged log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Deterministic ordering key
    pub ordering_key: OrderingKey,
    /// Rendered line without a trailing newline
    pub rendered_text: String,
}

/// Consolidated log of one run
#[derive(Debug, Clone)]
pub struct MergedLog {
    order: MergeOrder,
    records: Vec<EventRecord>,
}

impl MergedLog {
    /// Merge per-process logs into one ordered sequence
    pub fn merge(logs: impl IntoIterator<Item = ProcessLog>, order: MergeOrder) -> Self {
        let mut records: Vec<EventRecord> = logs
            .into_iter()
            .flat_map(ProcessLog::into_records)
            .collect();
        records.sort_by_key(|record| OrderingKey::for_record(record, order));
        Self { order, records }
    }

    /// Order used for this merge
    pub fn order(&self) -> MergeOrder {
        self.order
    }

    /// Records in merged order
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Number of merged entries
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no process logged anything
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keyed, rendered entries in merged order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.records
            .iter()
            .map(|record| LogEntry {
                ordering_key: OrderingKey::for_record(record, self.order),
                rendered_text: record.render(),
            })
            .collect()
    }

    /// Rendered lines in merged order
    pub fn lines(&self) -> Vec<String> {
        self.records.iter().map(EventRecord::render).collect()
    }

    /// Records logged by `process`, in its emission order
    pub fn for_process(&self, process: ProcessId) -> impl Iterator<Item = &EventRecord> {
        self.records.iter().filter(move |r| r.process == process)
    }

    /// Write the rendered log to `path`
    ///
    /// The text goes to a sibling temporary file first and is renamed into
    /// place, so readers never see a partial log.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let text: String = self.lines().into_iter().map(|line| line + "\n").collect();

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "common_log.txt".to_string());
        let staging = path.with_file_name(format!(".{file_name}.partial"));

        std::fs::write(&staging, text).io_context("writing merged log")?;
        if let Err(err) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err::<(), _>(err).io_context("publishing merged log");
        }
        Ok(())
    }
}
