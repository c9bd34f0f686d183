//! Entries-per-message statistics
//!
//! The headline number of a run is the average count of clock entries
//! transmitted per message. It can be computed from structured records or,
//! the way an external aggregator would, from the `sent_entries=<k>` tokens of
//! a rendered log.

use crate::algorithm::Algorithm;
use crate::log::{EventKind, EventRecord};
use serde::{Deserialize, Serialize};

/// Token that precedes the entry count on every send line
pub const SENT_ENTRIES_TOKEN: &str = "sent_entries=";

/// Entry count of a rendered send line, if it has one
pub fn parse_sent_entries(line: &str) -> Option<u64> {
    let start = line.find(SENT_ENTRIES_TOKEN)? + SENT_ENTRIES_TOKEN.len();
    let digits: String = line[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Send totals of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Messages sent
    pub messages: u64,
    /// Clock entries carried by those messages
    pub total_entries: u64,
}

impl RunStatistics {
    /// Count one message of `entries` entries
    pub fn observe(&mut self, entries: u64) {
        self.messages += 1;
        self.total_entries += entries;
    }

    /// Totals over the send records of a run
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            if let EventKind::Send { entries, .. } = record.kind {
                stats.observe(entries as u64);
            }
        }
        stats
    }

    /// Totals over the `sent_entries=` tokens of rendered lines
    pub fn from_log_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut stats = Self::default();
        for entries in lines.into_iter().filter_map(parse_sent_entries) {
            stats.observe(entries);
        }
        stats
    }

    /// Average entries per message, zero when nothing was sent
    pub fn average_entries(&self) -> f64 {
        if self.messages == 0 {
            0.0
        } else {
            self.total_entries as f64 / self.messages as f64
        }
    }
}

/// Per-run averages of repeated trials for one `(n, algorithm)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Process count
    pub n: usize,
    /// Algorithm
    pub algorithm: Algorithm,
    /// Average entries per message of each trial
    pub averages: Vec<f64>,
}

impl TrialSummary {
    /// Empty summary
    pub fn new(n: usize, algorithm: Algorithm) -> Self {
        Self {
            n,
            algorithm,
            averages: Vec::new(),
        }
    }

    /// Add one trial's statistics
    pub fn push(&mut self, stats: &RunStatistics) {
        self.averages.push(stats.average_entries());
    }

    /// Mean of the per-trial averages, zero without trials
    pub fn mean(&self) -> f64 {
        if self.averages.is_empty() {
            0.0
        } else {
            self.averages.iter().sum::<f64>() / self.averages.len() as f64
        }
    }
}
