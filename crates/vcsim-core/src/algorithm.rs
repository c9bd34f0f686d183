//! Clock update algorithms
//!
//! Two payload construction strategies, chosen once per run:
//!
//! - **Full-Vector (VC)**: every send carries a copy of the whole clock, so
//!   each message costs exactly `n` entries.
//! - **Differential-Selective (SK)**: every send carries the sender's own
//!   entry, every entry that grew since it was last sent to the same
//!   neighbor, and, while fewer than `n / 2` entries are selected, the
//!   highest scoring unsent entries by `value × (age + 1)`.
//!
//! Receivers merge monotonically in both cases, so an SK receiver may lag on
//! an index until that index is re-selected. Strategies only govern payload
//! construction; receive-side merging lives in the process.

use crate::clock::{ProcessId, VectorClock};
use crate::errors::SimError;
use crate::message::Payload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Full-vector clocks
    #[serde(rename = "VC")]
    Vc,
    /// Differential-selective clocks
    #[serde(rename = "SK")]
    Sk,
}

impl Algorithm {
    /// Both algorithms, in comparison order
    pub const ALL: [Algorithm; 2] = [Algorithm::Vc, Algorithm::Sk];

    /// Short name used on the command line and in file names
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vc => "VC",
            Self::Sk => "SK",
        }
    }

    /// Verb phrase used when rendering a send
    pub fn send_verb(self) -> &'static str {
        match self {
            Self::Vc => "sends message",
            Self::Sk => "sends optimized message",
        }
    }

    /// Default merged log file name for this algorithm
    pub fn default_log_name(self) -> String {
        format!("common_log_{}.txt", self.as_str())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VC" => Ok(Self::Vc),
            "SK" => Ok(Self::Sk),
            _ => Err(SimError::unknown_algorithm(s)),
        }
    }
}

// =============================================================================
// Shadow State
// =============================================================================

/// What was last transmitted to one neighbor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowRow {
    /// Last value of each index sent to this neighbor, `None` until first sent
    last_sent: Vec<Option<u64>>,
    /// Logical tick at which each index was last sent to this neighbor
    last_update: Vec<u64>,
}

impl ShadowRow {
    fn new(n: usize) -> Self {
        Self {
            last_sent: vec![None; n],
            last_update: vec![0; n],
        }
    }

    /// Last value of `index` sent to this neighbor, if it was ever sent
    pub fn last_sent(&self, index: usize) -> Option<u64> {
        self.last_sent.get(index).copied().flatten()
    }

    /// True when `value` at `index` is news to this neighbor
    ///
    /// An index never sent before always is, zero values included.
    pub fn is_stale(&self, index: usize, value: u64) -> bool {
        self.last_sent(index).map_or(true, |sent| value > sent)
    }

    /// Tick at which `index` was last sent to this neighbor
    pub fn last_update(&self, index: usize) -> u64 {
        self.last_update.get(index).copied().unwrap_or(0)
    }

    /// Staleness score `value × (age + 1)` at logical time `tick`
    pub fn importance(&self, index: usize, value: u64, tick: u64) -> u64 {
        let age = tick.saturating_sub(self.last_update(index));
        value.saturating_mul(age.saturating_add(1))
    }

    fn record(&mut self, index: usize, value: u64, tick: u64) {
        self.last_sent[index] = Some(value);
        self.last_update[index] = tick;
    }
}

/// Per-neighbor shadow table owned by one process
///
/// Mutated only by the owning process right after building a differential
/// payload.
#[derive(Debug, Clone, Default)]
pub struct ShadowState {
    rows: BTreeMap<ProcessId, ShadowRow>,
    tick: u64,
}

impl ShadowState {
    /// Empty shadow state
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical time, advanced once per differential send
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Shadow row for `neighbor`, if anything was ever sent to it
    pub fn row(&self, neighbor: ProcessId) -> Option<&ShadowRow> {
        self.rows.get(&neighbor)
    }

    /// Build the differential payload for a send from `owner` to `neighbor`
    pub fn select(
        &mut self,
        clock: &VectorClock,
        owner: ProcessId,
        neighbor: ProcessId,
    ) -> BTreeMap<usize, u64> {
        self.tick += 1;
        let tick = self.tick;
        let n = clock.len();
        let row = self
            .rows
            .entry(neighbor)
            .or_insert_with(|| ShadowRow::new(n));

        let mut selected = BTreeMap::new();

        let own = owner.index();
        selected.insert(own, clock.get(own));
        row.record(own, clock.get(own), tick);

        for index in (0..n).filter(|i| *i != own) {
            let value = clock.get(index);
            if row.is_stale(index, value) {
                selected.insert(index, value);
                row.record(index, value, tick);
            }
        }

        let target = n / 2;
        if selected.len() < target {
            let remaining = target - selected.len();
            let mut candidates: Vec<(usize, u64)> = (0..n)
                .filter(|i| !selected.contains_key(i))
                .map(|i| (i, row.importance(i, clock.get(i), tick)))
                .filter(|(_, importance)| *importance > 0)
                .collect();
            // Highest importance first, lowest index on ties
            candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            for (index, _) in candidates.into_iter().take(remaining) {
                let value = clock.get(index);
                selected.insert(index, value);
                row.record(index, value, tick);
            }
        }

        selected
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Payload construction strategy held by one process
#[derive(Debug, Clone)]
pub enum ClockStrategy {
    /// Send the whole clock
    FullVector,
    /// Send selected entries tracked against per-neighbor shadow state
    Differential(ShadowState),
}

impl ClockStrategy {
    /// Fresh strategy state for `algorithm`
    pub fn for_algorithm(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Vc => Self::FullVector,
            Algorithm::Sk => Self::Differential(ShadowState::new()),
        }
    }

    /// Algorithm implemented by this strategy
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::FullVector => Algorithm::Vc,
            Self::Differential(_) => Algorithm::Sk,
        }
    }

    /// Build the payload for a send from `owner` to `neighbor`
    pub fn build_payload(
        &mut self,
        clock: &VectorClock,
        owner: ProcessId,
        neighbor: ProcessId,
    ) -> Payload {
        match self {
            Self::FullVector => Payload::Full(clock.clone()),
            Self::Differential(shadow) => Payload::Selective(shadow.select(clock, owner, neighbor)),
        }
    }
}
