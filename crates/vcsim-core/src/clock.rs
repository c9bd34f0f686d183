//! Vector clocks indexed by process id
//!
//! Each process owns one [`VectorClock`] of size `n`. Index `i` holds process
//! `i`'s logical event count as last known to the owner. The owner's own index
//! advances through [`VectorClock::tick`]; every other index only moves
//! through a merge, and merges never move an index backwards.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 0-based identifier of a logical process
///
/// External representations (parameter files, rendered logs) are 1-based;
/// conversion happens at the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub usize);

impl ProcessId {
    /// Build from a 1-based external id
    pub fn from_external(id: usize) -> Option<Self> {
        id.checked_sub(1).map(Self)
    }

    /// 0-based index into clocks and registries
    pub fn index(self) -> usize {
        self.0
    }

    /// 1-based id used in logs and parameter files
    pub fn external(self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process{}", self.external())
    }
}

/// Causal relation between two clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// Every entry equal
    Equal,
    /// Left happened before right
    Before,
    /// Left happened after right
    After,
    /// Neither dominates
    Concurrent,
}

/// Fixed-size vector clock
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock(Vec<u64>);

impl VectorClock {
    /// All-zero clock for `n` processes
    pub fn new(n: usize) -> Self {
        Self(vec![0; n])
    }

    /// Clock from raw entries
    pub fn from_entries(entries: Vec<u64>) -> Self {
        Self(entries)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the clock tracks no processes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value at `index`, zero when out of range
    pub fn get(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Raw entries
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Record a local event for `owner` and return the new own value
    pub fn tick(&mut self, owner: ProcessId) -> u64 {
        let slot = &mut self.0[owner.index()];
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Component-wise max with a full clock
    ///
    /// Returns the number of entries that advanced.
    pub fn merge(&mut self, other: &VectorClock) -> usize {
        self.merge_entries(other.0.iter().copied().enumerate())
    }

    /// Component-wise max restricted to the supplied `(index, value)` pairs
    ///
    /// Indices outside the clock are ignored. Indices that are not supplied
    /// keep their current value.
    pub fn merge_entries<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (usize, u64)>,
    {
        let mut advanced = 0;
        for (index, value) in entries {
            if let Some(slot) = self.0.get_mut(index) {
                if value > *slot {
                    *slot = value;
                    advanced += 1;
                }
            }
        }
        advanced
    }

    /// True when every entry of `self` is at least the matching entry of `other`
    pub fn dominates(&self, other: &VectorClock) -> bool {
        (0..self.len().max(other.len())).all(|i| self.get(i) >= other.get(i))
    }

    /// Causal comparison
    pub fn causal_cmp(&self, other: &VectorClock) -> CausalOrder {
        match (self.dominates(other), other.dominates(self)) {
            (true, true) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (false, false) => CausalOrder::Concurrent,
        }
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.causal_cmp(other) {
            CausalOrder::Equal => Some(Ordering::Equal),
            CausalOrder::Before => Some(Ordering::Less),
            CausalOrder::After => Some(Ordering::Greater),
            CausalOrder::Concurrent => None,
        }
    }
}

/// Space-separated entries with a trailing space, e.g. `1 0 2 `
impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in &self.0 {
            write!(f, "{value} ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id_conversions() {
        let pid = ProcessId::from_external(3).unwrap();
        assert_eq!(pid.index(), 2);
        assert_eq!(pid.external(), 3);
        assert_eq!(pid.to_string(), "Process3");
        assert!(ProcessId::from_external(0).is_none());
    }

    #[test]
    fn test_tick_only_moves_own_index() {
        let mut clock = VectorClock::new(3);
        assert_eq!(clock.tick(ProcessId(1)), 1);
        assert_eq!(clock.tick(ProcessId(1)), 2);
        assert_eq!(clock.as_slice(), &[0, 2, 0]);
    }

    #[test]
    fn test_merge_takes_componentwise_max() {
        let mut local = VectorClock::from_entries(vec![3, 0, 1]);
        let remote = VectorClock::from_entries(vec![1, 4, 1]);

        assert_eq!(local.merge(&remote), 1);
        assert_eq!(local.as_slice(), &[3, 4, 1]);
    }

    #[test]
    fn test_merge_entries_leaves_unsupplied_indices() {
        let mut local = VectorClock::from_entries(vec![2, 2, 2]);
        let advanced = local.merge_entries([(0, 5), (2, 1), (7, 9)]);

        assert_eq!(advanced, 1);
        assert_eq!(local.as_slice(), &[5, 2, 2]);
    }

    #[test]
    fn test_causal_order() {
        let a = VectorClock::from_entries(vec![1, 0]);
        let b = VectorClock::from_entries(vec![1, 1]);
        let c = VectorClock::from_entries(vec![0, 2]);

        assert_eq!(a.causal_cmp(&b), CausalOrder::Before);
        assert_eq!(b.causal_cmp(&a), CausalOrder::After);
        assert_eq!(a.causal_cmp(&c), CausalOrder::Concurrent);
        assert_eq!(a.causal_cmp(&a.clone()), CausalOrder::Equal);
        assert!(a < b);
        assert_eq!(a.partial_cmp(&c), None);
    }

    #[test]
    fn test_display_has_trailing_space() {
        let clock = VectorClock::from_entries(vec![1, 0, 2]);
        assert_eq!(clock.to_string(), "1 0 2 ");
    }
}
