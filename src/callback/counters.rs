//! Run-wide and per-host outcome tallies.

use serde::Serialize;

use super::types::OutcomeKind;

/// Run-wide tally of outcome kinds plus host-task pairs still running.
///
/// The sum of all terminal counts plus `running` always equals the number
/// of host-task pairs dispatched so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounters {
    counts: [u64; OutcomeKind::ALL.len()],
    running: u64,
    dispatched: u64,
}

impl StatusCounters {
    /// Create empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `n` new host-task pairs as running.
    pub fn dispatch(&mut self, n: u64) {
        self.running += n;
        self.dispatched += n;
    }

    /// Move one running pair to a terminal kind.
    ///
    /// Returns false (and changes nothing) if nothing was running.
    pub fn resolve(&mut self, kind: OutcomeKind) -> bool {
        if self.running == 0 {
            return false;
        }
        self.running -= 1;
        self.counts[kind.index()] += 1;
        true
    }

    /// Withdraw a running pair that never reported back.
    pub fn retract(&mut self) -> bool {
        if self.running == 0 {
            return false;
        }
        self.running -= 1;
        self.dispatched -= 1;
        true
    }

    /// Count for one outcome kind.
    pub fn get(&self, kind: OutcomeKind) -> u64 {
        self.counts[kind.index()]
    }

    /// Pairs still running.
    pub fn running(&self) -> u64 {
        self.running
    }

    /// Pairs dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Pairs that reached a terminal kind.
    pub fn resolved(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Check the bookkeeping invariant.
    pub fn is_consistent(&self) -> bool {
        self.resolved() + self.running == self.dispatched
    }

    /// Non-zero counters in display order, `running` last.
    pub fn non_zero(&self) -> Vec<(&'static str, u64)> {
        let mut entries: Vec<(&'static str, u64)> = OutcomeKind::ALL
            .iter()
            .map(|kind| (kind.as_str(), self.get(*kind)))
            .filter(|(_, n)| *n > 0)
            .collect();
        if self.running > 0 {
            entries.push(("running", self.running));
        }
        entries
    }
}

/// Recap row for one host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    counts: [u64; OutcomeKind::ALL.len()],
}

impl HostStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome.
    pub fn record(&mut self, kind: OutcomeKind) {
        self.counts[kind.index()] += 1;
    }

    /// Count for one outcome kind.
    pub fn get(&self, kind: OutcomeKind) -> u64 {
        self.counts[kind.index()]
    }

    /// Check if this host has any failures.
    pub fn has_failures(&self) -> bool {
        self.get(OutcomeKind::Failed) > 0
    }

    /// Check if this host was ever unreachable.
    pub fn has_unreachable(&self) -> bool {
        self.get(OutcomeKind::Unreachable) > 0
    }

    /// Check if this host was interrupted.
    pub fn was_interrupted(&self) -> bool {
        self.get(OutcomeKind::Interrupted) > 0
    }

    /// Get total task count.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
