//! Settlement tracking for a batch of resolutions.
//!
//! The tally counts a resolution as *settled* once it produced either an
//! address or a failure. Success and settlement are tracked separately, so a
//! batch with failures still reaches `settled == total`.
//!
//! The tally has a single writer: the join loop of the coordinator. Tasks
//! never touch it directly.

use std::collections::BTreeMap;

use crate::storage::{Handle, ResolvedAddress};

/// One resolution that did not produce an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    /// Position of the match in the filtered list.
    pub position: usize,
    /// Filename of the handle.
    pub name: String,
    /// Why it failed.
    pub reason: String,
}

/// Progress of a batch, published while resolutions settle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchProgress {
    /// Resolutions started.
    pub total: usize,
    /// Resolutions that produced an address.
    pub succeeded: usize,
    /// Resolutions that failed.
    pub failed: usize,
}

impl SearchProgress {
    /// Resolutions that finished either way.
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Settled fraction (1.0 for an empty batch).
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.settled() as f64 / self.total as f64
        }
    }
}

/// Accumulator for one batch.
#[derive(Debug, Clone)]
pub struct SettlementTally {
    total: usize,
    pending: BTreeMap<usize, Handle>,
    succeeded: Vec<(usize, ResolvedAddress)>,
    failures: Vec<ResolutionFailure>,
}

impl SettlementTally {
    /// Create a tally for `total` resolutions.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            pending: BTreeMap::new(),
            succeeded: Vec::with_capacity(total),
            failures: Vec::new(),
        }
    }

    /// Register a started resolution.
    pub fn record_dispatch(&mut self, position: usize, handle: Handle) {
        self.pending.insert(position, handle);
    }

    /// Record an address. Ignored unless `position` is pending, so a
    /// resolution settles at most once.
    pub fn record_success(&mut self, position: usize, address: ResolvedAddress) -> bool {
        if self.pending.remove(&position).is_none() {
            return false;
        }
        self.succeeded.push((position, address));
        true
    }

    /// Record a failure. Ignored unless `position` is pending.
    pub fn record_failure(&mut self, position: usize, reason: impl Into<String>) -> bool {
        match self.pending.remove(&position) {
            Some(handle) => {
                self.failures.push(ResolutionFailure {
                    position,
                    name: handle.name().to_string(),
                    reason: reason.into(),
                });
                true
            }
            None => false,
        }
    }

    /// Settle everything still pending as failed. Returns how many were.
    pub fn fail_pending(&mut self, reason: &str) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        self.failures
            .extend(pending.into_iter().map(|(position, handle)| ResolutionFailure {
                position,
                name: handle.name().to_string(),
                reason: reason.to_string(),
            }));
        count
    }

    /// Number of resolutions in the batch.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Resolutions that finished either way.
    pub fn settled(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    /// Resolutions that produced an address.
    pub fn succeeded(&self) -> usize {
        self.succeeded.len()
    }

    /// Resolutions that failed.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Resolutions still outstanding.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The gate condition: every resolution settled.
    pub fn is_settled(&self) -> bool {
        self.settled() == self.total
    }

    /// Snapshot for progress reporting.
    pub fn progress(&self) -> SearchProgress {
        SearchProgress {
            total: self.total,
            succeeded: self.succeeded(),
            failed: self.failed(),
        }
    }

    /// Split into addresses and failures.
    ///
    /// With `in_match_order` the addresses follow the filtered list;
    /// otherwise they stay in completion order. Failures are always sorted
    /// by position.
    pub fn into_parts(self, in_match_order: bool) -> (Vec<ResolvedAddress>, Vec<ResolutionFailure>) {
        let mut succeeded = self.succeeded;
        if in_match_order {
            succeeded.sort_by_key(|(position, _)| *position);
        }
        let mut failures = self.failures;
        failures.sort_by_key(|f| f.position);

        (
            succeeded.into_iter().map(|(_, address)| address).collect(),
            failures,
        )
    }
}
