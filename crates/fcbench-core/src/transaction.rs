//! Shared state of one server-side transaction.
//!
//! A `TransactionState` is created by the [`TransactionPool`] during planning
//! and handed by `Arc` to every worker bound to it. Planning mutates only
//! `actions_assigned`; once workers run, they bump `actions_completed` and
//! the first worker to reach `max_actions` flips `ready_for_commit`.
//!
//! Lifecycle: `Uncreated → Created → ReadyForCommit → Finalized`, or
//! `Aborted` when the create call failed.
//!
//! [`TransactionPool`]: crate::tx_pool::TransactionPool

use crate::error::{BenchError, Result};
use crate::types::Action;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Interval between readiness checks while a worker waits on a transaction.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Uncreated,
    Created,
    ReadyForCommit,
    Finalized,
    Aborted,
}

#[derive(Debug)]
pub struct TransactionState {
    /// Position in the opening order of the owning pool, for log lines
    /// written before the repository has assigned an id.
    ordinal: usize,
    transaction_id: OnceLock<String>,
    actions_assigned: AtomicI64,
    actions_completed: AtomicI64,
    max_actions: AtomicI64,
    ready_for_commit: AtomicBool,
    aborted: AtomicBool,
    finalized: AtomicBool,
}

impl TransactionState {
    /// `max_actions <= 0` means the transaction has no capacity limit and
    /// only becomes ready once trimmed or explicitly marked.
    pub fn new(ordinal: usize, max_actions: i64) -> Self {
        Self {
            ordinal,
            transaction_id: OnceLock::new(),
            actions_assigned: AtomicI64::new(0),
            actions_completed: AtomicI64::new(0),
            max_actions: AtomicI64::new(max_actions),
            ready_for_commit: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.get().map(String::as_str)
    }

    /// Id if known, otherwise the pool ordinal.
    pub fn label(&self) -> String {
        match self.transaction_id() {
            Some(id) => id.to_string(),
            None => format!("tx#{}", self.ordinal),
        }
    }

    /// Record the id handed out by the repository. The first write wins.
    pub fn set_transaction_id(&self, id: impl Into<String>) -> bool {
        let id = id.into();
        match self.transaction_id.set(id) {
            Ok(()) => true,
            Err(rejected) => {
                warn!(
                    "transaction {} already has an id, ignoring {}",
                    self.label(),
                    rejected
                );
                false
            }
        }
    }

    pub fn transaction_created(&self) -> bool {
        self.transaction_id.get().is_some()
    }

    // -----------------------------------------------------------------------
    // Planning-time bookkeeping (single planning thread only)
    // -----------------------------------------------------------------------

    pub fn assign_action(&self) {
        self.actions_assigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn actions_assigned(&self) -> i64 {
        self.actions_assigned.load(Ordering::Relaxed)
    }

    pub fn has_actions_assigned(&self) -> bool {
        self.actions_assigned() > 0
    }

    pub fn all_actions_assigned(&self) -> bool {
        let max = self.max_actions();
        max > 0 && self.actions_assigned() == max
    }

    pub fn max_actions(&self) -> i64 {
        self.max_actions.load(Ordering::Acquire)
    }

    pub fn set_max_actions(&self, max_actions: i64) {
        self.max_actions.store(max_actions, Ordering::Release);
        if max_actions > 0 && self.actions_completed() >= max_actions {
            self.flip_ready();
        }
    }

    /// Shrink capacity to what was actually assigned. A transaction left
    /// with nothing assigned is ready immediately.
    pub fn trim_to_assigned(&self) {
        let assigned = self.actions_assigned();
        self.set_max_actions(assigned);
        if assigned == 0 {
            self.flip_ready();
        }
    }

    // -----------------------------------------------------------------------
    // Execution-time updates (any worker thread)
    // -----------------------------------------------------------------------

    /// Count one finished member action. Control actions are ignored.
    pub fn action_completed(&self, action: Action) {
        if action.is_control() {
            return;
        }
        let completed = self.actions_completed.fetch_add(1, Ordering::AcqRel) + 1;
        let max = self.max_actions();
        if max > 0 && completed >= max {
            self.flip_ready();
        }
        debug!("completed {} action(s) for {}", completed, self.label());
    }

    pub fn actions_completed(&self) -> i64 {
        self.actions_completed.load(Ordering::Acquire)
    }

    pub fn is_ready_for_commit(&self) -> bool {
        self.ready_for_commit.load(Ordering::Acquire)
    }

    /// Force readiness, e.g. for a preparation transaction that has no
    /// completion count to reach.
    pub fn mark_ready_for_commit(&self) -> bool {
        self.flip_ready()
    }

    /// Returns true only for the call that performed the transition.
    fn flip_ready(&self) -> bool {
        self.ready_for_commit
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn mark_aborted(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn mark_finalized(&self) {
        self.finalized.store(true, Ordering::Release);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    pub fn status(&self) -> TxStatus {
        if self.is_aborted() {
            TxStatus::Aborted
        } else if self.is_finalized() {
            TxStatus::Finalized
        } else if self.is_ready_for_commit() {
            TxStatus::ReadyForCommit
        } else if self.transaction_created() {
            TxStatus::Created
        } else {
            TxStatus::Uncreated
        }
    }

    // -----------------------------------------------------------------------
    // Waits
    // -----------------------------------------------------------------------

    /// Block until the create call has assigned an id.
    pub fn wait_until_created(&self) -> Result<()> {
        loop {
            if self.transaction_created() {
                return Ok(());
            }
            if self.is_aborted() {
                return Err(BenchError::TransactionAborted(self.label()));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Block until every member action has completed.
    pub fn wait_until_ready(&self) -> Result<()> {
        loop {
            if self.is_aborted() {
                return Err(BenchError::TransactionAborted(self.label()));
            }
            if self.is_ready_for_commit() {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
