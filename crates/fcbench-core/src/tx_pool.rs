//! Round-robin allocation of transactions to planned actions.
//!
//! The pool keeps a ring of `parallel_tx` slots. Each planning request takes
//! the transaction at the cursor and moves the cursor on; a transaction that
//! is handed its last unit of capacity leaves the ring (its slot empties) and
//! the planner synthesizes its finalize worker. Empty slots are refilled
//! with fresh transactions while the opening budget lasts.
//!
//! The pool is only touched by the single planning thread. The timers are
//! shared with workers and therefore atomic.

use crate::transaction::TransactionState;
use crate::types::{Action, TransactionMode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// TransactionTimers
// ---------------------------------------------------------------------------

/// Aggregate latency of transaction control operations.
#[derive(Debug, Default)]
pub struct TransactionTimers {
    create_ms: AtomicU64,
    commit_ms: AtomicU64,
}

impl TransactionTimers {
    pub fn add_create(&self, ms: u64) {
        self.create_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn add_commit(&self, ms: u64) {
        self.commit_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn create_ms(&self) -> u64 {
        self.create_ms.load(Ordering::Relaxed)
    }

    pub fn commit_ms(&self) -> u64 {
        self.commit_ms.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// TransactionPool
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TransactionPool {
    mode: TransactionMode,
    actions_per_tx: i64,
    slots: Vec<Option<Arc<TransactionState>>>,
    cursor: usize,
    opened: usize,
    open_budget: Option<usize>,
    /// Transactions evicted because they became ready before being fully
    /// assigned; end-of-run trimming still has to finalize them.
    stranded: Vec<Arc<TransactionState>>,
    timers: Arc<TransactionTimers>,
}

impl TransactionPool {
    /// `actions_per_tx <= 0` leaves transactions unbounded. A
    /// `parallel_tx` of zero is treated as one.
    pub fn new(mode: TransactionMode, actions_per_tx: i64, parallel_tx: usize) -> Self {
        let width = parallel_tx.max(1);
        Self {
            mode,
            actions_per_tx,
            slots: vec![None; width],
            cursor: 0,
            opened: 0,
            open_budget: None,
            stranded: Vec::new(),
            timers: Arc::new(TransactionTimers::default()),
        }
    }

    /// Announce how many actions the coming plan will request. In bounded
    /// mode this caps the transactions opened at `ceil(planned / K)`.
    pub fn plan_for(&mut self, planned_actions: usize) {
        if self.actions_per_tx > 0 {
            let per_tx = self.actions_per_tx as usize;
            self.open_budget = Some(self.opened + planned_actions.div_ceil(per_tx));
        }
    }

    /// Hand out the transaction the next planned action should join.
    pub fn get_transaction(&mut self) -> Arc<TransactionState> {
        let width = self.slots.len();
        for _ in 0..width {
            let idx = self.cursor;
            self.cursor = (self.cursor + 1) % width;

            if let Some(tx) = self.slots[idx].take() {
                if tx.is_ready_for_commit() {
                    debug!("evicting {} from slot {}: ready for commit", tx.label(), idx);
                    if !tx.all_actions_assigned() {
                        self.stranded.push(tx);
                    }
                } else {
                    if !self.takes_last_slot(&tx) {
                        self.slots[idx] = Some(Arc::clone(&tx));
                    }
                    return tx;
                }
            }

            if self.may_open() {
                return self.open_in(idx);
            }
        }

        // Every slot is empty and the budget is spent: the caller asked for
        // more than it announced.
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % width;
        debug!("opening budget exhausted, opening an extra transaction");
        self.open_in(idx)
    }

    fn may_open(&self) -> bool {
        self.open_budget.map_or(true, |budget| self.opened < budget)
    }

    /// True when the coming assignment fills the transaction.
    fn takes_last_slot(&self, tx: &TransactionState) -> bool {
        self.actions_per_tx > 0 && tx.actions_assigned() == tx.max_actions() - 1
    }

    fn open_in(&mut self, idx: usize) -> Arc<TransactionState> {
        let tx = Arc::new(TransactionState::new(self.opened, self.actions_per_tx));
        self.opened += 1;
        debug!("opened {} in slot {}", tx.label(), idx);
        if !self.takes_last_slot(&tx) {
            self.slots[idx] = Some(Arc::clone(&tx));
        }
        tx
    }

    /// Transactions still waiting for more work: the ring's live entries
    /// plus stranded ones. These are the candidates for end-of-run trimming.
    pub fn open_transactions(&self) -> Vec<Arc<TransactionState>> {
        self.slots
            .iter()
            .flatten()
            .chain(self.stranded.iter())
            .filter(|tx| !tx.all_actions_assigned())
            .cloned()
            .collect()
    }

    pub fn clear_transactions(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.stranded.clear();
        self.cursor = 0;
        self.open_budget = None;
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn finalize_action(&self) -> Action {
        self.mode.finalize_action()
    }

    pub fn actions_per_tx(&self) -> i64 {
        self.actions_per_tx
    }

    pub fn parallel_tx(&self) -> usize {
        self.slots.len()
    }

    /// Number of transactions opened since the pool was created.
    pub fn opened(&self) -> usize {
        self.opened
    }

    pub fn timers(&self) -> Arc<TransactionTimers> {
        Arc::clone(&self.timers)
    }

    pub fn add_to_create_time(&self, ms: u64) {
        self.timers.add_create(ms);
    }

    pub fn add_to_commit_time(&self, ms: u64) {
        self.timers.add_commit(ms);
    }

    pub fn create_time(&self) -> u64 {
        self.timers.create_ms()
    }

    pub fn commit_time(&self) -> u64 {
        self.timers.commit_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive the pool the way the planner does and return every
    /// transaction handed out, in order.
    fn allocate(pool: &mut TransactionPool, n: usize) -> Vec<Arc<TransactionState>> {
        pool.plan_for(n);
        (0..n)
            .map(|_| {
                let tx = pool.get_transaction();
                tx.assign_action();
                tx
            })
            .collect()
    }

    fn distinct(txs: &[Arc<TransactionState>]) -> Vec<Arc<TransactionState>> {
        let mut out: Vec<Arc<TransactionState>> = Vec::new();
        for tx in txs {
            if !out.iter().any(|o| Arc::ptr_eq(o, tx)) {
                out.push(Arc::clone(tx));
            }
        }
        out
    }

    #[test]
    fn round_robin_fills_two_transactions_evenly() {
        let mut pool = TransactionPool::new(TransactionMode::Commit, 5, 2);
        let handed = allocate(&mut pool, 10);
        let txs = distinct(&handed);
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|tx| tx.actions_assigned() == 5));
        assert!(txs.iter().all(|tx| tx.all_actions_assigned()));
        // alternates between the two
        assert!(Arc::ptr_eq(&handed[0], &handed[2]));
        assert!(Arc::ptr_eq(&handed[1], &handed[3]));
        assert!(pool.open_transactions().is_empty());
    }

    #[test]
    fn opens_ceil_n_over_k_and_never_overfills() {
        for p in 1..=4usize {
            for k in 1..=6i64 {
                for n in 0..=25usize {
                    let mut pool = TransactionPool::new(TransactionMode::Commit, k, p);
                    let handed = allocate(&mut pool, n);
                    let txs = distinct(&handed);
                    assert_eq!(
                        txs.len(),
                        n.div_ceil(k as usize),
                        "P={p} K={k} N={n}"
                    );
                    assert!(txs.iter().all(|tx| tx.actions_assigned() <= k));
                    assert!(txs.len() <= pool.opened());
                }
            }
        }
    }

    #[test]
    fn live_transactions_never_exceed_parallelism() {
        let mut pool = TransactionPool::new(TransactionMode::Rollback, 3, 2);
        pool.plan_for(20);
        for _ in 0..20 {
            let tx = pool.get_transaction();
            tx.assign_action();
            assert!(pool.slots.iter().flatten().count() <= 2);
        }
    }

    #[test]
    fn unbounded_transactions_stay_open_for_trimming() {
        let mut pool = TransactionPool::new(TransactionMode::Commit, 0, 3);
        let handed = allocate(&mut pool, 10);
        let txs = distinct(&handed);
        assert_eq!(txs.len(), 3);
        assert!(txs.iter().all(|tx| !tx.all_actions_assigned()));
        let open = pool.open_transactions();
        assert_eq!(open.len(), 3);
        let total: i64 = open.iter().map(|tx| tx.actions_assigned()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn partially_filled_transactions_are_left_open() {
        let mut pool = TransactionPool::new(TransactionMode::Commit, 4, 3);
        allocate(&mut pool, 7);
        let open = pool.open_transactions();
        assert!(!open.is_empty());
        assert!(open.iter().all(|tx| tx.actions_assigned() < 4));
    }

    #[test]
    fn single_action_transactions_leave_the_ring_immediately() {
        let mut pool = TransactionPool::new(TransactionMode::Commit, 1, 2);
        let handed = allocate(&mut pool, 3);
        assert_eq!(distinct(&handed).len(), 3);
        assert!(pool.open_transactions().is_empty());
    }

    #[test]
    fn ready_transaction_is_evicted_and_replaced() {
        let mut pool = TransactionPool::new(TransactionMode::Commit, 0, 1);
        let first = pool.get_transaction();
        first.assign_action();
        first.mark_ready_for_commit();

        let second = pool.get_transaction();
        assert!(!Arc::ptr_eq(&first, &second));
        // the evicted one was never fully assigned, so it is still reported
        let open = pool.open_transactions();
        assert!(open.iter().any(|tx| Arc::ptr_eq(tx, &first)));
    }

    #[test]
    fn clear_empties_every_slot() {
        let mut pool = TransactionPool::new(TransactionMode::Commit, 0, 2);
        allocate(&mut pool, 4);
        pool.clear_transactions();
        assert!(pool.open_transactions().is_empty());
        let fresh = pool.get_transaction();
        assert_eq!(fresh.ordinal(), 2);
    }

    #[test]
    fn timers_accumulate() {
        let pool = TransactionPool::new(TransactionMode::Commit, 1, 1);
        pool.add_to_create_time(5);
        pool.timers().add_create(7);
        pool.add_to_commit_time(3);
        assert_eq!(pool.create_time(), 12);
        assert_eq!(pool.commit_time(), 3);
        assert_eq!(pool.finalize_action(), Action::CommitTx);
    }
}
