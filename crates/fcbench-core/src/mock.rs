//! In-memory `RemoteClient` that records every call, for scheduling tests.

use crate::client::{elapsed_ms, RemoteClient};
use crate::error::{BenchError, Result};
use crate::transaction::TransactionState;
use crate::types::{Action, RepositoryVersion};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub action: Action,
    /// Object create/delete rather than the datastream-level action.
    pub resource: bool,
    pub pid: String,
    pub transaction: Option<String>,
    pub started: Instant,
    pub finished: Instant,
    /// `(actions_completed, max_actions)` seen by commit/rollback.
    pub completion: Option<(i64, i64)>,
}

#[derive(Debug)]
pub(crate) struct RecordingClient {
    version: RepositoryVersion,
    delay: Duration,
    failing_pids: HashSet<String>,
    fail_create_tx: bool,
    commit_status: Option<u16>,
    next_tx: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            version: RepositoryVersion::Fcrepo4,
            delay: Duration::ZERO,
            failing_pids: HashSet::new(),
            fail_create_tx: false,
            commit_status: None,
            next_tx: AtomicUsize::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_version(mut self, version: RepositoryVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_pid(mut self, pid: &str) -> Self {
        self.failing_pids.insert(pid.to_string());
        self
    }

    pub fn failing_create_tx(mut self) -> Self {
        self.fail_create_tx = true;
        self
    }

    pub fn failing_commit(mut self, status: u16) -> Self {
        self.commit_status = Some(status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Actions issued, leaving out object create/delete.
    pub fn actions(&self) -> Vec<Action> {
        self.calls()
            .into_iter()
            .filter(|c| !c.resource)
            .map(|c| c.action)
            .collect()
    }

    pub fn count(&self, action: Action) -> usize {
        self.actions().iter().filter(|a| **a == action).count()
    }

    pub fn resource_calls(&self, action: Action) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.resource && c.action == action)
            .count()
    }

    fn record(
        &self,
        action: Action,
        pid: &str,
        tx: Option<&TransactionState>,
        fail_status: Option<u16>,
    ) -> Result<u64> {
        self.push(action, false, pid, tx, fail_status)
    }

    fn push(
        &self,
        action: Action,
        resource: bool,
        pid: &str,
        tx: Option<&TransactionState>,
        fail_status: Option<u16>,
    ) -> Result<u64> {
        let started = Instant::now();
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let completion = action
            .is_control()
            .then(|| tx.map(|t| (t.actions_completed(), t.max_actions())))
            .flatten();
        if action == Action::CreateTx && !self.fail_create_tx {
            if let Some(tx) = tx {
                let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
                tx.set_transaction_id(format!("tx:{n}"));
            }
        }
        let call = Call {
            action,
            resource,
            pid: pid.to_string(),
            transaction: tx.and_then(|t| t.transaction_id().map(str::to_string)),
            started,
            finished: Instant::now(),
            completion,
        };
        self.calls.lock().unwrap().push(call);

        let failing = !resource && self.failing_pids.contains(pid);
        let status = fail_status.or_else(|| failing.then_some(500));
        match status {
            Some(status) => Err(BenchError::OperationFailed {
                operation: format!("{action} {pid}"),
                status,
            }),
            None => Ok(elapsed_ms(started)),
        }
    }
}

impl RemoteClient for RecordingClient {
    fn version(&self) -> RepositoryVersion {
        self.version
    }

    fn create_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.push(Action::Ingest, true, pid, tx, None)
    }

    fn delete_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.push(Action::Delete, true, pid, tx, None)
    }

    fn create_payload(&self, pid: &str, _: u64, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::Ingest, pid, tx, None)
    }

    fn read_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::Read, pid, tx, None)
    }

    fn update_payload(&self, pid: &str, _: u64, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::Update, pid, tx, None)
    }

    fn delete_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::Delete, pid, tx, None)
    }

    fn create_property(&self, pid: &str, _: u64, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::CreateProperty, pid, tx, None)
    }

    fn read_property(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::ReadProperty, pid, tx, None)
    }

    fn update_property(&self, pid: &str, _: u64, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::UpdateProperty, pid, tx, None)
    }

    fn delete_property(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::DeleteProperty, pid, tx, None)
    }

    fn sparql_insert(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::SparqlInsert, pid, tx, None)
    }

    fn sparql_select(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64> {
        self.record(Action::SparqlSelect, pid, tx, None)
    }

    fn create_transaction(&self, tx: &TransactionState) -> Result<u64> {
        let status = self.fail_create_tx.then_some(503);
        self.record(Action::CreateTx, "", Some(tx), status)
    }

    fn commit_transaction(&self, tx: &TransactionState) -> Result<u64> {
        self.record(Action::CommitTx, "", Some(tx), self.commit_status)
    }

    fn rollback_transaction(&self, tx: &TransactionState) -> Result<u64> {
        self.record(Action::RollbackTx, "", Some(tx), self.commit_status)
    }

    fn cluster_size(&self) -> Result<u32> {
        Ok(1)
    }
}
