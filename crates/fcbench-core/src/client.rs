//! The repository boundary.
//!
//! Every operation performs exactly one network call and returns its
//! elapsed time in milliseconds. Callers own the ordering rules: data calls
//! inside a transaction are only issued once the transaction exists, and
//! commit/rollback only once it is ready.

use crate::error::Result;
use crate::transaction::TransactionState;
use crate::types::RepositoryVersion;
use std::time::Instant;
use tracing::{error, warn};

pub trait RemoteClient: Send + Sync {
    fn version(&self) -> RepositoryVersion;

    fn create_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;
    fn delete_resource(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;

    fn create_payload(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64>;
    fn read_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;
    fn update_payload(&self, pid: &str, size: u64, tx: Option<&TransactionState>) -> Result<u64>;
    fn delete_payload(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;

    fn create_property(&self, pid: &str, size: u64, tx: Option<&TransactionState>)
        -> Result<u64>;
    fn read_property(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;
    fn update_property(&self, pid: &str, size: u64, tx: Option<&TransactionState>)
        -> Result<u64>;
    fn delete_property(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;

    fn sparql_insert(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;
    fn sparql_select(&self, pid: &str, tx: Option<&TransactionState>) -> Result<u64>;

    /// Open a transaction and record its id on `tx`.
    fn create_transaction(&self, tx: &TransactionState) -> Result<u64>;
    fn commit_transaction(&self, tx: &TransactionState) -> Result<u64>;
    fn rollback_transaction(&self, tx: &TransactionState) -> Result<u64>;

    /// Number of repository cluster nodes.
    fn cluster_size(&self) -> Result<u32>;

    fn supports_transactions(&self) -> bool {
        self.version().supports_transactions()
    }

    // -----------------------------------------------------------------------
    // Bulk helpers for preparation and purge. Failures are logged and
    // skipped; the return value is the summed time of the successful calls.
    // -----------------------------------------------------------------------

    fn create_resources(&self, pids: &[String], tx: Option<&TransactionState>) -> u64 {
        sum_logged(pids, "create object", |pid| self.create_resource(pid, tx))
    }

    fn create_payloads(&self, pids: &[String], size: u64, tx: Option<&TransactionState>) -> u64 {
        sum_logged(pids, "create datastream", |pid| {
            self.create_payload(pid, size, tx)
        })
    }

    fn create_properties(
        &self,
        pids: &[String],
        size: u64,
        tx: Option<&TransactionState>,
    ) -> u64 {
        sum_logged(pids, "create property", |pid| {
            self.create_property(pid, size, tx)
        })
    }

    fn sparql_inserts(&self, pids: &[String], tx: Option<&TransactionState>) -> u64 {
        sum_logged(pids, "insert triples", |pid| self.sparql_insert(pid, tx))
    }

    fn purge(&self, pids: &[String], remove_payloads: bool, tx: Option<&TransactionState>) -> u64 {
        sum_logged(pids, "purge object", |pid| {
            let mut total = 0;
            // Deleting the object removes the datastream with it, so a
            // failed datastream delete does not stop the object delete.
            if remove_payloads {
                match self.delete_payload(pid, tx) {
                    Ok(ms) => total += ms,
                    Err(e) => warn!("unable to delete datastream of {pid}: {e}"),
                }
            }
            total += self.delete_resource(pid, tx)?;
            Ok(total)
        })
    }
}

fn sum_logged<F>(pids: &[String], what: &str, mut op: F) -> u64
where
    F: FnMut(&str) -> Result<u64>,
{
    pids.iter()
        .filter_map(|pid| match op(pid) {
            Ok(ms) => Some(ms),
            Err(e) => {
                error!("unable to {what} {pid}: {e}");
                None
            }
        })
        .sum()
}

/// Milliseconds elapsed since `start`.
pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
