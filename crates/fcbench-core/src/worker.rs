use crate::client::RemoteClient;
use crate::error::{BenchError, Result};
use crate::result::BenchResult;
use crate::transaction::TransactionState;
use crate::tx_pool::TransactionTimers;
use crate::types::Action;
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// TxBinding
// ---------------------------------------------------------------------------

/// The transaction a worker belongs to, plus the timers of the pool that
/// opened it.
#[derive(Debug, Clone)]
pub struct TxBinding {
    pub state: Arc<TransactionState>,
    pub timers: Arc<TransactionTimers>,
}

// ---------------------------------------------------------------------------
// ActionWorker
// ---------------------------------------------------------------------------

/// One schedulable unit of work: exactly one action against one resource,
/// or one transaction control call.
pub struct ActionWorker {
    action: Action,
    pid: String,
    size: u64,
    client: Arc<dyn RemoteClient>,
    tx: Option<TxBinding>,
}

impl ActionWorker {
    pub fn new(
        action: Action,
        pid: impl Into<String>,
        size: u64,
        client: Arc<dyn RemoteClient>,
    ) -> Self {
        Self {
            action,
            pid: pid.into(),
            size,
            client,
            tx: None,
        }
    }

    /// A create/commit/rollback worker for `tx`.
    pub fn control(action: Action, tx: TxBinding, client: Arc<dyn RemoteClient>) -> Self {
        Self {
            action,
            pid: String::new(),
            size: 0,
            client,
            tx: Some(tx),
        }
    }

    pub fn in_transaction(mut self, tx: TxBinding) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn transaction(&self) -> Option<&Arc<TransactionState>> {
        self.tx.as_ref().map(|b| &b.state)
    }

    /// Execute the action. The owning transaction hears about completion
    /// whether the call succeeds, fails or panics.
    pub fn run(self) -> Result<BenchResult> {
        let _completion = self.tx.as_ref().map(|b| CompletionGuard {
            tx: &b.state,
            action: self.action,
        });
        let duration_ms = self.execute()?;
        Ok(BenchResult::new(self.action, duration_ms, self.size))
    }

    fn execute(&self) -> Result<u64> {
        let pid = self.pid.as_str();
        let size = self.size;
        match self.action {
            Action::Ingest => self.member(|c, tx| c.create_payload(pid, size, tx)),
            Action::Read => self.member(|c, tx| c.read_payload(pid, tx)),
            Action::Update => self.member(|c, tx| c.update_payload(pid, size, tx)),
            Action::Delete => self.member(|c, tx| c.delete_payload(pid, tx)),
            Action::CreateProperty => self.member(|c, tx| c.create_property(pid, size, tx)),
            Action::ReadProperty => self.member(|c, tx| c.read_property(pid, tx)),
            Action::UpdateProperty => self.member(|c, tx| c.update_property(pid, size, tx)),
            Action::DeleteProperty => self.member(|c, tx| c.delete_property(pid, tx)),
            Action::SparqlInsert => self.member(|c, tx| c.sparql_insert(pid, tx)),
            Action::SparqlSelect => self.member(|c, tx| c.sparql_select(pid, tx)),
            Action::CreateTx => self.create_transaction(),
            Action::CommitTx => self.finalize(|c, tx| c.commit_transaction(tx)),
            Action::RollbackTx => self.finalize(|c, tx| c.rollback_transaction(tx)),
        }
    }

    /// Work that joins a transaction has to wait until the transaction
    /// exists, because its paths embed the transaction id.
    fn member<F>(&self, op: F) -> Result<u64>
    where
        F: FnOnce(&dyn RemoteClient, Option<&TransactionState>) -> Result<u64>,
    {
        let tx = self.tx.as_ref().map(|b| b.state.as_ref());
        if let Some(tx) = tx {
            tx.wait_until_created()?;
        }
        op(self.client.as_ref(), tx)
    }

    fn binding(&self) -> Result<&TxBinding> {
        self.tx
            .as_ref()
            .ok_or(BenchError::TransactionRequired(self.action))
    }

    fn create_transaction(&self) -> Result<u64> {
        let binding = self.binding()?;
        let tx = binding.state.as_ref();
        match self.client.create_transaction(tx) {
            Ok(ms) if tx.transaction_created() => {
                binding.timers.add_create(ms);
                debug!("created transaction {} in {} ms", tx.label(), ms);
                Ok(ms)
            }
            Ok(_) => {
                tx.mark_aborted();
                Err(BenchError::TransactionAborted(format!(
                    "{}: repository returned no transaction id",
                    tx.label()
                )))
            }
            Err(e) => {
                tx.mark_aborted();
                Err(e)
            }
        }
    }

    fn finalize<F>(&self, op: F) -> Result<u64>
    where
        F: FnOnce(&dyn RemoteClient, &TransactionState) -> Result<u64>,
    {
        let binding = self.binding()?;
        let tx = binding.state.as_ref();
        tx.wait_until_ready()?;
        match op(self.client.as_ref(), tx) {
            Ok(ms) => {
                tx.mark_finalized();
                binding.timers.add_commit(ms);
                debug!("{} finished for {} in {} ms", self.action, tx.label(), ms);
                Ok(ms)
            }
            Err(BenchError::OperationFailed { status, .. }) => {
                Err(BenchError::TransactionFinalizeFailed {
                    transaction: tx.label(),
                    status,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Reports completion to the owning transaction when dropped, so neither
/// an error return nor a panic can starve the completion count.
struct CompletionGuard<'a> {
    tx: &'a TransactionState,
    action: Action,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.tx.action_completed(self.action);
    }
}
