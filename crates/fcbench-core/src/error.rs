use crate::types::Action;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{operation} failed: repository returned {status}")]
    OperationFailed { operation: String, status: u16 },

    #[error("{operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unsupported configuration: {0}")]
    ConfigurationUnsupported(String),

    #[error("finalizing transaction {transaction} failed: repository returned {status}")]
    TransactionFinalizeFailed { transaction: String, status: u16 },

    #[error("transaction was never created: {0}")]
    TransactionAborted(String),

    #[error("action {0} needs an owning transaction")]
    TransactionRequired(Action),

    #[error("invalid action '{0}': expected one of ingest, read, update, delete, create_property, read_property, update_property, delete_property, sparql_insert, sparql_select")]
    InvalidAction(String),

    #[error("invalid transaction mode '{0}': expected none, commit or rollback")]
    InvalidMode(String),

    #[error("invalid repository version '{0}': expected fcrepo3 or fcrepo4")]
    InvalidVersion(String),

    #[error("unable to determine repository version at {0}")]
    VersionUndetected(String),

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("worker pool is shut down")]
    PoolShutDown,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// HTTP status carried by the error, if the repository answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BenchError::OperationFailed { status, .. }
            | BenchError::TransactionFinalizeFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
