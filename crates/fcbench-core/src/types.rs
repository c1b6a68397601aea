use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One benchmarked unit of work.
///
/// Data-moving kinds operate on a resource, its payload or one of its
/// properties. Query kinds run SPARQL against the repository. Control kinds
/// drive a server-side transaction and are only ever synthesized by the
/// planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ingest,
    Read,
    Update,
    Delete,
    CreateProperty,
    ReadProperty,
    UpdateProperty,
    DeleteProperty,
    SparqlInsert,
    SparqlSelect,
    CreateTx,
    CommitTx,
    RollbackTx,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::Ingest,
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::CreateProperty,
            Action::ReadProperty,
            Action::UpdateProperty,
            Action::DeleteProperty,
            Action::SparqlInsert,
            Action::SparqlSelect,
            Action::CreateTx,
            Action::CommitTx,
            Action::RollbackTx,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Ingest => "ingest",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::CreateProperty => "create_property",
            Action::ReadProperty => "read_property",
            Action::UpdateProperty => "update_property",
            Action::DeleteProperty => "delete_property",
            Action::SparqlInsert => "sparql_insert",
            Action::SparqlSelect => "sparql_select",
            Action::CreateTx => "create_tx",
            Action::CommitTx => "commit_tx",
            Action::RollbackTx => "rollback_tx",
        }
    }

    /// Transaction lifecycle actions. These never count toward a
    /// transaction's completed work.
    pub fn is_control(self) -> bool {
        matches!(self, Action::CreateTx | Action::CommitTx | Action::RollbackTx)
    }

    pub fn is_query(self) -> bool {
        matches!(self, Action::SparqlInsert | Action::SparqlSelect)
    }

    pub fn is_property(self) -> bool {
        matches!(
            self,
            Action::CreateProperty
                | Action::ReadProperty
                | Action::UpdateProperty
                | Action::DeleteProperty
        )
    }

    /// Whether a throughput figure is meaningful for this action.
    pub fn moves_bytes(self) -> bool {
        match self {
            Action::Ingest
            | Action::Read
            | Action::Update
            | Action::CreateProperty
            | Action::ReadProperty
            | Action::UpdateProperty => true,
            Action::Delete
            | Action::DeleteProperty
            | Action::SparqlInsert
            | Action::SparqlSelect
            | Action::CreateTx
            | Action::CommitTx
            | Action::RollbackTx => false,
        }
    }

    /// What the preparation phase has to create before this action can run.
    pub fn prerequisite(self) -> Option<Action> {
        match self {
            Action::Read | Action::Update | Action::Delete => Some(Action::Ingest),
            Action::ReadProperty | Action::UpdateProperty | Action::DeleteProperty => {
                Some(Action::CreateProperty)
            }
            Action::SparqlSelect => Some(Action::SparqlInsert),
            Action::Ingest
            | Action::CreateProperty
            | Action::SparqlInsert
            | Action::CreateTx
            | Action::CommitTx
            | Action::RollbackTx => None,
        }
    }

    /// Whether a payload is still attached to every resource once the
    /// measured phase is over.
    pub fn leaves_payload(self, mode: TransactionMode) -> bool {
        match self {
            Action::Read | Action::Update => true,
            Action::Ingest => mode != TransactionMode::Rollback,
            Action::Delete => mode == TransactionMode::Rollback,
            _ => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Action::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| BenchError::InvalidAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TransactionMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    #[default]
    None,
    Commit,
    Rollback,
}

impl TransactionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionMode::None => "none",
            TransactionMode::Commit => "commit",
            TransactionMode::Rollback => "rollback",
        }
    }

    /// The control action that closes a transaction in this mode.
    pub fn finalize_action(self) -> Action {
        match self {
            TransactionMode::Commit => Action::CommitTx,
            TransactionMode::None | TransactionMode::Rollback => Action::RollbackTx,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != TransactionMode::None
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(TransactionMode::None),
            "commit" => Ok(TransactionMode::Commit),
            "rollback" => Ok(TransactionMode::Rollback),
            _ => Err(BenchError::InvalidMode(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RepositoryVersion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryVersion {
    Fcrepo3,
    Fcrepo4,
}

impl RepositoryVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryVersion::Fcrepo3 => "fcrepo3",
            RepositoryVersion::Fcrepo4 => "fcrepo4",
        }
    }

    pub fn supports_transactions(self) -> bool {
        self == RepositoryVersion::Fcrepo4
    }

    /// Property and SPARQL actions need the Fedora 4 linked-data API.
    pub fn supports_action(self, action: Action) -> bool {
        match self {
            RepositoryVersion::Fcrepo4 => true,
            RepositoryVersion::Fcrepo3 => {
                !(action.is_property() || action.is_query() || action.is_control())
            }
        }
    }
}

impl fmt::Display for RepositoryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RepositoryVersion {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcrepo3" | "3" => Ok(RepositoryVersion::Fcrepo3),
            "fcrepo4" | "4" => Ok(RepositoryVersion::Fcrepo4),
            _ => Err(BenchError::InvalidVersion(s.to_string())),
        }
    }
}
