use crate::error::Result;
use crate::fedora::Credentials;
use crate::types::{Action, RepositoryVersion, TransactionMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// BenchConfig
// ---------------------------------------------------------------------------

/// Everything a benchmark run needs to know. Loaded from YAML, then
/// overridden field by field from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_fedora_url")]
    pub fedora_url: String,
    /// Skips version detection when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_version: Option<RepositoryVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_action")]
    pub action: Action,
    #[serde(default = "default_num_actions")]
    pub num_actions: usize,
    /// Payload size in bytes.
    #[serde(default = "default_size")]
    pub size: u64,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default)]
    pub tx_mode: TransactionMode,
    /// Capacity of each transaction; `<= 0` leaves them unbounded.
    #[serde(default)]
    pub actions_per_tx: i64,
    #[serde(default = "default_parallel_tx")]
    pub parallel_tx: usize,
    #[serde(default)]
    pub preparation_as_tx: bool,
    #[serde(default = "default_purge")]
    pub purge: bool,
}

fn default_fedora_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_action() -> Action {
    Action::Ingest
}

fn default_num_actions() -> usize {
    1
}

fn default_size() -> u64 {
    1024
}

fn default_num_threads() -> usize {
    1
}

fn default_log_path() -> PathBuf {
    PathBuf::from("durations.log")
}

fn default_parallel_tx() -> usize {
    1
}

fn default_purge() -> bool {
    true
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            fedora_url: default_fedora_url(),
            repository_version: None,
            user: None,
            password: None,
            action: default_action(),
            num_actions: default_num_actions(),
            size: default_size(),
            num_threads: default_num_threads(),
            log_path: default_log_path(),
            tx_mode: TransactionMode::None,
            actions_per_tx: 0,
            parallel_tx: default_parallel_tx(),
            preparation_as_tx: false,
            purge: default_purge(),
        }
    }
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: BenchConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// The repository URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.fedora_url.trim_end_matches('/')
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.user.as_ref().map(|user| Credentials {
            user: user.clone(),
            password: self.password.clone(),
        })
    }

    /// A copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            password: self.password.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.num_actions == 0 {
            warnings.push(ConfigWarning::error("num_actions must be at least 1"));
        }
        if self.num_threads == 0 {
            warnings.push(ConfigWarning::error("num_threads must be at least 1"));
        }
        if self.action.is_control() {
            warnings.push(ConfigWarning::error(format!(
                "'{}' is a transaction control action and cannot be benchmarked",
                self.action
            )));
        }
        if self.size == 0 && self.action.moves_bytes() {
            warnings.push(ConfigWarning::warning(format!(
                "size is 0; {} will report no meaningful throughput",
                self.action
            )));
        }

        if self.tx_mode.is_enabled() {
            if self.parallel_tx == 0 {
                warnings.push(ConfigWarning::error(
                    "parallel_tx must be at least 1 when transactions are enabled",
                ));
            }
        } else if self.actions_per_tx != 0 || self.parallel_tx != default_parallel_tx() {
            warnings.push(ConfigWarning::warning(
                "actions_per_tx and parallel_tx are ignored without a transaction mode",
            ));
        }

        if let Some(version) = self.repository_version {
            if !version.supports_action(self.action) {
                warnings.push(ConfigWarning::error(format!(
                    "{} cannot run {}",
                    version, self.action
                )));
            }
            if !version.supports_transactions() {
                if self.tx_mode.is_enabled() {
                    warnings.push(ConfigWarning::warning(format!(
                        "{version} has no transactions; tx_mode will be treated as none"
                    )));
                }
                if self.preparation_as_tx {
                    warnings.push(ConfigWarning::warning(format!(
                        "{version} has no transactions; preparation will run without one"
                    )));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
