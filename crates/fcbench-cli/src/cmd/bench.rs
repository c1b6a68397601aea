use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use fcbench_core::config::{BenchConfig, WarnLevel};
use fcbench_core::fedora;
use fcbench_core::report::{convert_size, BenchSummary};
use fcbench_core::runner::BenchmarkRunner;
use fcbench_core::types::{Action, RepositoryVersion, TransactionMode};
use std::path::PathBuf;
use tracing::{error, warn};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Run settings. Anything left unset falls back to the config file, then to
/// the built-in defaults.
#[derive(Args, Debug, Default, Clone)]
pub struct BenchArgs {
    /// URL of the Fedora instance, including the webapp context path
    /// [default: http://localhost:8080]
    #[arg(short = 'f', long, env = "FCBENCH_URL")]
    pub fedora_url: Option<String>,

    /// Number of actions to run [default: 1]
    #[arg(short = 'n', long)]
    pub num_actions: Option<usize>,

    /// Payload size in bytes [default: 1024]
    #[arg(short = 's', long)]
    pub size: Option<u64>,

    /// Number of worker threads [default: 1]
    #[arg(short = 't', long)]
    pub num_threads: Option<usize>,

    /// Action to benchmark: ingest, read, update, delete, create_property,
    /// read_property, update_property, delete_property, sparql_insert or
    /// sparql_select [default: ingest]
    #[arg(short = 'a', long)]
    pub action: Option<Action>,

    /// File receiving one duration (ms) per line [default: durations.log]
    #[arg(short = 'l', long = "log")]
    pub log: Option<PathBuf>,

    /// Repository user name
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Repository password
    #[arg(short = 'p', long, env = "FCBENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Transaction mode: none, commit or rollback
    #[arg(short = 'x', long = "transactions")]
    pub tx_mode: Option<TransactionMode>,

    /// Actions per transaction; 0 leaves transactions unbounded
    #[arg(long, allow_negative_numbers = true)]
    pub actions_per_tx: Option<i64>,

    /// Number of transactions open at the same time [default: 1]
    #[arg(long)]
    pub parallel_tx: Option<usize>,

    /// Run preparation and purge inside their own transaction
    #[arg(long)]
    pub prep_as_tx: bool,

    /// Leave the created objects in the repository
    #[arg(long)]
    pub no_purge: bool,

    /// Repository generation (fcrepo3 or fcrepo4); skips detection
    #[arg(long)]
    pub repository_version: Option<RepositoryVersion>,

    /// YAML config file
    #[arg(short = 'c', long, env = "FCBENCH_CONFIG")]
    pub config: Option<PathBuf>,
}

impl BenchArgs {
    /// The config file (or defaults) with every given flag applied on top.
    pub fn resolve(&self) -> anyhow::Result<BenchConfig> {
        let mut cfg = match &self.config {
            Some(path) => BenchConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => BenchConfig::default(),
        };

        if let Some(url) = &self.fedora_url {
            cfg.fedora_url = url.clone();
        }
        cfg.fedora_url = cfg.base_url().to_string();
        if let Some(n) = self.num_actions {
            cfg.num_actions = n;
        }
        if let Some(size) = self.size {
            cfg.size = size;
        }
        if let Some(t) = self.num_threads {
            cfg.num_threads = t;
        }
        if let Some(action) = self.action {
            cfg.action = action;
        }
        if let Some(log) = &self.log {
            cfg.log_path = log.clone();
        }
        if let Some(user) = &self.user {
            cfg.user = Some(user.clone());
        }
        if let Some(password) = &self.password {
            cfg.password = Some(password.clone());
        }
        if let Some(mode) = self.tx_mode {
            cfg.tx_mode = mode;
        }
        if let Some(k) = self.actions_per_tx {
            cfg.actions_per_tx = k;
        }
        if let Some(p) = self.parallel_tx {
            cfg.parallel_tx = p;
        }
        if self.prep_as_tx {
            cfg.preparation_as_tx = true;
        }
        if self.no_purge {
            cfg.purge = false;
        }
        if let Some(version) = self.repository_version {
            cfg.repository_version = Some(version);
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(args: &BenchArgs, json: bool) -> anyhow::Result<()> {
    let config = args.resolve()?;

    let warnings = config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Warning => warn!("{}", w.message),
            WarnLevel::Error => error!("{}", w.message),
        }
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("invalid configuration, see `fcbench config validate`");
    }

    let client = fedora::connect(
        config.base_url(),
        config.repository_version,
        config.credentials(),
    )
    .with_context(|| format!("unable to connect to a Fedora instance at {}", config.base_url()))?;

    let mut runner = BenchmarkRunner::new(config, client);
    let summary = runner.run().context("benchmark failed")?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &BenchSummary) {
    let mut rows = vec![
        row("action", summary.action),
        row("repository", summary.repository_version),
        row("actions", summary.num_actions),
        row("size", convert_size(summary.size)),
        row("threads", summary.num_threads),
        row("completed", summary.completed),
        row("failed", summary.failed),
        row("duration (ms)", summary.total_duration_ms),
        row("transferred", convert_size(summary.total_bytes)),
        row("throughput (MB/s)", format!("{:.3}", summary.throughput_mb_per_sec)),
    ];
    if summary.num_threads > 1 {
        rows.push(row(
            "per thread (MB/s)",
            format!("{:.3}", summary.throughput_per_thread_mb_per_sec),
        ));
    }
    if let Some(tx) = &summary.transactions {
        rows.push(row("tx mode", tx.mode));
        rows.push(row("tx opened", tx.opened));
        rows.push(row("tx create (ms)", tx.create_ms));
        rows.push(row("tx commit (ms)", tx.commit_ms));
    }
    if let Some(nodes) = summary.cluster_size_after {
        rows.push(row("cluster nodes", nodes));
    }
    rows.push(row("wall time (ms)", summary.run_time_ms));
    print_table(&["METRIC", "VALUE"], rows);
    println!();
    println!("{}", summary.condensed());
}

fn row(label: &str, value: impl ToString) -> Vec<String> {
    vec![label.to_string(), value.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bench.yaml");
        std::fs::write(&path, "num_actions: 20\nsize: 2048\naction: read\n").unwrap();
        let args = BenchArgs {
            config: Some(path),
            size: Some(4096),
            fedora_url: Some("http://repo/fcrepo//".into()),
            no_purge: true,
            ..BenchArgs::default()
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.num_actions, 20);
        assert_eq!(cfg.size, 4096);
        assert_eq!(cfg.action, Action::Read);
        assert_eq!(cfg.fedora_url, "http://repo/fcrepo");
        assert!(!cfg.purge);
    }

    #[test]
    fn missing_file_is_reported() {
        let args = BenchArgs {
            config: Some(PathBuf::from("/nonexistent/bench.yaml")),
            ..BenchArgs::default()
        };
        let err = args.resolve().unwrap_err();
        assert!(format!("{err:#}").contains("failed to load config"));
    }
}
