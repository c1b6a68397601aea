//! The benchmark orchestrator.
//!
//! A run has four phases: preparation creates the resources (and whatever
//! the benchmarked action needs to find on them), planning turns the
//! identifiers into an ordered list of workers, execution pushes that list
//! through the worker pool and collects the results, and purge removes
//! what the run left behind.
//!
//! In transactional runs planning also synthesizes the control workers:
//! a `CreateTx` ahead of the first member of each transaction and a
//! commit or rollback right after its last one. Members and finalizers
//! poll their transaction's state, so the plan stays correct no matter how
//! the pool interleaves them.

use crate::client::{elapsed_ms, RemoteClient};
use crate::config::BenchConfig;
use crate::duration_log::DurationLog;
use crate::error::Result;
use crate::executor::{JobHandle, WorkerPool};
use crate::report::{convert_size, BenchSummary, RunShape, TransactionSummary};
use crate::result::BenchResult;
use crate::transaction::TransactionState;
use crate::tx_pool::TransactionPool;
use crate::types::{Action, RepositoryVersion, TransactionMode};
use crate::worker::{ActionWorker, TxBinding};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct BenchmarkRunner {
    config: BenchConfig,
    client: Arc<dyn RemoteClient>,
    tx_pool: Option<TransactionPool>,
    /// Dedicated single, unbounded, committing transaction for preparation
    /// and purge.
    prep_pool: Option<TransactionPool>,
    duration_log: Option<DurationLog>,
    results: Mutex<Vec<BenchResult>>,
    failures: usize,
}

impl BenchmarkRunner {
    /// Settings the repository cannot honour are downgraded with a warning
    /// rather than failing the run.
    pub fn new(mut config: BenchConfig, client: Arc<dyn RemoteClient>) -> Self {
        let version = client.version();
        if config.tx_mode.is_enabled() && !client.supports_transactions() {
            warn!("transactions are not supported by {version}, transaction settings ignored");
            config.tx_mode = TransactionMode::None;
        }
        if config.preparation_as_tx && !client.supports_transactions() {
            warn!("transactions are not supported by {version}, preparation runs without one");
            config.preparation_as_tx = false;
        }
        if !version.supports_action(config.action) {
            warn!("{version} cannot run {}; every action will fail", config.action);
        }

        let tx_pool = config.tx_mode.is_enabled().then(|| {
            debug!(
                "transactions enabled in mode {} with {} actions per tx and {} parallel tx",
                config.tx_mode, config.actions_per_tx, config.parallel_tx
            );
            TransactionPool::new(config.tx_mode, config.actions_per_tx, config.parallel_tx)
        });
        let prep_pool = config
            .preparation_as_tx
            .then(|| TransactionPool::new(TransactionMode::Commit, 0, 1));
        let duration_log = DurationLog::open_or_warn(&config.log_path);

        Self {
            config,
            client,
            tx_pool,
            prep_pool,
            duration_log,
            results: Mutex::new(Vec::new()),
            failures: 0,
        }
    }

    pub fn with_duration_log(mut self, log: Option<DurationLog>) -> Self {
        self.duration_log = log;
        self
    }

    /// The configuration after downgrades.
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn tx_mode(&self) -> TransactionMode {
        self.config.tx_mode
    }

    pub fn results(&self) -> Vec<BenchResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    // -----------------------------------------------------------------------
    // Full run
    // -----------------------------------------------------------------------

    pub fn run(&mut self) -> Result<BenchSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let version = self.client.version();
        info!(
            "running {} {} action(s) against {} with a binary size of {} using {} thread(s)",
            self.config.num_actions,
            self.config.action,
            version,
            convert_size(self.config.size),
            self.config.num_threads
        );
        let cluster_size_before = self.cluster_size("before");

        let pids = self.prepare()?;
        info!("scheduling {} actions", pids.len());
        let executed = self.execute(&pids);
        self.settle(&pids, executed)?;

        let mut summary = BenchSummary::from_results(
            RunShape {
                action: self.config.action,
                repository_version: version,
                num_actions: self.config.num_actions,
                size: self.config.size,
                num_threads: self.config.num_threads,
            },
            &self.results(),
            self.failures,
            started_at,
            elapsed_ms(start),
        );
        summary.transactions = self.tx_pool.as_ref().map(|pool| TransactionSummary {
            mode: pool.mode(),
            actions_per_tx: pool.actions_per_tx(),
            parallel_tx: pool.parallel_tx(),
            opened: pool.opened(),
            create_ms: pool.create_time(),
            commit_ms: pool.commit_time(),
        });
        summary.cluster_size_before = cluster_size_before;
        summary.cluster_size_after = self.cluster_size("after");
        summary.log();
        Ok(summary)
    }

    fn cluster_size(&self, when: &str) -> Option<u32> {
        if self.client.version() != RepositoryVersion::Fcrepo4 {
            return None;
        }
        match self.client.cluster_size() {
            Ok(nodes) => {
                info!("the Fedora cluster has {nodes} node(s) {when} the benchmark");
                Some(nodes)
            }
            Err(e) => {
                warn!("unable to read cluster size {when} the benchmark: {e}");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Planning
    // -----------------------------------------------------------------------

    /// Build the ordered worker list for `pids`. Without transactions this
    /// is one worker per identifier.
    pub fn plan(&mut self, pids: &[String]) -> Vec<ActionWorker> {
        let action = self.config.action;
        let size = self.config.size;
        let client = &self.client;
        let worker = |pid: &String| ActionWorker::new(action, pid.as_str(), size, Arc::clone(client));

        let Some(pool) = self.tx_pool.as_mut() else {
            return pids.iter().map(worker).collect();
        };

        pool.plan_for(pids.len());
        let timers = pool.timers();
        let finalize = pool.finalize_action();
        let bind = |state: Arc<TransactionState>| TxBinding {
            state,
            timers: Arc::clone(&timers),
        };

        let mut workers = Vec::with_capacity(pids.len());
        for pid in pids {
            let tx = pool.get_transaction();
            if !tx.has_actions_assigned() {
                debug!("adding create worker for {}", tx.label());
                workers.push(ActionWorker::control(
                    Action::CreateTx,
                    bind(Arc::clone(&tx)),
                    Arc::clone(client),
                ));
            }
            tx.assign_action();
            workers.push(worker(pid).in_transaction(bind(Arc::clone(&tx))));
            if tx.all_actions_assigned() {
                debug!("adding {} worker for {}", finalize, tx.label());
                workers.push(ActionWorker::control(finalize, bind(tx), Arc::clone(client)));
            }
        }

        // Whatever is still open gets trimmed to what it was given.
        for tx in pool.open_transactions() {
            tx.trim_to_assigned();
            debug!(
                "trimmed {} to {} action(s), adding {} worker",
                tx.label(),
                tx.actions_assigned(),
                finalize
            );
            workers.push(ActionWorker::control(finalize, bind(tx), Arc::clone(client)));
        }
        pool.clear_transactions();
        workers
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Plan, run and collect the measured phase for `pids`.
    pub fn execute(&mut self, pids: &[String]) -> Result<()> {
        let workers = self.plan(pids);
        let mut pool = WorkerPool::new(self.config.num_threads)?;
        let handles = workers
            .into_iter()
            .map(|w| {
                let action = w.action();
                pool.submit(move || w.run()).map(|h| (action, h))
            })
            .collect::<Result<Vec<_>>>()?;
        self.collect(handles);
        pool.shutdown();
        if let Some(log) = self.duration_log.as_mut() {
            if let Err(e) = log.flush() {
                warn!("unable to flush duration log: {e}");
            }
        }
        Ok(())
    }

    fn collect(&mut self, handles: Vec<(Action, JobHandle<Result<BenchResult>>)>) {
        let total = handles.len();
        for (count, (action, handle)) in handles.into_iter().enumerate() {
            match handle.join().and_then(|r| r) {
                Ok(res) => {
                    debug!("{} of {} actions finished", count + 1, total);
                    self.log_duration(res.duration_ms());
                    self.results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(res);
                }
                Err(e) => {
                    error!("{action} failed: {e}");
                    self.failures += 1;
                }
            }
        }
    }

    fn log_duration(&mut self, ms: u64) {
        if let Some(log) = self.duration_log.as_mut() {
            if let Err(e) = log.record(ms) {
                warn!("unable to write duration log, disabling it: {e}");
                self.duration_log = None;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Preparation and purge
    // -----------------------------------------------------------------------

    /// Create `num_actions` fresh resources plus whatever the benchmarked
    /// action expects to find on them.
    pub fn prepare(&mut self) -> Result<Vec<String>> {
        let n = self.config.num_actions;
        let size = self.config.size;
        let pids: Vec<String> = (0..n).map(|_| Uuid::new_v4().to_string()).collect();
        info!("preparing {n} objects");

        let tx = self.begin_preparation_tx()?;
        let tx_ref = tx.as_ref().map(|b| b.state.as_ref());

        let ms = self.client.create_resources(&pids, tx_ref);
        info!("creating {} objects took {} ms", pids.len(), ms);

        if let Some(prerequisite) = self.config.action.prerequisite() {
            info!(
                "preparing {} {} of size {} for {}",
                n,
                prerequisite,
                convert_size(size),
                self.config.action
            );
            let ms = match prerequisite {
                Action::Ingest => self.client.create_payloads(&pids, size, tx_ref),
                Action::CreateProperty => self.client.create_properties(&pids, size, tx_ref),
                Action::SparqlInsert => self.client.sparql_inserts(&pids, tx_ref),
                other => {
                    warn!("no preparation step for {other}");
                    0
                }
            };
            debug!("preparing {prerequisite} took {ms} ms");
        }

        self.commit_preparation_tx(tx)?;
        Ok(pids)
    }

    /// Delete the resources, and their payloads when the run left them in
    /// place.
    pub fn purge(&mut self, pids: &[String]) -> Result<()> {
        let remove_payloads = self.config.action.leaves_payload(self.config.tx_mode);
        info!(
            "purging {} objects{}",
            pids.len(),
            if remove_payloads { " and datastreams" } else { "" }
        );
        let tx = self.begin_preparation_tx()?;
        let ms = self
            .client
            .purge(pids, remove_payloads, tx.as_ref().map(|b| b.state.as_ref()));
        debug!("purge took {ms} ms");
        self.commit_preparation_tx(tx)
    }

    /// Purge what preparation left behind, then hand back the outcome of the
    /// measured phase. Purge failures are logged, never returned.
    fn settle(&mut self, pids: &[String], executed: Result<()>) -> Result<()> {
        if self.config.purge {
            if let Err(e) = self.purge(pids) {
                error!("purge failed: {e}");
            }
        }
        executed
    }

    fn begin_preparation_tx(&mut self) -> Result<Option<TxBinding>> {
        let Some(pool) = self.prep_pool.as_mut() else {
            return Ok(None);
        };
        let binding = TxBinding {
            state: pool.get_transaction(),
            timers: pool.timers(),
        };
        ActionWorker::control(Action::CreateTx, binding.clone(), Arc::clone(&self.client)).run()?;
        Ok(Some(binding))
    }

    fn commit_preparation_tx(&mut self, tx: Option<TxBinding>) -> Result<()> {
        let (Some(binding), Some(pool)) = (tx, self.prep_pool.as_mut()) else {
            return Ok(());
        };
        binding.state.mark_ready_for_commit();
        let committed =
            ActionWorker::control(Action::CommitTx, binding, Arc::clone(&self.client)).run();
        pool.clear_transactions();
        committed.map(|_| ())
    }
}

impl std::fmt::Debug for BenchmarkRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkRunner")
            .field("config", &self.config.redacted())
            .field("version", &self.client.version())
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}
