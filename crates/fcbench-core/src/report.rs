use crate::result::BenchResult;
use crate::types::{Action, RepositoryVersion, TransactionMode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

const MIB: f64 = 1024.0 * 1024.0;

/// Transaction figures of a run that used transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub mode: TransactionMode,
    pub actions_per_tx: i64,
    pub parallel_tx: usize,
    pub opened: usize,
    pub create_ms: u64,
    pub commit_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchSummary {
    pub action: Action,
    pub repository_version: RepositoryVersion,
    pub num_actions: usize,
    pub size: u64,
    pub num_threads: usize,
    pub completed: usize,
    pub failed: usize,
    /// Sum of the durations of every successful worker, control workers
    /// included.
    pub total_duration_ms: u64,
    pub total_bytes: u64,
    /// MB/s across all threads.
    pub throughput_mb_per_sec: f64,
    pub throughput_per_thread_mb_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<TransactionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_size_before: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_size_after: Option<u32>,
    pub run_time_ms: u64,
    pub started_at: DateTime<Utc>,
}

/// Run parameters the summary is computed against.
#[derive(Debug, Clone, Copy)]
pub struct RunShape {
    pub action: Action,
    pub repository_version: RepositoryVersion,
    pub num_actions: usize,
    pub size: u64,
    pub num_threads: usize,
}

impl BenchSummary {
    pub fn from_results(
        shape: RunShape,
        results: &[BenchResult],
        failed: usize,
        started_at: DateTime<Utc>,
        run_time_ms: u64,
    ) -> Self {
        let total_duration_ms: u64 = results.iter().map(BenchResult::duration_ms).sum();
        let total_bytes: u64 = results.iter().map(BenchResult::size).sum();
        let per_thread = shape.size as f64 * shape.num_actions as f64 * 1000.0
            / (MIB * total_duration_ms.max(1) as f64);
        Self {
            action: shape.action,
            repository_version: shape.repository_version,
            num_actions: shape.num_actions,
            size: shape.size,
            num_threads: shape.num_threads,
            completed: results.len(),
            failed,
            total_duration_ms,
            total_bytes,
            throughput_mb_per_sec: per_thread * shape.num_threads as f64,
            throughput_per_thread_mb_per_sec: per_thread,
            transactions: None,
            cluster_size_before: None,
            cluster_size_after: None,
            run_time_ms,
            started_at,
        }
    }

    /// Single space-separated line, suitable for pasting into a spreadsheet.
    pub fn condensed(&self) -> String {
        let head = format!(
            "{} {} {} {} {} {:.3}",
            self.num_actions,
            self.size,
            self.num_threads,
            self.action,
            self.total_duration_ms,
            self.throughput_per_thread_mb_per_sec
        );
        match &self.transactions {
            Some(tx) => format!(
                "{head} tx {} {} {} {}",
                tx.actions_per_tx, tx.parallel_tx, tx.create_ms, tx.commit_ms
            ),
            None => format!("{head} no-tx"),
        }
    }

    pub fn log(&self) {
        let suffix = if self.transactions.is_some() {
            " (includes tx create/commit)"
        } else {
            ""
        };
        info!(
            "completed {} {} action(s) executed in {} ms{}",
            self.completed, self.action, self.total_duration_ms, suffix
        );
        if self.failed > 0 {
            info!("{} action(s) failed", self.failed);
        }
        if let Some(nodes) = self.cluster_size_after {
            info!("the Fedora cluster has {} node(s) after the benchmark", nodes);
        }
        info!("throughput was {:.3} MB/sec", self.throughput_mb_per_sec);
        if self.num_threads > 1 {
            info!(
                "throughput per thread was {:.3} MB/sec",
                self.throughput_per_thread_mb_per_sec
            );
        }
        if let Some(tx) = &self.transactions {
            info!("time spent creating transactions {}ms", tx.create_ms);
            info!("time spent committing transactions {}ms", tx.commit_ms);
        }
        info!("condensed results:");
        info!("{}", self.condensed());
        info!("all operations completed in {} ms", self.run_time_ms);
    }
}

/// Human-readable byte count: `512 B`, `1.0 KB`, `2.5 MB`.
pub fn convert_size(size: u64) -> String {
    const UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];
    if size < 1024 {
        return format!("{size} B");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}B", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(threads: usize) -> RunShape {
        RunShape {
            action: Action::Ingest,
            repository_version: RepositoryVersion::Fcrepo4,
            num_actions: 4,
            size: 1024 * 1024,
            num_threads: threads,
        }
    }

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(convert_size(0), "0 B");
        assert_eq!(convert_size(1023), "1023 B");
        assert_eq!(convert_size(1024), "1.0 KB");
        assert_eq!(convert_size(1536), "1.5 KB");
        assert_eq!(convert_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(convert_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn throughput_is_scaled_by_threads() {
        let results: Vec<_> = (0..4)
            .map(|_| BenchResult::new(Action::Ingest, 250, 1024 * 1024))
            .collect();
        let s = BenchSummary::from_results(shape(2), &results, 0, Utc::now(), 600);
        assert_eq!(s.total_duration_ms, 1000);
        assert_eq!(s.total_bytes, 4 * 1024 * 1024);
        assert!((s.throughput_per_thread_mb_per_sec - 4.0).abs() < 1e-9);
        assert!((s.throughput_mb_per_sec - 8.0).abs() < 1e-9);
        assert_eq!(s.completed, 4);
    }

    #[test]
    fn empty_run_does_not_divide_by_zero() {
        let s = BenchSummary::from_results(shape(1), &[], 4, Utc::now(), 0);
        assert!(s.throughput_mb_per_sec.is_finite());
        assert_eq!(s.failed, 4);
    }

    #[test]
    fn condensed_line_marks_transactions() {
        let results = vec![BenchResult::new(Action::Ingest, 1000, 1024 * 1024)];
        let mut s = BenchSummary::from_results(shape(1), &results, 0, Utc::now(), 1200);
        assert_eq!(s.condensed(), "4 1048576 1 ingest 1000 4.000 no-tx");

        s.transactions = Some(TransactionSummary {
            mode: TransactionMode::Commit,
            actions_per_tx: 2,
            parallel_tx: 1,
            opened: 2,
            create_ms: 7,
            commit_ms: 9,
        });
        assert_eq!(s.condensed(), "4 1048576 1 ingest 1000 4.000 tx 2 1 7 9");
    }

    #[test]
    fn serializes_without_absent_sections() {
        let s = BenchSummary::from_results(shape(1), &[], 0, Utc::now(), 0);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["action"], "ingest");
        assert_eq!(json["repository_version"], "fcrepo4");
        assert!(json.get("transactions").is_none());
        assert!(json.get("started_at").is_some());
    }
}
