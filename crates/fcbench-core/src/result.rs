use crate::types::Action;
use serde::Serialize;

/// Outcome of one completed worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchResult {
    action: Action,
    /// Bytes per second; `None` when the action moves no payload.
    throughput: Option<f64>,
    duration_ms: u64,
    size: u64,
}

impl BenchResult {
    pub fn new(action: Action, duration_ms: u64, size: u64) -> Self {
        // A sub-millisecond call is reported as taking one millisecond.
        let throughput = action
            .moves_bytes()
            .then(|| size as f64 * 1000.0 / duration_ms.max(1) as f64);
        Self {
            action,
            throughput,
            duration_ms,
            size,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn throughput(&self) -> Option<f64> {
        self.throughput
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_actions_report_bytes_per_second() {
        let r = BenchResult::new(Action::Ingest, 500, 1024);
        assert_eq!(r.throughput(), Some(2048.0));
    }

    #[test]
    fn deletes_and_control_actions_report_no_throughput() {
        assert_eq!(BenchResult::new(Action::Delete, 10, 1024).throughput(), None);
        assert_eq!(BenchResult::new(Action::CommitTx, 10, 0).throughput(), None);
        assert_eq!(BenchResult::new(Action::SparqlSelect, 10, 0).throughput(), None);
    }

    #[test]
    fn zero_duration_does_not_divide_by_zero() {
        let r = BenchResult::new(Action::Read, 0, 100);
        assert_eq!(r.throughput(), Some(100_000.0));
    }
}
