//! Simulation metrics.

use std::collections::VecDeque;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Administrative writes that committed.
    pub writes_committed: u64,
    /// Administrative writes that were rejected or failed.
    pub writes_failed: u64,
    /// Conversions and formats performed by readers.
    pub reads: u64,
    /// Assertions that held.
    pub assertions_passed: u64,
    /// Snapshots seen without exactly one main at rate 1.
    pub torn_snapshots: u64,
    /// Write latency samples (µs).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            writes_committed: 0,
            writes_failed: 0,
            reads: 0,
            assertions_passed: 0,
            torn_snapshots: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed write.
    pub fn record_write(&mut self, latency_us: u64) {
        self.writes_committed += 1;

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Record a failed write.
    pub fn record_failure(&mut self) {
        self.writes_failed += 1;
    }

    pub fn record_reads(&mut self, count: u64) {
        self.reads += count;
    }

    pub fn record_assertion(&mut self) {
        self.assertions_passed += 1;
    }

    pub fn record_torn_snapshot(&mut self) {
        self.torn_snapshots += 1;
    }

    /// Get average write latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p99 write latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of writes that committed.
    pub fn success_rate(&self) -> f64 {
        let total = self.writes_committed + self.writes_failed;
        if total == 0 {
            return 0.0;
        }

        self.writes_committed as f64 / total as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_write(100);
        metrics.record_write(200);
        metrics.record_write(150);
        metrics.record_failure();

        assert_eq!(metrics.writes_committed, 3);
        assert_eq!(metrics.writes_failed, 1);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.p99_latency_us(), 200);
        assert_eq!(metrics.success_rate(), 0.75);
    }
}
