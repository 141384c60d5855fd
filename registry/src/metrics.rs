//! Metrics for coin administration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registry metrics.
pub struct RegistryMetrics {
    /// Coins created.
    pub coins_created: AtomicU64,
    /// Coins updated.
    pub coins_updated: AtomicU64,
    /// Coins deleted.
    pub coins_deleted: AtomicU64,
    /// Main coin switches that changed something.
    pub main_switches: AtomicU64,
    /// Rates rewritten by rescaling.
    pub rates_rescaled: AtomicU64,
    /// Write operations that ended in an error.
    pub writes_failed: AtomicU64,
}

impl RegistryMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            coins_created: AtomicU64::new(0),
            coins_updated: AtomicU64::new(0),
            coins_deleted: AtomicU64::new(0),
            main_switches: AtomicU64::new(0),
            rates_rescaled: AtomicU64::new(0),
            writes_failed: AtomicU64::new(0),
        }
    }

    pub fn coin_created(&self) {
        self.coins_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coin_updated(&self) {
        self.coins_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coin_deleted(&self) {
        self.coins_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a main switch and the number of rates it rewrote.
    pub fn main_switched(&self, rescaled: usize) {
        self.main_switches.fetch_add(1, Ordering::Relaxed);
        self.rates_rescaled
            .fetch_add(rescaled as u64, Ordering::Relaxed);
    }

    pub fn write_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            coins_created: self.coins_created.load(Ordering::Relaxed),
            coins_updated: self.coins_updated.load(Ordering::Relaxed),
            coins_deleted: self.coins_deleted.load(Ordering::Relaxed),
            main_switches: self.main_switches.load(Ordering::Relaxed),
            rates_rescaled: self.rates_rescaled.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP coinset_coins_created Total coins created
# TYPE coinset_coins_created counter
coinset_coins_created {}

# HELP coinset_coins_updated Total coins updated
# TYPE coinset_coins_updated counter
coinset_coins_updated {}

# HELP coinset_coins_deleted Total coins deleted
# TYPE coinset_coins_deleted counter
coinset_coins_deleted {}

# HELP coinset_main_switches Total main coin switches
# TYPE coinset_main_switches counter
coinset_main_switches {}

# HELP coinset_rates_rescaled Total exchange rates rewritten by rescaling
# TYPE coinset_rates_rescaled counter
coinset_rates_rescaled {}

# HELP coinset_writes_failed Total failed write operations
# TYPE coinset_writes_failed counter
coinset_writes_failed {}
"#,
            snapshot.coins_created,
            snapshot.coins_updated,
            snapshot.coins_deleted,
            snapshot.main_switches,
            snapshot.rates_rescaled,
            snapshot.writes_failed,
        )
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub coins_created: u64,
    pub coins_updated: u64,
    pub coins_deleted: u64,
    pub main_switches: u64,
    pub rates_rescaled: u64,
    pub writes_failed: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<RegistryMetrics>;
