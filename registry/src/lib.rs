//! Coinset Registry
//!
//! Administrative operations over a tenant's coin set. The registry is the
//! only writer of the main flag and of exchange rates: switching the main
//! coin re-expresses every other rate relative to it in one transaction.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod query;
pub mod rescale;
pub mod seed;

pub use config::RegistryConfig;
pub use engine::CoinRegistry;
pub use metrics::{MetricsSnapshot, RegistryMetrics, SharedMetrics};
pub use query::{ListQuery, Page};
pub use rescale::{plan_rescale, rescale_rate, RateChange};
pub use seed::{seed_main_coin, PresetCurrency, TenantSeed};
