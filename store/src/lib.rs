//! Coinset Store
//!
//! The durable-record contract the coin engine is written against, an
//! in-memory implementation with snapshot isolation, and the repository
//! cache that sits in front of any store for one unit of work.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coinset_store::{CoinCache, MemoryCoinStore};
//!
//! let store = Arc::new(MemoryCoinStore::new());
//! let cache = CoinCache::new(store.clone());
//!
//! let usd = cache.by_code(&"USD".parse()?).await?;
//! let main = cache.main().await?;
//! ```

pub mod cache;
pub mod error;
pub mod memory;
pub mod store;

pub use cache::{CacheConfig, CacheStats, CoinCache};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCoinStore, StoreStatsSnapshot};
pub use store::{CoinFilter, CoinStore, CoinTransaction};
