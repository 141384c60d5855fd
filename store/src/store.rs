//! The coin store contract.

use async_trait::async_trait;
use coinset_common::{Coin, CoinId, CoinPatch, NewCoin, ShortCode};

use crate::error::StoreResult;

/// Filter for listing coins. `None` matches any value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoinFilter {
    pub active: Option<bool>,
    pub main: Option<bool>,
}

impl CoinFilter {
    /// Only active coins.
    pub fn active() -> Self {
        Self {
            active: Some(true),
            main: None,
        }
    }

    /// Check whether a coin passes the filter.
    pub fn matches(&self, coin: &Coin) -> bool {
        self.active.map_or(true, |a| coin.active == a)
            && self.main.map_or(true, |m| coin.is_main == m)
    }
}

/// Durable coin records.
///
/// Reads outside a transaction see the last committed state; they never
/// observe a transaction's intermediate writes.
#[async_trait]
pub trait CoinStore: Send + Sync {
    /// Look a coin up by id.
    async fn get_by_id(&self, id: CoinId) -> StoreResult<Option<Coin>>;

    /// Look a coin up by short code.
    async fn get_by_code(&self, code: &ShortCode) -> StoreResult<Option<Coin>>;

    /// The coin flagged as main, if any.
    async fn get_main(&self) -> StoreResult<Option<Coin>>;

    /// All coins holding one of the given codes, in one read.
    async fn list_many(&self, codes: &[ShortCode]) -> StoreResult<Vec<Coin>>;

    /// All coins passing the filter, newest first.
    async fn list(&self, filter: &CoinFilter) -> StoreResult<Vec<Coin>>;

    /// Start an atomic, isolated unit of work. Writers are serialized.
    async fn begin(&self) -> StoreResult<Box<dyn CoinTransaction>>;
}

/// An open store transaction.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait CoinTransaction: Send {
    async fn get_by_id(&mut self, id: CoinId) -> StoreResult<Option<Coin>>;

    async fn get_main(&mut self) -> StoreResult<Option<Coin>>;

    /// Every coin in the set.
    async fn list_all(&mut self) -> StoreResult<Vec<Coin>>;

    /// Insert a coin; the store assigns id and timestamps.
    async fn insert(&mut self, new: NewCoin) -> StoreResult<Coin>;

    /// Apply a patch and return the updated record.
    async fn update_fields(&mut self, id: CoinId, patch: &CoinPatch) -> StoreResult<Coin>;

    /// Clear the main flag on every coin except `keep`. Returns how many
    /// coins were changed.
    async fn clear_main_except(&mut self, keep: Option<CoinId>) -> StoreResult<usize>;

    async fn delete(&mut self, id: CoinId) -> StoreResult<()>;

    /// Publish all writes at once.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard all writes.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
