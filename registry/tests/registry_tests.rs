//! Integration tests for coin administration against the in-memory store.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use chrono::Utc;
use coinset_common::{
    Coin, CoinError, CoinPatch, NewCoin, RateChangeReason, RateHistoryEntry, ShortCode,
    SymbolPosition,
};
use coinset_fx::{CurrencyContext, CurrencyService, UnitOfWork};
use coinset_registry::{CoinRegistry, ListQuery, RegistryConfig};
use coinset_store::{CoinCache, CoinFilter, CoinStore, MemoryCoinStore};

struct Fixture {
    store: Arc<MemoryCoinStore>,
    registry: CoinRegistry,
    cache: CoinCache,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(MemoryCoinStore::new());
        Self {
            registry: CoinRegistry::new(store.clone()),
            cache: CoinCache::new(store.clone()),
            store,
        }
    }

    async fn add(&self, code: &str, rate: Decimal, main: bool) -> Coin {
        let mut new = NewCoin::new(code, code.parse().unwrap(), "¤", SymbolPosition::Front);
        if main {
            new = new.main();
        } else {
            new = new.rate(rate);
        }
        self.registry.create(&self.cache, new).await.unwrap()
    }

    fn coin(&self, code: &str) -> Coin {
        let code: ShortCode = code.parse().unwrap();
        self.store
            .snapshot()
            .into_iter()
            .find(|c| c.short_code == code)
            .unwrap()
    }

    fn mains(&self) -> Vec<Coin> {
        self.store.snapshot().into_iter().filter(|c| c.is_main).collect()
    }
}

/// A main at 1, B at 2, C at 0.5.
async fn abc() -> (Fixture, Coin, Coin, Coin) {
    let fx = Fixture::new();
    let a = fx.add("AAA", Decimal::ONE, true).await;
    let b = fx.add("BBB", dec!(2), false).await;
    let c = fx.add("CCC", dec!(0.5), false).await;
    (fx, a, b, c)
}

#[tokio::test]
async fn test_set_main_rescales_rates() {
    let (fx, _a, b, _c) = abc().await;

    let promoted = fx.registry.set_main(&fx.cache, b.id).await.unwrap();

    assert!(promoted.is_main);
    assert_eq!(promoted.exchange_rate, Decimal::ONE);
    assert_eq!(fx.coin("AAA").exchange_rate, dec!(0.5));
    assert_eq!(fx.coin("CCC").exchange_rate, dec!(0.25));
    assert!(!fx.coin("AAA").is_main);
    assert_eq!(fx.mains().len(), 1);
}

#[tokio::test]
async fn test_set_main_journals_previous_rates() {
    let (fx, _a, b, _c) = abc().await;

    fx.registry.set_main(&fx.cache, b.id).await.unwrap();

    let a = fx.coin("AAA");
    let history = a.rate_history.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rate, Decimal::ONE);
    assert_eq!(
        history[0].reason,
        RateChangeReason::Rescaled {
            main: "BBB".parse().unwrap()
        }
    );

    let b = fx.coin("BBB");
    let history = b.rate_history.unwrap();
    assert_eq!(history[0].rate, dec!(2));
    assert_eq!(history[0].reason, RateChangeReason::Promoted);
}

#[tokio::test]
async fn test_set_main_rounds_to_four_places() {
    let fx = Fixture::new();
    fx.add("AAA", Decimal::ONE, true).await;
    let b = fx.add("BBB", dec!(3), false).await;
    fx.add("CCC", dec!(2), false).await;

    fx.registry.set_main(&fx.cache, b.id).await.unwrap();

    assert_eq!(fx.coin("AAA").exchange_rate, dec!(0.3333));
    assert_eq!(fx.coin("CCC").exchange_rate, dec!(0.6667));
}

#[tokio::test]
async fn test_set_main_on_main_is_noop() {
    let (fx, a, _b, _c) = abc().await;
    let before = fx.store.snapshot();
    let commits = fx.store.stats().commits;

    let same = fx.registry.set_main(&fx.cache, a.id).await.unwrap();

    assert_eq!(same, fx.coin("AAA"));
    assert_eq!(fx.store.snapshot(), before);
    assert_eq!(fx.store.stats().commits, commits);
    assert_eq!(fx.registry.metrics().snapshot().main_switches, 0);
}

#[tokio::test]
async fn test_set_main_twice_in_a_row() {
    let (fx, _a, b, _c) = abc().await;

    fx.registry.set_main(&fx.cache, b.id).await.unwrap();
    let after_first = fx.store.snapshot();
    fx.registry.set_main(&fx.cache, b.id).await.unwrap();

    assert_eq!(fx.store.snapshot(), after_first);
}

#[tokio::test]
async fn test_set_main_unknown_coin() {
    let (fx, ..) = abc().await;

    let err = fx
        .registry
        .set_main(&fx.cache, coinset_common::CoinId::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoinError::NotFound(_)));
    assert_eq!(fx.registry.metrics().snapshot().writes_failed, 1);
}

#[tokio::test]
async fn test_set_main_underflow_aborts() {
    let fx = Fixture::new();
    fx.add("AAA", Decimal::ONE, true).await;
    fx.add("TNY", dec!(0.0001), false).await;
    let big = fx.add("BIG", dec!(10000), false).await;
    let before = fx.store.snapshot();

    let err = fx.registry.set_main(&fx.cache, big.id).await.unwrap_err();

    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert_eq!(fx.store.snapshot(), before);
}

#[tokio::test]
async fn test_set_main_commit_failure_leaves_state() {
    let (fx, _a, b, _c) = abc().await;
    let before = fx.store.snapshot();

    fx.store.fail_next_commit();
    let err = fx.registry.set_main(&fx.cache, b.id).await.unwrap_err();

    assert!(matches!(err, CoinError::TransactionFailure { .. }));
    assert!(err.is_retryable());
    assert_eq!(fx.store.snapshot(), before);

    // The caller may retry the whole operation.
    fx.registry.set_main(&fx.cache, b.id).await.unwrap();
    assert_eq!(fx.coin("AAA").exchange_rate, dec!(0.5));
}

#[tokio::test]
async fn test_write_invalidates_cache() {
    let (fx, _a, b, _c) = abc().await;
    let code: ShortCode = "CCC".parse().unwrap();

    let before = fx.cache.by_code(&code).await.unwrap().unwrap();
    assert_eq!(before.exchange_rate, dec!(0.5));

    fx.registry.set_main(&fx.cache, b.id).await.unwrap();

    let after = fx.cache.by_code(&code).await.unwrap().unwrap();
    assert_eq!(after.exchange_rate, dec!(0.25));
    let main = fx.cache.main().await.unwrap().unwrap();
    assert_eq!(main.id, b.id);
}

#[tokio::test]
async fn test_first_coin_must_be_main() {
    let fx = Fixture::new();
    let eur = NewCoin::new("Euro", ShortCode::eur(), "€", SymbolPosition::Back);

    let err = fx.registry.create(&fx.cache, eur).await.unwrap_err();

    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn test_create_main_does_not_rescale() {
    let (fx, ..) = abc().await;

    let d = NewCoin::new("Ddd", "DDD".parse().unwrap(), "D", SymbolPosition::Back).main();
    let created = fx.registry.create(&fx.cache, d).await.unwrap();

    assert!(created.is_main);
    assert_eq!(fx.mains().len(), 1);
    assert!(!fx.coin("AAA").is_main);
    assert_eq!(fx.coin("AAA").exchange_rate, Decimal::ONE);
    assert_eq!(fx.coin("BBB").exchange_rate, dec!(2));
    assert_eq!(fx.coin("CCC").exchange_rate, dec!(0.5));
}

#[tokio::test]
async fn test_create_main_requires_unit_rate() {
    let (fx, ..) = abc().await;

    let d = NewCoin::new("Ddd", "DDD".parse().unwrap(), "D", SymbolPosition::Back)
        .main()
        .rate(dec!(2));
    let err = fx.registry.create(&fx.cache, d).await.unwrap_err();

    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert!(fx.coin("AAA").is_main);
}

#[tokio::test]
async fn test_create_validates_input() {
    let (fx, ..) = abc().await;

    let mut bad = NewCoin::new("", "DDD".parse().unwrap(), "D", SymbolPosition::Back);
    let err = fx.registry.create(&fx.cache, bad.clone()).await.unwrap_err();
    assert_eq!(err.field(), Some("name"));

    bad.name = "Ddd".to_string();
    bad.exchange_rate = Some(dec!(-1));
    let err = fx.registry.create(&fx.cache, bad).await.unwrap_err();
    assert_eq!(err.field(), Some("exchange_rate"));
}

#[tokio::test]
async fn test_duplicate_code_rejected() {
    let (fx, ..) = abc().await;

    let dup = NewCoin::new("Other", "BBB".parse().unwrap(), "B", SymbolPosition::Back);
    let err = fx.registry.create(&fx.cache, dup).await.unwrap_err();

    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert_eq!(fx.store.len(), 3);
}

#[tokio::test]
async fn test_update_promotes_in_one_transaction() {
    let (fx, _a, b, _c) = abc().await;
    let commits = fx.store.stats().commits;

    let patch = CoinPatch::new().main(true).name("Bee");
    let updated = fx.registry.update(&fx.cache, b.id, patch).await.unwrap();

    assert!(updated.is_main);
    assert_eq!(updated.name, "Bee");
    assert_eq!(updated.exchange_rate, Decimal::ONE);
    assert_eq!(fx.coin("AAA").exchange_rate, dec!(0.5));
    assert_eq!(fx.coin("CCC").exchange_rate, dec!(0.25));
    assert_eq!(fx.store.stats().commits, commits + 1);
    assert_eq!(fx.registry.metrics().snapshot().main_switches, 1);
}

#[tokio::test]
async fn test_update_promotion_keeps_caller_history_and_journal() {
    let (fx, _a, b, _c) = abc().await;
    let imported = RateHistoryEntry {
        rate: dec!(1.9),
        recorded_at: Utc::now(),
        reason: RateChangeReason::Manual,
    };

    let patch = CoinPatch::new().main(true).history(vec![imported.clone()]);
    let updated = fx.registry.update(&fx.cache, b.id, patch).await.unwrap();

    let history = updated.rate_history.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], imported);
    assert_eq!(history[1].rate, dec!(2));
    assert_eq!(history[1].reason, RateChangeReason::Promoted);
    assert_eq!(fx.coin("BBB").rate_history.unwrap(), history);
}

#[tokio::test]
async fn test_update_cannot_unset_main() {
    let (fx, a, ..) = abc().await;

    let err = fx
        .registry
        .update(&fx.cache, a.id, CoinPatch::new().main(false))
        .await
        .unwrap_err();

    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert!(fx.coin("AAA").is_main);
}

#[tokio::test]
async fn test_update_cannot_change_main_rate() {
    let (fx, a, b, _c) = abc().await;

    let err = fx
        .registry
        .update(&fx.cache, a.id, CoinPatch::new().rate(dec!(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoinError::InvariantViolation { .. }));

    let err = fx
        .registry
        .update(&fx.cache, b.id, CoinPatch::new().main(true).rate(dec!(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert_eq!(fx.coin("BBB").exchange_rate, dec!(2));
}

#[tokio::test]
async fn test_update_manual_rate_is_journaled() {
    let (fx, _a, _b, c) = abc().await;

    let updated = fx
        .registry
        .update(&fx.cache, c.id, CoinPatch::new().rate(dec!(0.6)))
        .await
        .unwrap();

    assert_eq!(updated.exchange_rate, dec!(0.6));
    let history = updated.rate_history.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rate, dec!(0.5));
    assert_eq!(history[0].reason, RateChangeReason::Manual);
}

#[tokio::test]
async fn test_update_plain_fields() {
    let (fx, _a, _b, c) = abc().await;

    let patch = CoinPatch::new()
        .symbol("C$", SymbolPosition::Back)
        .active(false);
    let updated = fx.registry.update(&fx.cache, c.id, patch).await.unwrap();

    assert_eq!(updated.symbol, "C$");
    assert_eq!(updated.symbol_position, SymbolPosition::Back);
    assert!(!updated.active);
    assert!(updated.rate_history.is_none());
}

#[tokio::test]
async fn test_delete_guard() {
    let (fx, a, _b, c) = abc().await;

    let err = fx.registry.delete(&fx.cache, a.id, false).await.unwrap_err();
    assert!(matches!(err, CoinError::InvariantViolation { .. }));
    assert_eq!(fx.store.len(), 3);

    fx.registry.delete(&fx.cache, c.id, false).await.unwrap();
    assert_eq!(fx.store.len(), 2);

    fx.registry.delete(&fx.cache, a.id, true).await.unwrap();
    assert!(fx.mains().is_empty());
    assert!(fx.cache.main().await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_and_list() {
    let (fx, a, b, _c) = abc().await;
    fx.registry
        .update(&fx.cache, b.id, CoinPatch::new().active(false))
        .await
        .unwrap();

    assert_eq!(fx.registry.get(a.id).await.unwrap().short_code, a.short_code);

    let page = fx.registry.list(&ListQuery::new()).await.unwrap();
    let codes: Vec<_> = page.items.iter().map(|c| c.short_code.as_str()).collect();
    assert_eq!(codes, vec!["CCC", "BBB", "AAA"]);
    assert_eq!(page.total, 3);
    assert_eq!(page.per_page, 15);

    let active = fx.registry.list(&ListQuery::new().active(true)).await.unwrap();
    assert_eq!(active.total, 2);

    let main = fx.registry.list(&ListQuery::new().main(true)).await.unwrap();
    assert_eq!(main.items[0].id, a.id);

    let second = fx.registry.list(&ListQuery::new().page(2, 2)).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, a.id);
    assert_eq!(second.last_page, 2);
}

#[tokio::test]
async fn test_list_caps_page_size() {
    let store = Arc::new(MemoryCoinStore::new());
    let config = RegistryConfig {
        max_page_size: 2,
        default_page_size: 2,
        ..RegistryConfig::default()
    };
    let registry = CoinRegistry::with_config(store.clone(), config);
    let cache = CoinCache::new(store.clone());
    registry
        .create(&cache, NewCoin::new("Usd", ShortCode::usd(), "$", SymbolPosition::Front).main())
        .await
        .unwrap();

    let page = registry
        .list(&ListQuery::new().page(1, 1000))
        .await
        .unwrap();
    assert_eq!(page.per_page, 2);
}

/// Starting rates relative to AAA. Every ratio between them is a power
/// of two, so rescaling stays exact whatever order the switches commit in.
const START_RATES: [(&str, i64, u32); 4] = [("AAA", 1, 0), ("BBB", 2, 0), ("CCC", 5, 1), ("DDD", 4, 0)];

fn start_rate(code: &ShortCode) -> Decimal {
    START_RATES
        .iter()
        .find(|(c, ..)| *c == code.as_str())
        .map(|(_, n, scale)| Decimal::new(*n, *scale))
        .unwrap()
}

/// Exactly one main at rate 1, every other rate relative to it.
fn assert_main_relative(coins: &[Coin]) {
    let mains: Vec<_> = coins.iter().filter(|c| c.is_main).collect();
    assert_eq!(mains.len(), 1);
    assert_eq!(mains[0].exchange_rate, Decimal::ONE);

    let base = start_rate(&mains[0].short_code);
    for coin in coins {
        assert_eq!(coin.exchange_rate, start_rate(&coin.short_code) / base);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_switches_keep_single_main() {
    let fx = Fixture::new();
    let mut ids = Vec::new();
    for (i, (code, n, scale)) in START_RATES.iter().enumerate() {
        ids.push(fx.add(code, Decimal::new(*n, *scale), i == 0).await.id);
    }
    let codes: Vec<ShortCode> = START_RATES.iter().map(|(c, ..)| c.parse().unwrap()).collect();

    let store = fx.store.clone();
    let registry = Arc::new(fx.registry);
    let service = Arc::new(CurrencyService::default());

    let mut writers = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        let store = store.clone();
        let id = ids[i % ids.len()];
        writers.push(tokio::spawn(async move {
            let cache = CoinCache::new(store);
            registry.set_main(&cache, id).await
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let coins = store.list(&CoinFilter::default()).await.unwrap();
                assert_main_relative(&coins);
                tokio::task::yield_now().await;
            }
        }));
    }
    for _ in 0..4 {
        let store = store.clone();
        let service = service.clone();
        let codes = codes.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let context = CurrencyContext::new().with_header("DDD");
                let uow = UnitOfWork::new(store.clone(), context);
                uow.cache().warm(codes.clone()).await.unwrap();

                let mut coins = Vec::new();
                for code in &codes {
                    coins.push(uow.cache().by_code(code).await.unwrap().unwrap());
                }
                assert_main_relative(&coins);

                // Both sides come from the same snapshot, so the result
                // does not depend on which coin is main.
                assert_eq!(service.convert(&uow, 800, "AAA", "BBB").await, 1600);
                assert_eq!(service.convert(&uow, 800, "CCC", "DDD").await, 6400);
                assert_eq!(service.format_current(&uow, 150_000).await, "¤1,500.00");
                tokio::task::yield_now().await;
            }
        }));
    }

    for result in futures::future::join_all(writers).await {
        result.unwrap().unwrap();
    }
    for result in futures::future::join_all(readers).await {
        result.unwrap();
    }

    assert_main_relative(&store.snapshot());
}
