//! Integration tests for resolution, conversion and formatting.

use std::sync::Arc;

use rust_decimal_macros::dec;
use serde_json::json;

use coinset_common::{CoinPatch, NewCoin, ShortCode, SymbolPosition};
use coinset_fx::capabilities::{StaticValue, AVAILABLE_COINS, BASE_COIN, CURRENT_COIN};
use coinset_fx::{
    CandidateSource, CapabilityRegistry, CurrencyContext, CurrencyResolver, CurrencyService,
    FxConfig, FxError, UnitOfWork,
};
use coinset_store::{CoinCache, CoinStore, CoinTransaction, MemoryCoinStore};

fn code(s: &str) -> ShortCode {
    s.parse().unwrap()
}

/// JPY main; EUR and USD active; GBP inactive.
async fn tenant() -> Arc<MemoryCoinStore> {
    let store = Arc::new(MemoryCoinStore::new());
    let mut tx = store.begin().await.unwrap();
    tx.insert(NewCoin::new("Yen", code("JPY"), "¥", SymbolPosition::Front).main())
        .await
        .unwrap();
    tx.insert(NewCoin::new("Euro", code("EUR"), "€", SymbolPosition::Back).rate(dec!(0.0062)))
        .await
        .unwrap();
    tx.insert(NewCoin::new("US Dollar", code("USD"), "$", SymbolPosition::Front).rate(dec!(0.0067)))
        .await
        .unwrap();
    tx.insert(
        NewCoin::new("Pound", code("GBP"), "£", SymbolPosition::Front)
            .rate(dec!(0.0053))
            .inactive(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    store
}

/// USD main at 1, EUR at 0.92.
async fn usd_eur() -> Arc<MemoryCoinStore> {
    let store = Arc::new(MemoryCoinStore::new());
    let mut tx = store.begin().await.unwrap();
    tx.insert(NewCoin::new("US Dollar", ShortCode::usd(), "$", SymbolPosition::Front).main())
        .await
        .unwrap();
    tx.insert(NewCoin::new("Euro", ShortCode::eur(), "€", SymbolPosition::Back).rate(dec!(0.92)))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    store
}

fn resolver() -> CurrencyResolver {
    CurrencyResolver::new(&FxConfig::default())
}

// =============================================================================
// Resolver
// =============================================================================

#[tokio::test]
async fn test_header_wins() {
    let store = tenant().await;
    let cache = CoinCache::new(store.clone());
    let context = CurrencyContext::new()
        .with_header("EUR")
        .with_param("GBP")
        .with_stored("USD");

    let resolution = resolver().resolve(&cache, &context).await;

    assert_eq!(resolution.code, code("EUR"));
    assert_eq!(resolution.source, CandidateSource::Header);
}

#[tokio::test]
async fn test_inactive_param_falls_through_to_stored() {
    let store = tenant().await;
    let cache = CoinCache::new(store.clone());
    let context = CurrencyContext::new().with_param("GBP").with_stored("USD");

    let resolution = resolver().resolve(&cache, &context).await;

    assert_eq!(resolution.code, code("USD"));
    assert_eq!(resolution.source, CandidateSource::Stored);
}

#[tokio::test]
async fn test_nothing_valid_falls_back_to_main() {
    let store = tenant().await;
    let cache = CoinCache::new(store.clone());
    let context = CurrencyContext::new()
        .with_header("XXX")
        .with_param("not a code")
        .with_stored("GBP");

    let resolution = resolver().resolve(&cache, &context).await;

    assert_eq!(resolution.code, code("JPY"));
    assert_eq!(resolution.source, CandidateSource::Main);
}

#[tokio::test]
async fn test_override_beats_header() {
    let store = tenant().await;
    let cache = CoinCache::new(store.clone());
    let context = CurrencyContext::new().with_override("usd").with_header("EUR");

    let resolution = resolver().resolve(&cache, &context).await;

    assert_eq!(resolution.code, code("USD"));
    assert_eq!(resolution.source, CandidateSource::Override);
}

#[tokio::test]
async fn test_empty_set_uses_configured_fallback() {
    let store = Arc::new(MemoryCoinStore::new());
    let cache = CoinCache::new(store);
    let config = FxConfig {
        fallback_currency: code("CHF"),
        ..FxConfig::default()
    };

    let resolution = CurrencyResolver::new(&config)
        .resolve(&cache, &CurrencyContext::new().with_header("EUR"))
        .await;

    assert_eq!(resolution.code, code("CHF"));
    assert_eq!(resolution.source, CandidateSource::Fallback);
}

#[tokio::test]
async fn test_resolve_codes() {
    let store = tenant().await;
    let cache = CoinCache::new(store.clone());

    let resolved = resolver()
        .resolve_codes(&cache, &[None, Some("GBP"), Some("EUR")])
        .await;
    assert_eq!(resolved, code("EUR"));

    let resolved = resolver().resolve_codes(&cache, &[None, None]).await;
    assert_eq!(resolved, code("JPY"));
}

#[tokio::test]
async fn test_candidates_are_read_in_one_batch() {
    let store = tenant().await;
    let cache = CoinCache::new(store.clone());
    let context = CurrencyContext::new()
        .with_header("XXX")
        .with_param("GBP")
        .with_stored("USD");

    resolver().resolve(&cache, &context).await;

    let stats = store.stats();
    assert_eq!(stats.reads_many, 1);
    assert_eq!(stats.reads_by_code, 0);
}

// =============================================================================
// Unit of work
// =============================================================================

#[tokio::test]
async fn test_resolution_is_memoized_per_unit_of_work() {
    let store = tenant().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store.clone(), CurrencyContext::new().with_header("EUR"));

    assert_eq!(service.current(&uow).await, code("EUR"));

    // EUR is deactivated mid-operation.
    let eur = store.get_by_code(&code("EUR")).await.unwrap().unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.update_fields(eur.id, &CoinPatch::new().active(false))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    uow.cache().invalidate();

    assert_eq!(service.current(&uow).await, code("EUR"));

    let next = UnitOfWork::new(store.clone(), CurrencyContext::new().with_header("EUR"));
    assert_eq!(service.current(&next).await, code("JPY"));
}

#[tokio::test]
async fn test_resolution_and_stats_serialize() {
    let store = tenant().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store.clone(), CurrencyContext::new().with_param("usd"));

    let resolution = uow.currency(service.resolver()).await;
    assert_eq!(
        serde_json::to_value(resolution).unwrap(),
        json!({ "code": "USD", "source": "param" })
    );

    service.convert(&uow, 100, "USD", "XYZ").await;
    assert_eq!(
        serde_json::to_value(service.stats()).unwrap(),
        json!({ "conversions": 1, "degraded_lookups": 1 })
    );
}

#[tokio::test]
async fn test_preference_to_persist() {
    let store = tenant().await;
    let service = CurrencyService::default();

    let uow = UnitOfWork::new(store.clone(), CurrencyContext::new().with_param("usd"));
    assert!(uow.preference_to_persist().is_none());
    service.current(&uow).await;
    assert_eq!(uow.preference_to_persist(), Some(&code("USD")));

    let uow = UnitOfWork::new(store.clone(), CurrencyContext::new().with_stored("USD"));
    service.current(&uow).await;
    assert!(uow.preference_to_persist().is_none());
}

// =============================================================================
// Conversion and formatting
// =============================================================================

#[tokio::test]
async fn test_convert() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new());

    assert_eq!(service.convert(&uow, 1000, "USD", "EUR").await, 920);
    assert_eq!(service.convert(&uow, 920, "EUR", "USD").await, 1000);
    assert_eq!(service.convert(&uow, 1234, "EUR", "EUR").await, 1234);
}

#[tokio::test]
async fn test_convert_unknown_code_degrades() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new());

    assert_eq!(service.convert(&uow, 1000, "XYZ", "EUR").await, 920);
    assert_eq!(service.convert(&uow, 1000, "EUR", "XYZ").await, 1087);
    assert_eq!(service.convert(&uow, 777, "XYZ", "XYZ").await, 777);
    assert!(service.stats().degraded_lookups >= 2);
}

#[tokio::test]
async fn test_convert_amount_defaults() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new().with_header("EUR"));

    assert_eq!(service.convert_amount(&uow, 1000, None, None).await, 920);
    assert_eq!(service.convert_amount(&uow, 920, Some("EUR"), Some("USD")).await, 1000);
    assert_eq!(service.convert_amount(&uow, 1000, None, Some("USD")).await, 1000);
}

#[tokio::test]
async fn test_convert_amount_without_main() {
    let store = Arc::new(MemoryCoinStore::new());
    let mut tx = store.begin().await.unwrap();
    tx.insert(NewCoin::new("Euro", ShortCode::eur(), "€", SymbolPosition::Back).rate(dec!(2)))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new());

    assert_eq!(service.convert_amount(&uow, 1000, None, Some("EUR")).await, 2000);
}

#[tokio::test]
async fn test_format_positions() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new());

    assert_eq!(service.format(&uow, 150_000, "USD").await, "$1,500.00");
    assert_eq!(service.format(&uow, 150_000, "EUR").await, "1,500.00€");
    assert_eq!(service.format(&uow, 150_000, "XYZ").await, "XYZ 1,500.00");
}

#[tokio::test]
async fn test_format_current() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new().with_header("EUR"));

    assert_eq!(service.format_current(&uow, 99).await, "0.99€");
}

#[tokio::test]
async fn test_display_reads_each_code_once() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store.clone(), CurrencyContext::new());

    for _ in 0..10 {
        service.convert(&uow, 100, "USD", "EUR").await;
        service.format(&uow, 100, "EUR").await;
    }

    assert_eq!(store.stats().reads_by_code, 2);
}

#[tokio::test]
async fn test_current_metadata_falls_back_to_main() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store.clone(), CurrencyContext::new().with_header("EUR"));

    let meta = service.current_metadata(&uow).await.unwrap();
    assert_eq!(meta.short_code, ShortCode::eur());
    assert_eq!(meta.exchange_rate, dec!(0.92));

    // EUR disappears after resolution.
    let eur = store.get_by_code(&ShortCode::eur()).await.unwrap().unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.delete(eur.id).await.unwrap();
    tx.commit().await.unwrap();
    uow.cache().invalidate();

    let meta = service.current_metadata(&uow).await.unwrap();
    assert_eq!(meta.short_code, ShortCode::usd());
}

// =============================================================================
// Capabilities
// =============================================================================

#[tokio::test]
async fn test_coin_capabilities() {
    let store = usd_eur().await;
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new().with_header("EUR"));
    let registry = CapabilityRegistry::with_coin_capabilities().unwrap();

    let values = registry.resolve(&service, &uow).await.unwrap();

    assert_eq!(values[BASE_COIN]["short_code"], json!("USD"));
    assert_eq!(values[CURRENT_COIN]["short_code"], json!("EUR"));
    assert_eq!(values[CURRENT_COIN]["position"], json!("back"));
    assert_eq!(values[AVAILABLE_COINS].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_capability_order_and_duplicates() {
    let mut registry = CapabilityRegistry::with_coin_capabilities().unwrap();
    registry
        .register("locale", 0, Arc::new(StaticValue(json!("en"))))
        .unwrap();

    assert_eq!(
        registry.keys(),
        vec!["locale", BASE_COIN, CURRENT_COIN, AVAILABLE_COINS]
    );

    let err = registry
        .register(BASE_COIN, 99, Arc::new(StaticValue(json!(null))))
        .unwrap_err();
    assert!(matches!(err, FxError::DuplicateCapability(_)));
}

#[tokio::test]
async fn test_base_coin_absent_without_main() {
    let store = Arc::new(MemoryCoinStore::new());
    let service = CurrencyService::default();
    let uow = UnitOfWork::new(store, CurrencyContext::new());
    let registry = CapabilityRegistry::with_coin_capabilities().unwrap();

    let values = registry.resolve(&service, &uow).await.unwrap();

    assert!(!values.contains_key(BASE_COIN));
    assert!(!values.contains_key(CURRENT_COIN));
    assert_eq!(values[AVAILABLE_COINS], json!([]));
}
