//! Simulation controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use coinset_common::{Coin, CoinId, CoinPatch, NewCoin, ShortCode, SymbolPosition};
use coinset_fx::{CurrencyContext, CurrencyService, FxConfig, UnitOfWork};
use coinset_registry::{seed_main_coin, CoinRegistry, PresetCurrency, RegistryConfig};
use coinset_store::{CoinCache, CoinStore, MemoryCoinStore};

use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, FaultType, Scenario, ScenarioStep};
use crate::tenant::CoinRoster;

/// Reader rounds per reader task in a concurrent step.
const READER_ROUNDS: usize = 25;

/// Controls the simulation.
pub struct SimulationController {
    /// Number of non-main coins to seed.
    coin_count: usize,
    /// Simulation speed multiplier.
    speed: f64,
    store: Arc<MemoryCoinStore>,
    registry: Arc<CoinRegistry>,
    service: Arc<CurrencyService>,
    /// Random number generator.
    rng: Arc<RwLock<StdRng>>,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Outcome of the most recent write step.
    last_write_failed: AtomicBool,
    /// Running flag.
    running: Arc<RwLock<bool>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(
        coin_count: usize,
        speed: f64,
        seed: Option<u64>,
        registry_config: RegistryConfig,
        fx_config: FxConfig,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let store = Arc::new(MemoryCoinStore::new());
        let registry = CoinRegistry::with_config(store.clone(), registry_config);

        Self {
            coin_count,
            speed,
            registry: Arc::new(registry),
            service: Arc::new(CurrencyService::new(fx_config)),
            store,
            rng: Arc::new(RwLock::new(rng)),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            last_write_failed: AtomicBool::new(false),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn registry(&self) -> &CoinRegistry {
        &self.registry
    }

    /// Seed the tenant: USD as main, then the roster.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        info!("Initializing tenant with {} extra coins", self.coin_count);

        let cache = self.cache();
        let main = seed_main_coin(&self.registry, &cache, PresetCurrency::Usd).await?;
        info!("Seeded main coin {}", main.short_code);

        for new in CoinRoster::coins(self.coin_count)? {
            let coin = self.registry.create(&cache, new).await?;
            info!("Added coin {} at rate {}", coin.short_code, coin.exchange_rate);
        }

        Ok(())
    }

    /// Run a scenario.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        *self.running.write().await = true;

        for (i, step) in scenario.steps.iter().enumerate() {
            if !*self.running.read().await {
                break;
            }

            self.execute_step(step)
                .await
                .with_context(|| format!("step {} of {} failed", i + 1, scenario.name))?;
        }

        *self.running.write().await = false;

        Ok(())
    }

    /// Run in continuous mode: random main switches interleaved with
    /// conversions, checking the coin set after every operation.
    pub async fn run(&self, duration: Option<Duration>) -> anyhow::Result<()> {
        info!("Running simulation in continuous mode");

        *self.running.write().await = true;

        let store = self.store.clone();
        let registry = self.registry.clone();
        let service = self.service.clone();
        let metrics = self.metrics.clone();
        let rng = self.rng.clone();
        let running = self.running.clone();
        let speed = self.speed;

        let handle = tokio::spawn(async move {
            loop {
                if !*running.read().await {
                    break;
                }

                let coins = store.snapshot();
                if coins.is_empty() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }

                let (switch, pick, amount) = {
                    let mut rng_guard = rng.write().await;
                    (
                        rng_guard.gen_bool(0.3),
                        rng_guard.gen_range(0..coins.len()),
                        rng_guard.gen_range(1..10_000_000i64),
                    )
                };
                let coin = &coins[pick];

                if switch {
                    let cache = CoinCache::new(store.clone());
                    let started = Instant::now();
                    match registry.set_main(&cache, coin.id).await {
                        Ok(_) => metrics.write().await.record_write(elapsed_us(started)),
                        Err(err) => {
                            warn!("Switch to {} failed: {}", coin.short_code, err);
                            metrics.write().await.record_failure();
                        }
                    }
                } else {
                    let context = CurrencyContext::new().with_header(coin.short_code.as_str());
                    let uow = UnitOfWork::new(store.clone(), context);
                    let converted = service.convert_amount(&uow, amount, None, None).await;
                    info!(
                        "{} -> {}",
                        amount,
                        service.format_current(&uow, converted).await
                    );
                    metrics.write().await.record_reads(2);
                }

                if !is_consistent(&store.snapshot()) {
                    metrics.write().await.record_torn_snapshot();
                }

                // Wait based on speed
                let delay = Duration::from_millis((1000.0 / speed) as u64);
                tokio::time::sleep(delay).await;
            }
        });

        // Wait for duration or Ctrl+C
        match duration {
            Some(d) => {
                tokio::time::sleep(d).await;
            }
            None => {
                tokio::signal::ctrl_c().await?;
            }
        }

        *self.running.write().await = false;
        handle.await?;

        Ok(())
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::CreateCoin {
                code,
                name,
                symbol,
                back,
                rate,
                main,
            } => {
                info!("Creating coin {} at rate {}", code, rate);
                let position = if *back {
                    SymbolPosition::Back
                } else {
                    SymbolPosition::Front
                };
                let mut new = NewCoin::new(name.as_str(), parse_code(code)?, symbol.as_str(), position)
                    .rate(parse_rate(rate)?);
                if *main {
                    new = new.main();
                }

                let started = Instant::now();
                let result = self.registry.create(&self.cache(), new).await;
                self.record(started, result).await;
            }
            ScenarioStep::SetMain { code } => {
                info!("Setting main coin to {}", code);
                let id = self.coin_id(code).await?;
                let started = Instant::now();
                let result = self.registry.set_main(&self.cache(), id).await;
                self.record(started, result).await;
            }
            ScenarioStep::UpdateRate { code, rate } => {
                info!("Updating rate of {} to {}", code, rate);
                let id = self.coin_id(code).await?;
                let patch = CoinPatch::new().rate(parse_rate(rate)?);
                let started = Instant::now();
                let result = self.registry.update(&self.cache(), id, patch).await;
                self.record(started, result).await;
            }
            ScenarioStep::Deactivate { code } => {
                info!("Deactivating {}", code);
                let id = self.coin_id(code).await?;
                let patch = CoinPatch::new().active(false);
                let started = Instant::now();
                let result = self.registry.update(&self.cache(), id, patch).await;
                self.record(started, result).await;
            }
            ScenarioStep::Delete { code, force } => {
                info!("Deleting {} (force: {})", code, force);
                let id = self.coin_id(code).await?;
                let started = Instant::now();
                let result = self.registry.delete(&self.cache(), id, *force).await;
                self.record(started, result).await;
            }
            ScenarioStep::InjectFault { fault_type } => {
                info!("Injecting fault {:?}", fault_type);
                match fault_type {
                    FaultType::CommitFailure => self.store.fail_next_commit(),
                }
            }
            ScenarioStep::Concurrent { switches, readers } => {
                self.run_concurrent(*switches, *readers).await?;
            }
            ScenarioStep::Assert { condition } => {
                info!("Asserting condition: {:?}", condition);
                self.check(condition).await?;
                self.metrics.write().await.record_assertion();
            }
        }

        Ok(())
    }

    async fn check(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::SingleMain => {
                if !is_consistent(&self.store.snapshot()) {
                    bail!("expected exactly one main coin at rate 1");
                }
            }
            AssertCondition::MainIs { code } => {
                let main = self.store.get_main().await?.context("no main coin")?;
                if main.short_code != parse_code(code)? {
                    bail!("expected main {}, found {}", code, main.short_code);
                }
            }
            AssertCondition::NoMain => {
                if let Some(main) = self.store.get_main().await? {
                    bail!("expected no main coin, found {}", main.short_code);
                }
            }
            AssertCondition::RateEquals { code, rate } => {
                let coin = self.coin(code).await?;
                let expected = parse_rate(rate)?;
                if coin.exchange_rate != expected {
                    bail!("expected {} at {}, found {}", code, expected, coin.exchange_rate);
                }
            }
            AssertCondition::LastWriteFailed => {
                if !self.last_write_failed.load(Ordering::SeqCst) {
                    bail!("expected the last write to fail");
                }
            }
            AssertCondition::ConvertEquals {
                amount,
                from,
                to,
                expected,
            } => {
                let uow = UnitOfWork::new(self.store.clone(), CurrencyContext::new());
                let converted = self.service.convert(&uow, *amount, from, to).await;
                if converted != *expected {
                    bail!("{} {} -> {}: expected {}, got {}", amount, from, to, expected, converted);
                }
            }
            AssertCondition::FormatEquals {
                amount,
                code,
                expected,
            } => {
                let uow = UnitOfWork::new(self.store.clone(), CurrencyContext::new());
                let formatted = self.service.format(&uow, *amount, code).await;
                if formatted != *expected {
                    bail!("expected {:?}, got {:?}", expected, formatted);
                }
            }
            AssertCondition::ResolvesTo {
                header,
                param,
                stored,
                expected,
            } => {
                let context = CurrencyContext {
                    override_code: None,
                    header: header.clone(),
                    param: param.clone(),
                    stored: stored.clone(),
                };
                let uow = UnitOfWork::new(self.store.clone(), context);
                let resolved = self.service.current(&uow).await;
                if resolved != parse_code(expected)? {
                    bail!("expected {} to resolve, got {}", expected, resolved);
                }
            }
        }

        Ok(())
    }

    /// Race `switches` main switches against `readers` reader tasks.
    async fn run_concurrent(&self, switches: usize, readers: usize) -> anyhow::Result<()> {
        info!("Running {} switches against {} readers", switches, readers);

        let coins = self.store.snapshot();
        if coins.is_empty() {
            bail!("no coins to switch between");
        }

        let picks: Vec<CoinId> = {
            let mut rng = self.rng.write().await;
            (0..switches)
                .map(|_| coins[rng.gen_range(0..coins.len())].id)
                .collect()
        };

        let writers: Vec<_> = picks
            .into_iter()
            .map(|id| {
                let store = self.store.clone();
                let registry = self.registry.clone();
                tokio::spawn(async move {
                    let cache = CoinCache::new(store);
                    let started = Instant::now();
                    let result = registry.set_main(&cache, id).await;
                    (elapsed_us(started), result)
                })
            })
            .collect();

        let reader_tasks: Vec<_> = (0..readers)
            .map(|i| {
                let store = self.store.clone();
                let service = self.service.clone();
                let code = coins[i % coins.len()].short_code.to_string();
                tokio::spawn(async move {
                    let mut reads = 0u64;
                    let mut torn = 0u64;
                    for round in 0..READER_ROUNDS {
                        if !is_consistent(&store.snapshot()) {
                            torn += 1;
                        }
                        let context = CurrencyContext::new().with_header(code.as_str());
                        let uow = UnitOfWork::new(store.clone(), context);
                        let amount = 10_000 + round as i64;
                        let converted = service.convert_amount(&uow, amount, None, None).await;
                        service.format_current(&uow, converted).await;
                        reads += 2;
                        tokio::task::yield_now().await;
                    }
                    (reads, torn)
                })
            })
            .collect();

        let write_results = futures::future::join_all(writers).await;
        let read_results = futures::future::join_all(reader_tasks).await;

        let mut metrics = self.metrics.write().await;
        for joined in write_results {
            match joined? {
                (latency, Ok(_)) => metrics.record_write(latency),
                (_, Err(err)) => {
                    warn!("Concurrent switch failed: {}", err);
                    metrics.record_failure();
                }
            }
        }

        let mut torn_total = 0;
        for joined in read_results {
            let (reads, torn) = joined?;
            metrics.record_reads(reads);
            for _ in 0..torn {
                metrics.record_torn_snapshot();
            }
            torn_total += torn;
        }

        if torn_total > 0 {
            bail!("readers saw {} torn coin sets", torn_total);
        }
        Ok(())
    }

    /// A fresh cache for one unit of work.
    fn cache(&self) -> CoinCache {
        CoinCache::new(self.store.clone())
    }

    async fn coin(&self, code: &str) -> anyhow::Result<Coin> {
        self.store
            .get_by_code(&parse_code(code)?)
            .await?
            .with_context(|| format!("unknown coin {code}"))
    }

    async fn coin_id(&self, code: &str) -> anyhow::Result<CoinId> {
        Ok(self.coin(code).await?.id)
    }

    async fn record<T>(&self, started: Instant, result: coinset_common::Result<T>) {
        let mut metrics = self.metrics.write().await;
        match result {
            Ok(_) => {
                self.last_write_failed.store(false, Ordering::SeqCst);
                metrics.record_write(elapsed_us(started));
            }
            Err(err) => {
                warn!("Write rejected ({}): {}", err.error_code(), err);
                self.last_write_failed.store(true, Ordering::SeqCst);
                metrics.record_failure();
            }
        }
    }

    /// Get simulation metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }
}

/// Exactly one main coin, at rate 1.
fn is_consistent(coins: &[Coin]) -> bool {
    let mut mains = coins.iter().filter(|c| c.is_main);
    match (mains.next(), mains.next()) {
        (Some(main), None) => main.exchange_rate == Decimal::ONE,
        _ => false,
    }
}

fn parse_code(code: &str) -> anyhow::Result<ShortCode> {
    ShortCode::parse(code).with_context(|| format!("invalid coin code {code:?}"))
}

fn parse_rate(rate: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str_exact(rate).with_context(|| format!("invalid rate {rate:?}"))
}

fn elapsed_us(started: Instant) -> u64 {
    started.elapsed().as_micros() as u64
}
