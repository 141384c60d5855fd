//! Coinset Simulator
//!
//! Drives a simulated tenant's coin set through scripted scenarios or a
//! continuous stream of main switches and conversions.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinset_fx::FxConfig;
use coinset_registry::RegistryConfig;

mod controller;
mod metrics;
mod scenario;
mod tenant;

use controller::SimulationController;
use scenario::Scenario;

/// Coinset Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Coinset tenant currency simulation environment")]
struct Args {
    /// Number of coins to add next to the USD main coin
    #[arg(short, long, default_value = "4")]
    coins: usize,

    /// Scenario to run
    #[arg(short, long)]
    scenario: Option<String>,

    /// List the built-in scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Simulation speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Run duration in seconds (0 = infinite)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Print registry metrics in Prometheus text format on exit
    #[arg(long)]
    prometheus: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if args.list_scenarios {
        for name in Scenario::names() {
            println!("{name}");
        }
        return Ok(());
    }

    if args.speed <= 0.0 {
        anyhow::bail!("speed must be positive");
    }

    let registry_config = RegistryConfig::from_env();
    registry_config.validate().map_err(anyhow::Error::msg)?;
    let fx_config = FxConfig::from_env();
    fx_config.validate().map_err(anyhow::Error::msg)?;

    info!("Starting Coinset Simulator");
    info!("Coins: {}", args.coins);
    info!("Speed: {}x", args.speed);

    let controller = SimulationController::new(
        args.coins,
        args.speed,
        args.seed,
        registry_config,
        fx_config,
    );

    controller.initialize().await?;

    info!("Simulator initialized with {} coins", args.coins + 1);

    if let Some(scenario_name) = &args.scenario {
        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        info!("Running in continuous mode");
        info!("Press Ctrl+C to stop");

        let duration = if args.duration > 0 {
            Some(std::time::Duration::from_secs(args.duration))
        } else {
            None
        };

        controller.run(duration).await?;
    }

    // Print metrics
    let metrics = controller.get_metrics().await;
    info!("Simulation complete");
    info!("Writes committed: {}", metrics.writes_committed);
    info!("Writes failed: {}", metrics.writes_failed);
    info!("Reads: {}", metrics.reads);
    info!("Assertions passed: {}", metrics.assertions_passed);
    info!("Torn snapshots: {}", metrics.torn_snapshots);
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!("Average write latency: {}us", metrics.average_latency_us());
    info!("P99 write latency: {}us", metrics.p99_latency_us());

    if args.prometheus {
        print!("{}", controller.registry().metrics().to_prometheus());
    }

    Ok(())
}
