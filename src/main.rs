//! multiport-status entry point.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use multiport_status::api::{AppState, ListenerRole};
use multiport_status::collector::{self, MetricsCollector};
use multiport_status::config::Config;
use multiport_status::heap::TrackingAllocator;
use multiport_status::server;
use multiport_status::telemetry;
use multiport_status::utils::start_shutdown_signal_monitor;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

/// Health, version, and metrics on three independent listeners.
#[derive(Parser, Debug)]
#[command(name = "multiport-status")]
#[command(about = "Serve health, version, and host metrics on three independent ports")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override GATEWAY_PORT.
    #[arg(long, global = true)]
    gateway_port: Option<u16>,

    /// Override METRICS_PORT.
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    /// Override ADMIN_PORT.
    #[arg(long, global = true)]
    admin_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the three listeners (default).
    Serve,

    /// Check configuration validity.
    CheckConfig,

    /// Collect one metrics snapshot and print it as JSON.
    Snapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    collector::mark_process_start();

    // Parse CLI arguments
    let args = Args::parse();

    // .env has to be applied before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("multiport_status=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(port) = args.gateway_port {
        config.gateway_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
    if let Some(port) = args.admin_port {
        config.admin_port = port;
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(&config),
        Some(Command::Snapshot) => cmd_snapshot(),
        Some(Command::Serve) | None => cmd_serve(config).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("MULTIPORT STATUS - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    for role in ListenerRole::ALL {
        let spec = role.spec();
        println!(
            "  {:<8} {}:{}  version={} metrics={}",
            role,
            config.bind_host,
            config.port_for(role),
            spec.version_enabled,
            spec.metrics_enabled
        );
    }
    println!("  Shutdown timeout: {}s", config.shutdown_timeout_secs);
    println!(
        "  Prometheus: {}",
        if config.prometheus_enabled { "Enabled" } else { "Disabled" }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Collect one snapshot and print it.
fn cmd_snapshot() -> anyhow::Result<()> {
    let snapshot = MetricsCollector::live().collect()?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Run the three listeners until SIGTERM/SIGINT.
async fn cmd_serve(config: Config) -> anyhow::Result<()> {
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    let prometheus = if config.prometheus_enabled {
        telemetry::install_prometheus()
    } else {
        None
    };
    telemetry::init_metrics();

    let token = CancellationToken::new();
    start_shutdown_signal_monitor(token.clone());

    let collector = MetricsCollector::live();
    let make_state = |role| {
        AppState::with_collector(role, collector.clone()).with_prometheus(prometheus.clone())
    };

    let report = server::run(&config, make_state, token).await.map_err(|e| {
        error!("{}", e);
        e
    })?;

    if !report.is_clean() {
        warn!(
            "shutdown incomplete: failed={:?} timed_out={:?}",
            report.failed, report.timed_out
        );
        return Err(anyhow::anyhow!("listeners did not shut down cleanly"));
    }

    info!("All listeners closed");
    Ok(())
}
