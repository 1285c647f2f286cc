//! Telemetry Pipeline (v1)
//!
//! Runs the monitoring pipeline as a standalone process.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                    MonitoringFacade                      │
//!   producers     │                                                          │
//!   ─────────────▶│  LoadShedder ─▶ AnomalyDetector ─▶ MetricAggregator ─▶   │
//!   metrics       │  (admission)    (z-score)          (windows)             │
//!                 │                     │                                    │
//!                 │                     ▼                                    │
//!   errors ──────▶│              AlertCorrelator            MetricBuffer     │
//!   alerts        │              (rules, feedback)          (sample, lz4)    │
//!                 │                                              │           │
//!   spans ───────▶│  Tracer ─▶ latency metric ─▶ (same path)     │           │
//!                 │                                              ▼           │
//!                 │            RetryHandler ─────────────────▶  Sink ────────┼──▶ backend
//!                 │                                                          │
//!                 │  ┌────────────────────────────────────────────────────┐  │
//!                 │  │  config │ lifecycle (scheduler, clock, signals)     │  │
//!                 │  │  observability (logs, self-metrics) │ resilience    │  │
//!                 │  └────────────────────────────────────────────────────┘  │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use telemetry_pipeline::config::loader::{load_config, ConfigError};
use telemetry_pipeline::config::PipelineConfig;
use telemetry_pipeline::lifecycle::{signals, Shutdown, SystemClock};
use telemetry_pipeline::load_shedding::SystemProbe;
use telemetry_pipeline::model::{HealthStatus, Metric};
use telemetry_pipeline::observability::{logging, metrics};
use telemetry_pipeline::{LogSink, MonitoringFacade};

#[derive(Parser)]
#[command(name = "telemetry-pipeline")]
#[command(about = "In-process telemetry pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline until SIGINT/SIGTERM
    Run {
        /// TOML config file; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Feed a synthetic workload through the pipeline
        #[arg(long)]
        synthetic: bool,
    },
    /// Check a config file and report every problem
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, synthetic } => {
            let config = match config {
                Some(path) => match load_config(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("{}: {}", path.display(), e);
                        return ExitCode::FAILURE;
                    }
                },
                None => PipelineConfig::default(),
            };
            run(config, synthetic).await;
            ExitCode::SUCCESS
        }
        Commands::Validate { config } => match load_config(&config) {
            Ok(_) => {
                println!("{}: ok", config.display());
                ExitCode::SUCCESS
            }
            Err(ConfigError::Validation(errors)) => {
                for error in &errors {
                    println!("{}: {}", config.display(), error);
                }
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("{}: {}", config.display(), e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(config: PipelineConfig, synthetic: bool) {
    logging::init_logging(&config.observability);

    tracing::info!("telemetry-pipeline v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        sampling_rate = config.buffer.sampling_rate,
        tracing_sampling_rate = config.tracing.sampling_rate,
        load_shedding = config.load_shedding.enabled,
        aggregations = config.aggregation.rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let facade = Arc::new(
        MonitoringFacade::new(config, Arc::new(LogSink::new()), Arc::new(SystemClock))
            .with_probe(Arc::new(SystemProbe::new())),
    );
    facade.start().await;
    facade
        .record_health("telemetry-pipeline", HealthStatus::Healthy, "started")
        .await;

    let shutdown = Shutdown::new();
    let workload = synthetic.then(|| tokio::spawn(synthetic_workload(facade.clone(), shutdown.clone())));

    signals::wait_for_signal().await;

    shutdown.trigger();
    if let Some(handle) = workload {
        let _ = handle.await;
    }
    facade.shutdown().await;

    tracing::info!("Shutdown complete");
}

/// Emits a steady request stream with occasional slow, failing operations.
async fn synthetic_workload(facade: Arc<MonitoringFacade>, shutdown: Shutdown) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let routes = ["/search", "/book", "/pay"];
    let mut tick: u64 = 0;

    tracing::info!("Synthetic workload started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick += 1;
                let route = routes[(tick % routes.len() as u64) as usize];

                let span = facade.start_operation("http_request").await;
                facade.annotate_operation(&span, "route", route);

                let latency = 20.0 + fastrand::f64() * 10.0 + if tick % 97 == 0 { 400.0 } else { 0.0 };
                facade
                    .record_metric(
                        Metric::new("request_latency", latency, now_ms())
                            .with_unit("ms")
                            .with_label("route", route)
                            .with_label("service", "api_gateway"),
                    )
                    .await;

                if tick % 53 == 0 {
                    facade.fail_operation(&span, "upstream timeout");
                    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timeout");
                    facade.record_error(&err, None).await;
                }
                facade.end_operation(&span).await;
            }
            _ = shutdown.wait() => {
                tracing::info!(ticks = tick, "Synthetic workload stopped");
                break;
            }
        }
    }
}

fn now_ms() -> u64 {
    use telemetry_pipeline::lifecycle::Clock;
    SystemClock.now_ms()
}
