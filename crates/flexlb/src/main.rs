use clap::{Parser, Subcommand};
use flexlb_client::{ApiClient, ClientConfig};
use flexlb_detector::{DetectorConfig, PatternDetector};
use flexlb_scheduler::{
    GreedyPlacer, PlacementLoop, PlacementLoopConfig, Placer, RefinePlacer,
    GREEDY_SCHEDULER_NAME, REFINE_SCHEDULER_NAME,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "flexlb", about = "Adaptive workload placement control plane")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the GreedyLB placer (fast greedy placement)
    Greedy {
        /// Declared-scheduler name this placer claims
        #[arg(long, default_value = GREEDY_SCHEDULER_NAME)]
        scheduler_name: String,
    },
    /// Run the RefineLB placer (balance-aware placement)
    Refine {
        /// Declared-scheduler name this placer claims
        #[arg(long, default_value = REFINE_SCHEDULER_NAME)]
        scheduler_name: String,
    },
    /// Run the workload pattern detector
    Detect {
        /// Seconds between monitoring iterations
        #[arg(long, default_value_t = 10)]
        monitor_interval: u64,
        /// Number of pod-count samples kept
        #[arg(long, default_value_t = 6)]
        history_window: usize,
        /// Growth-rate threshold below which the pattern is stable (%)
        #[arg(long, default_value_t = 10.0)]
        stable_threshold: f64,
        /// Growth-rate threshold below which the pattern is linear (%)
        #[arg(long, default_value_t = 30.0)]
        linear_threshold: f64,
        /// Scheduler name of the greedy placer
        #[arg(long, default_value = GREEDY_SCHEDULER_NAME)]
        greedy_name: String,
        /// Scheduler name of the refined placer
        #[arg(long, default_value = REFINE_SCHEDULER_NAME)]
        refine_name: String,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Greedy { scheduler_name } => {
            run_placer(GreedyPlacer::new(scheduler_name)).await
        }
        Commands::Refine { scheduler_name } => {
            run_placer(RefinePlacer::new(scheduler_name)).await
        }
        Commands::Detect {
            monitor_interval,
            history_window,
            stable_threshold,
            linear_threshold,
            greedy_name,
            refine_name,
        } => {
            run_detector(DetectorConfig {
                monitor_interval: Duration::from_secs(monitor_interval),
                history_window,
                stable_threshold,
                linear_threshold,
                greedy_scheduler: greedy_name,
                refine_scheduler: refine_name,
            })
            .await
        }
    }
}

/// Wait for either SIGINT (ctrl-c) or SIGTERM, returning which one fired.
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

/// Discover the orchestrator configuration and build a client.
///
/// A missing configuration is fatal; the process exits non-zero.
fn build_client() -> miette::Result<ApiClient> {
    let config = ClientConfig::discover().map_err(|e| miette::Report::new(e))?;
    let client = ApiClient::from_config(&config).map_err(|e| miette::Report::new(e))?;
    info!("Connected to orchestrator at {}", client.base_url());
    Ok(client)
}

/// Run one placement loop until interrupted
async fn run_placer<P: Placer + 'static>(placer: P) -> miette::Result<()> {
    info!("Starting placer for schedulerName={}", placer.name());

    let client = build_client()?;
    let placement_loop = PlacementLoop::new(client, placer, PlacementLoopConfig::default());

    let token = CancellationToken::new();
    let loop_token = token.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = placement_loop.run(loop_token).await {
            error!("Placement loop error: {}", e);
        }
    });

    let sig = shutdown_signal().await;
    info!("Received {}, shutting down gracefully...", sig);
    token.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    info!("Shutdown complete");

    Ok(())
}

/// Run the pattern detector until interrupted
async fn run_detector(config: DetectorConfig) -> miette::Result<()> {
    info!("Starting adaptive workload pattern detection");

    let client = build_client()?;
    let mut detector = PatternDetector::new(client, config);

    let token = CancellationToken::new();
    let detector_token = token.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = detector.run(detector_token).await {
            error!("Pattern detector error: {}", e);
        }
    });

    let sig = shutdown_signal().await;
    info!("Received {}, shutting down gracefully...", sig);
    token.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    info!("Shutdown complete");

    Ok(())
}
