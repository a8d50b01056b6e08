//! mskpipe - MSK to OpenSearch bridge
//!
//! Main entry point: initializes tracing and metrics, then dispatches to the
//! producer or consumer command.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mskpipe::cli::{Cli, Commands};
use mskpipe::commands;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing and the (optional) metrics exporter
    init_tracing(cli.verbose);
    init_metrics_exporter();

    // Execute command
    match cli.command {
        Commands::Produce { listen } => {
            tracing::info!("starting producer");
            commands::produce::run_produce(listen).await
        }
        Commands::Consume => {
            tracing::info!("starting consumer");
            commands::consume::run_consume().await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "mskpipe=debug" } else { "mskpipe=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initializes the Prometheus metrics exporter.
///
/// Only has an effect when compiled with the `prometheus` feature; otherwise
/// it is a no-op that is still safe to call.
fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}
