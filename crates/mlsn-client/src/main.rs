//! Client binary

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mlsn_client::{ClientApp, ClientConfig, KalmanConfig};
use mlsn_core::ClientId;

#[derive(Parser, Debug)]
#[command(name = "mlsn-client", about = "Tracking client for the sensor network")]
struct Args {
    /// Client id
    #[arg(long, default_value_t = 1)]
    client_id: i32,

    /// Network service address
    #[arg(long, default_value = "127.0.0.1:7700")]
    network_addr: String,

    /// Estimate request frequency, in Hz
    #[arg(long, default_value_t = 15.0)]
    frequency: f64,

    /// CSV file for the predicted trajectory
    #[arg(long, default_value = "trajectory.csv")]
    output: PathBuf,

    /// White-noise acceleration density for the tracker, per axis
    #[arg(long, default_value_t = 2.0)]
    process_noise: f64,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = ClientConfig {
        client_id: ClientId::new(args.client_id),
        frequency: args.frequency,
        kalman: KalmanConfig {
            noise_ax: args.process_noise,
            noise_ay: args.process_noise,
            noise_az: args.process_noise,
            ..Default::default()
        },
    };

    let mut app = ClientApp::connect(&args.network_addr, &args.output, config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    app.run(shutdown_rx).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
