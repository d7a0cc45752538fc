//! Sensor node binary

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mlsn_core::{NodeId, Position};
use mlsn_node::{register_with_network, run_sensor_loop, NodeRouter, SensorCell, SensorConfig};

#[derive(Parser, Debug)]
#[command(name = "mlsn-node", about = "Multilateration sensor node")]
struct Args {
    /// Unique positive node id
    #[arg(long)]
    node_id: i32,

    /// Sensor position as three coordinates
    #[arg(long, num_args = 3, required = true, value_names = ["X", "Y", "Z"])]
    position: Vec<f64>,

    /// Data-plane address the distance router binds to
    #[arg(long)]
    bind_address: String,

    /// Target service address
    #[arg(long, default_value = "127.0.0.1:7600")]
    target_addr: String,

    /// Network service address
    #[arg(long, default_value = "127.0.0.1:7700")]
    network_addr: String,

    /// Sensor measurement frequency, in Hz
    #[arg(long, default_value_t = 10.0)]
    frequency: f64,

    /// Variance of the Gaussian measurement noise, in square meters
    #[arg(long, default_value_t = 0.0016)]
    noise_var: f64,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let node_id = NodeId::new(args.node_id);
    let position = Position::new(args.position[0], args.position[1], args.position[2]);
    let cell = Arc::new(SensorCell::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    // Bind the router before registering so the dealer can reach this node
    // as soon as the network activates.
    let router = NodeRouter::bind(&args.bind_address, node_id, Arc::clone(&cell))
        .await
        .context("binding the distance router")?;

    let sensor = tokio::spawn(run_sensor_loop(
        Arc::clone(&cell),
        node_id,
        position,
        args.target_addr.clone(),
        SensorConfig {
            frequency: args.frequency,
            noise_var: args.noise_var,
        },
        shutdown_rx.clone(),
    ));

    register_with_network(&args.network_addr, node_id, position, &args.bind_address)
        .await
        .context("registering with the network")?;

    router.run(shutdown_rx).await?;
    sensor.await.ok();
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
