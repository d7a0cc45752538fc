//! Target binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mlsn_target::{run_trajectory_updater, TargetCell, TargetServer, Trajectory, UpdaterConfig};

#[derive(Parser, Debug)]
#[command(name = "mlsn-target", about = "Moving target simulator")]
struct Args {
    /// Address the position service listens on
    #[arg(long, default_value = "127.0.0.1:7600")]
    listen: String,

    /// Trajectory JSON document
    #[arg(long, default_value = "data/circular_path.json")]
    trajectory: PathBuf,

    /// Position update frequency, in Hz
    #[arg(long, default_value_t = 3.0)]
    frequency: f64,

    /// Restart the trajectory after the last waypoint
    #[arg(long)]
    loop_path: bool,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Trajectory problems are fatal before the service starts.
    let trajectory = Trajectory::load(&args.trajectory).context("loading the trajectory")?;
    let cell = Arc::new(TargetCell::new(trajectory.first()));

    let server = TargetServer::bind(&args.listen, Arc::clone(&cell)).await?;
    tracing::info!("target service listening on {}", server.local_addr());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let updater = tokio::spawn(run_trajectory_updater(
        cell,
        trajectory,
        UpdaterConfig {
            frequency: args.frequency,
            loop_path: args.loop_path,
        },
        shutdown_rx.clone(),
    ));

    server.run(shutdown_rx).await?;
    updater.await.ok();
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
