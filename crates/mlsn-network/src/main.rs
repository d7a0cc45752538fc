//! Network coordinator binary

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use mlsn_network::{NetworkServer, ServiceConfig};

#[derive(Parser, Debug)]
#[command(name = "mlsn-network", about = "Multilateration network coordinator")]
struct Args {
    /// Address the control-plane service listens on
    #[arg(long, default_value = "127.0.0.1:7700")]
    listen: String,

    /// Gather poll timeout per distance round, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_timeout_ms: u64,

    /// Bound on concurrently handled requests
    #[arg(long, default_value_t = 8)]
    max_in_flight: usize,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = ServiceConfig {
        poll_timeout: Duration::from_millis(args.poll_timeout_ms),
        max_in_flight: args.max_in_flight,
        ..Default::default()
    };
    let server = NetworkServer::bind(&args.listen, config).await?;
    tracing::info!("network service listening on {}", server.local_addr());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    server.run(shutdown_rx).await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
