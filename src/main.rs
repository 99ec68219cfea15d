//! Forward proxy front door.
//!
//! ```text
//!   client ──▶ admission ──▶ client ACL ──▶ target host ──▶ body cap ──▶ upstream
//!     ◀──────────────────────── streamed response ◀───────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use forward_gate::config::load_config;
use forward_gate::observability::{logging, metrics};
use forward_gate::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "forward-gate")]
#[command(about = "Allow-listed forward proxy driven by a target URL header", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability);

    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        "forward-gate v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
