//! screensheet relay entry point.
//!
//! ```text
//! screensheet-relay                  Run in the foreground
//! screensheet-relay --config <path>  Load a custom config TOML
//! screensheet-relay --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use screensheet_relay::config::RelayConfig;
use screensheet_relay::service::RelayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "screensheet-relay", about = "Screensheet relay broker")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "screensheet-relay.toml")]
    config: PathBuf,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&RelayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = RelayConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("screensheet-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("heartbeat: {}s", config.network.heartbeat_secs);

    let service = RelayService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run().await?;
    Ok(())
}
