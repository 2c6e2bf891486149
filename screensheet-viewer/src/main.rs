//! screensheet viewer entry point.
//!
//! ```text
//! screensheet-viewer                  Join using the config file
//! screensheet-viewer --code <CODE>    Join with a connection code
//! screensheet-viewer --config <path>  Load a custom config TOML
//! screensheet-viewer --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use screensheet_viewer::config::ViewerConfig;
use screensheet_viewer::service::{Outcome, ViewerService};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "screensheet-viewer", about = "Screensheet headless viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "screensheet-viewer.toml")]
    config: PathBuf,

    /// Connection code shown by the host.
    #[arg(long)]
    code: Option<String>,

    /// Relay address, `host:port`.
    #[arg(long)]
    relay: Option<String>,

    /// Snapshot directory.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(code) = cli.code {
        config.join.code = code;
        config.join.username.clear();
    }
    if let Some(relay) = cli.relay {
        config.network.relay_address = relay;
    }
    if let Some(output) = cli.output {
        config.output.directory = output;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("screensheet-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("relay: {}", config.network.relay_address);

    let service = ViewerService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, leaving session");
        stop.cancel();
    });

    match service.run().await? {
        Outcome::Stopped => Ok(()),
        Outcome::Ended(code) => Err(format!("session ended: {code}").into()),
    }
}
