//! voicematch - language-routed speaker embedding and voice matching service.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voicematch::{server, Config};

/// Language-routed speaker embedding and voice matching service.
#[derive(Parser, Debug)]
#[command(name = "voicematch")]
#[command(about = "Language-routed speaker embedding and voice matching service")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "VOICEMATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, replacing the port of the configured address
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Listen address (e.g. :5001, 127.0.0.1:8080); overrides config and PORT
    #[arg(long)]
    addr: Option<String>,

    /// Load the models before accepting requests
    #[arg(long)]
    eager: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.set_port(port);
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    tracing::info!(
        addr = %config.server.addr,
        models = %config.models.dir.display(),
        eager = args.eager,
        "starting voicematch"
    );
    server::run(config, args.eager).await
}
