#![forbid(unsafe_code)]
//! FileChain network node

use clap::Parser;
use filechain::config::{read_config_from, DEFAULT_CONFIG_PATH};
use filechain::logging::{init_logging, LogFormat};
use filechain::node::{shutdown_signal, Node};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// API port (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,
    /// Bind address (overrides config)
    #[arg(long)]
    bind: Option<String>,
    /// Peer base URL to register at startup; repeatable
    #[arg(long = "peer", value_name = "URL")]
    peers: Vec<String>,
    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = read_config_from(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.api_port = port;
    }
    if let Some(bind) = cli.bind {
        config.network.bind_address = bind;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;

    init_logging(config.logging.format, &config.logging.level)?;

    let node = Node::init(config).await?;
    node.start(shutdown_signal()).await?;
    Ok(())
}
