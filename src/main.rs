use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fedrelay::config::Config;
use fedrelay::consumer::LogConsumer;
use fedrelay::node::RelayNode;
use fedrelay::shutdown::ShutdownManager;

#[derive(Parser, Debug)]
#[command(name = "fedrelayd")]
#[command(about = "Federated chat/presence relay daemon", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "fedrelay.toml")]
    config: String,

    /// Override the configured listen port
    #[arg(long)]
    listen_port: Option<u16>,

    /// Override the configured node class
    #[arg(long)]
    class: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = match Config::load(Path::new(&args.config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = args.listen_port {
        config.network.listen_port = port;
        config.network.port_end = config.network.port_end.max(port);
    }
    if let Some(class) = args.class {
        config.node.class = class;
        config.node.name = String::new();
    }
    let config = config.normalized();

    let node = match RelayNode::start(config, Arc::new(LogConsumer)).await {
        Ok(node) => node,
        Err(e) => {
            tracing::error!("Failed to start relay node: {}", e);
            std::process::exit(1);
        }
    };

    ShutdownManager::new(node).wait_for_shutdown().await;
}
