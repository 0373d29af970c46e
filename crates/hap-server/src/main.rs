//! HAP accessory server binary.
//!
//! # Usage
//!
//! ```bash
//! hap-server --bind 0.0.0.0:51826
//! ```

use clap::Parser;
use hap_demo_handler::DemoHandler;
use hap_server::{Server, ServerConfig, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// HAP accessory transport server
#[derive(Parser, Debug)]
#[command(name = "hap-server")]
#[command(about = "HomeKit Accessory Protocol transport server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:51826")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("HAP server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        server: ServerConfig { max_connections: args.max_connections, ..Default::default() },
    };

    let server = Server::bind(config, DemoHandler::new()).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
