//! gopherd: a Gopher server for a directory tree
//!
//! Serves the contents of a single content root over the Gopher protocol:
//! - Directories become menus of typed entries
//! - Files are sent as raw bytes, with zero-copy transfer where available
//! - Selectors are confined to the content root
//!
//! Configuration comes from CLI arguments or a TOML file.

mod config;
mod gopher;
mod server;
mod transmit;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        listen = %config.listen_addr(),
        root = %config.root.display(),
        sendfile = config.sendfile,
        read_timeout = ?config.read_timeout,
        write_timeout = ?config.write_timeout,
        "Starting gopherd"
    );

    Server::new(config).run().await
}
