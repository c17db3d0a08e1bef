//! Companion service for the meeting-window browser extension.
//!
//! Usage: `meet-redirectd [--state-dir DIR] [--bind ADDR]`

use std::path::PathBuf;

use clap::Parser;
use meet_redirect::storage::FileKvStore;
use meet_redirect::{load_or_create_config, Server};
use tracing_subscriber::EnvFilter;

/// Routes meeting links into a single app-style browser window
#[derive(Parser)]
#[command(name = "meet-redirectd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config.json and the persisted redirect record
    #[arg(long, value_name = "DIR", env = "MEET_REDIRECT_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, value_name = "FILTER", default_value = "info")]
    log: String,
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meet-redirect")
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log);

    let state_dir = cli.state_dir.unwrap_or_else(default_state_dir);
    let config = match load_or_create_config(&state_dir) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("failed to load config from {}: {error}", state_dir.display());
            std::process::exit(1);
        }
    };
    let config = match config.resolve(cli.bind) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("invalid configuration override: {error}");
            std::process::exit(1);
        }
    };

    let store = match FileKvStore::open(&state_dir).await {
        Ok(store) => store,
        Err(error) => {
            tracing::error!("failed to open store: {error}");
            std::process::exit(1);
        }
    };

    let mut server = match Server::start(config, Box::new(store)).await {
        Ok(server) => server,
        Err(error) => {
            tracing::error!("failed to start server: {error}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "waiting for the browser extension on ws://{}/extension/ws",
        server.addr()
    );

    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {error}");
    }
    tracing::info!("shutting down");
    let _ = server.shutdown();
}
