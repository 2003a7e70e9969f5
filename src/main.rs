use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dylan_lib::http::start_server;
use dylan_lib::{AppState, load_app_config};

#[derive(Parser, Debug)]
#[command(name = "dylan", version, about = "Build and deploy plugin pull requests from a slash command")]
struct Cli {
    /// JSON config file (default: <config dir>/dylan/config.json)
    #[arg(short, long, env = "DYLAN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long, env = "DYLAN_LISTEN")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mut config =
        load_app_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let state = Arc::new(AppState::with_live_services(config)?);
    start_server(state).await.context("HTTP server failed")
}
