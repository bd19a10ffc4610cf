//! grants - command-line browser for the grant research API

mod commands;
mod config;

use clap::Parser;
use grant_sdk::GrantClient;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr so JSON output stays clean
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("grants={},grant_sdk={},warn", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    debug!(api_url = %args.api_url, user_id = ?args.user_id, "Starting grants");

    let client = GrantClient::new(args.sdk_config())?.with_user(args.user_id);
    commands::execute(&client, args.command, args.json).await
}
