#![cfg(not(tarpaulin_include))]

use clap::Parser;
use merchant_panel::app;
use merchant_panel::config::Args;

/// Main entry point for the web application
///
/// Initializes logging (`RUST_LOG`, default `info`), parses the bind address
/// and serves the panel until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    app::run(args).await
}
