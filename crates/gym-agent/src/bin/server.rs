//! Serves the assistant over HTTP.

#[macro_use]
extern crate tracing;

use std::process::ExitCode;

use gym_agent::config::Config;
use gym_agent::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), gym_agent::Error> {
    let config = Config::from_env()?;
    debug!("{config:?}");
    server::serve(&config).await
}
