use anyhow::{Error, Result, anyhow};
use gcm_dispatch::{api::run_api_server, config::Config, engine::DispatchEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let engine = DispatchEngine::from_config(&config)?;

    info!(
        max_registration_tokens = config.gcm_max_registration_tokens,
        retries = config.gcm_retries,
        policy = ?config.transport_failure_policy,
        "Configuration validated. Dispatcher is ready to start."
    );

    run_api_server(engine, config.server_port)
        .await
        .map_err(|e| anyhow!("Dispatch server failed: {}", e))
}
