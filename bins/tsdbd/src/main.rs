use std::sync::Arc;

use broker_config::BrokerConfig;
use broker_core::Broker;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("TSDBD_CONFIG").unwrap_or_else(|_| "tsdbd.toml".to_string());
    let config = BrokerConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let listen_host = config.listen_host.clone();
    let listen_port = config.listen_port;
    let broker = Arc::new(Broker::new(config));

    info!(host = %listen_host, port = listen_port, "tsdbd: starting broker");

    broker_core::run(broker).await?;
    Ok(())
}
