mod config;

use mixboard::{MemoryStorage, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()?;

    tracing::info!(
        port = config.server.port,
        queue_capacity = config.server.queue_capacity,
        keep_alive_secs = config.server.keep_alive_secs,
        "Mix board starting"
    );

    Server::builder()
        .port(config.server.port)
        .storage(MemoryStorage::new())
        .queue_capacity(config.server.queue_capacity)
        .keep_alive(config.server.keep_alive())
        .cleanup_interval(config.server.cleanup_interval())
        .build()?
        .run()
        .await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixboard_server=info,mixboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
