use anyhow::Result;
use catalog_core::ConfigurationMessage;
use catalog_provider::CatalogProvider;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod server;
mod settings;

use settings::{Settings, CONFIG_ENV, DEFAULT_CONFIG_PATH};

const LOG_FORMAT_ENV: &str = "CATALOG_SYNC_LOG_FORMAT";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = PathBuf::from(std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()));
    let settings = Settings::load(&config_path)?;
    info!("Starting catalog-sync with configuration from {}", config_path.display());

    let provider = CatalogProvider::new(settings.provider)?;
    info!(
        "Catalog provider initialized for {} (prefix {:?}, connect aware: {})",
        provider.config().endpoint.address,
        provider.config().prefix,
        provider.config().connect_aware
    );

    let cancel = CancellationToken::new();

    let metrics_server = settings.metrics_address.map(|addr| {
        let metrics = provider.metrics().clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = server::serve(addr, metrics, cancel).await {
                error!("Metrics server failed: {}", e);
            }
        })
    });

    let (tx, rx) = mpsc::channel(16);
    let handles = provider.provide(tx, cancel.clone());
    let consumer = tokio::spawn(consume(rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    cancel.cancel();

    let result = handles.join().await;
    if let Some(server) = metrics_server {
        let _ = server.await;
    }
    let _ = consumer.await;

    result?;
    info!("catalog-sync stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Log every published snapshot
async fn consume(mut rx: mpsc::Receiver<ConfigurationMessage>) {
    while let Some(message) = rx.recv().await {
        let http = &message.configuration.http;
        info!(
            provider = %message.provider_name,
            routers = http.routers.len(),
            services = http.services.len(),
            servers_transports = http.servers_transports.len(),
            "Received configuration"
        );
        match serde_json::to_string(&message.configuration) {
            Ok(json) => debug!(provider = %message.provider_name, "{}", json),
            Err(e) => error!("Failed to encode configuration: {}", e),
        }
    }
}
