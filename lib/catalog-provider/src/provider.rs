//! Catalog provider entry point

use crate::{
    certificate_channel, CertificateWatcher, ConnectRegistrar, ProviderConfig, ProviderError, ProviderMetrics, Result,
    Supervisor,
};
use catalog_client::{http_client_factory, ClientFactory};
use catalog_core::{ConfigurationBuilder, ConfigurationMessage, DefaultRuleTemplate};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Name attached to every published configuration
pub const PROVIDER_NAME: &str = "consulcatalog";

/// Publishes configuration snapshots built from the catalog
pub struct CatalogProvider {
    config: Arc<ProviderConfig>,
    builder: ConfigurationBuilder,
    factory: ClientFactory,
    metrics: ProviderMetrics,
}

/// Tasks started by [`CatalogProvider::provide`]
pub struct ProviderHandles {
    pub supervisor: JoinHandle<Result<()>>,
    pub cert_watcher: Option<JoinHandle<()>>,
    pub registrar: Option<JoinHandle<()>>,
}

impl ProviderHandles {
    /// Wait for every task; the polling loop's result is returned.
    ///
    /// A panicked or aborted polling loop is reported as
    /// [`ProviderError::TaskFailed`].
    pub async fn join(self) -> Result<()> {
        let result = match self.supervisor.await {
            Ok(result) => result,
            Err(e) => {
                error!(provider = PROVIDER_NAME, error = %e, "Polling task failed");
                Err(e.into())
            }
        };

        for task in [self.cert_watcher, self.registrar].into_iter().flatten() {
            if let Err(e) = task.await {
                warn!(provider = PROVIDER_NAME, error = %e, "Provider task aborted");
            }
        }

        result
    }
}

impl CatalogProvider {
    /// Provider talking to the catalog over HTTP.
    ///
    /// Fails when the default rule template does not parse or the refresh
    /// interval is zero.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let factory = http_client_factory(config.endpoint.clone());
        Self::with_client_factory(config, factory)
    }

    pub fn with_client_factory(config: ProviderConfig, factory: ClientFactory) -> Result<Self> {
        if config.refresh_interval.is_zero() {
            return Err(ProviderError::InvalidRefreshInterval);
        }
        let template = DefaultRuleTemplate::parse(&config.default_rule).map_err(ProviderError::InvalidDefaultRule)?;

        Ok(Self {
            config: Arc::new(config),
            builder: ConfigurationBuilder::new(template),
            factory,
            metrics: ProviderMetrics::new()?,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ProviderMetrics {
        &self.metrics
    }

    /// Start publishing into `sender` until `cancel` fires
    pub fn provide(&self, sender: mpsc::Sender<ConfigurationMessage>, cancel: CancellationToken) -> ProviderHandles {
        info!(
            provider = PROVIDER_NAME,
            connect_aware = self.config.connect_aware,
            refresh_interval_ms = self.config.refresh_interval.as_millis() as u64,
            "Starting catalog provider"
        );

        let mut feed = None;
        let mut cert_watcher = None;
        let mut registrar = None;

        if self.config.connect_aware {
            let reg = ConnectRegistrar::new(self.factory.clone(), &self.config);
            registrar = Some(tokio::spawn(reg.run(cancel.clone())));

            let (publisher, consumer) = certificate_channel();
            let watcher = CertificateWatcher::new(self.factory.clone(), &self.config, publisher, self.metrics.clone());
            cert_watcher = Some(tokio::spawn(watcher.run(cancel.clone())));
            feed = Some(consumer);
        }

        let supervisor = Supervisor::new(
            self.factory.clone(),
            self.config.clone(),
            self.builder.clone(),
            feed,
            sender,
            self.metrics.clone(),
        );

        ProviderHandles {
            supervisor: tokio::spawn(supervisor.run(cancel)),
            cert_watcher,
            registrar,
        }
    }
}
