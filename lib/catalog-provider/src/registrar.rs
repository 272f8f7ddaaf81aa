//! Connect native self-registration

use crate::{Backoff, BackoffConfig, ProviderConfig};
use catalog_api::AgentServiceRegistration;
use catalog_client::{sleep_or_cancel, ClientFactory};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Registers this process as a Connect native service for as long as it runs
pub struct ConnectRegistrar {
    factory: ClientFactory,
    service_id: String,
    service_name: String,
    service_port: u16,
    backoff: BackoffConfig,
}

impl ConnectRegistrar {
    pub fn new(factory: ClientFactory, config: &ProviderConfig) -> Self {
        let service_name = if config.service_name.is_empty() {
            "traefik".to_string()
        } else {
            config.service_name.clone()
        };

        Self {
            factory,
            service_id: Uuid::new_v4().to_string(),
            service_name,
            service_port: config.service_port,
            backoff: config.backoff.clone(),
        }
    }

    /// Instance identifier, generated once per process
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Register, retrying until it succeeds, then deregister once `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let client = match (self.factory)() {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to create catalog client for the self-registration");
                return;
            }
        };

        let registration =
            AgentServiceRegistration::connect_native(self.service_id.clone(), self.service_name.clone(), self.service_port);

        let mut backoff = Backoff::new(&self.backoff);
        loop {
            match client.register_service(&registration).await {
                Ok(()) => break,
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!(
                        service_name = %self.service_name,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Failed to register as Connect native service in the catalog"
                    );
                    if sleep_or_cancel(&cancel, delay).await {
                        return;
                    }
                }
            }
        }

        info!(
            service_name = %self.service_name,
            service_id = %self.service_id,
            "Registered as Connect native service"
        );

        cancel.cancelled().await;

        if let Err(e) = client.deregister_service(&self.service_id).await {
            error!(service_id = %self.service_id, error = %e, "Failed to deregister from the catalog");
        }
    }
}
