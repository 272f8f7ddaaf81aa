//! Supervised polling loop

use crate::provider::PROVIDER_NAME;
use crate::{Backoff, CatalogFetcher, CertificateFeed, ProviderConfig, ProviderError, ProviderMetrics, Result};
use catalog_client::{sleep_or_cancel, CatalogClient, ClientFactory};
use catalog_core::{ConfigurationBuilder, ConfigurationMessage, ConnectCertBundle};
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Called before every backoff sleep with the failure and the delay
pub type Notify = Arc<dyn Fn(&ProviderError, Duration) + Send + Sync>;

enum State {
    Connecting,
    Running(Arc<dyn CatalogClient>),
    Backoff(ProviderError),
    Stopped,
}

enum Outcome {
    Cancelled,
    Failed(ProviderError),
}

/// Polling loop restarted with exponential backoff on every failure.
///
/// Runs until cancelled or until the consumer drops its receiver.
pub struct Supervisor {
    factory: ClientFactory,
    config: Arc<ProviderConfig>,
    builder: ConfigurationBuilder,
    feed: Option<CertificateFeed>,
    sender: mpsc::Sender<ConfigurationMessage>,
    metrics: ProviderMetrics,
    notify: Notify,
}

impl Supervisor {
    pub fn new(
        factory: ClientFactory,
        config: Arc<ProviderConfig>,
        builder: ConfigurationBuilder,
        feed: Option<CertificateFeed>,
        sender: mpsc::Sender<ConfigurationMessage>,
        metrics: ProviderMetrics,
    ) -> Self {
        Self {
            factory,
            config,
            builder,
            feed,
            sender,
            metrics,
            notify: Arc::new(log_retry),
        }
    }

    pub fn with_notify(mut self, notify: Notify) -> Self {
        self.notify = notify;
        self
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut backoff = Backoff::new(&self.config.backoff);
        let mut feed = self.feed.take();
        let mut bundle: Option<Arc<ConnectCertBundle>> = None;
        let mut state = State::Connecting;

        loop {
            state = match state {
                State::Connecting => match (self.factory)() {
                    Ok(client) => State::Running(client),
                    Err(e) => State::Backoff(e.into()),
                },
                State::Running(client) => {
                    let started = Instant::now();
                    let outcome = self.run_job(client, &mut feed, &mut bundle, &cancel).await;
                    if started.elapsed() >= self.config.backoff.min_job_interval {
                        backoff.reset();
                    }
                    match outcome {
                        Outcome::Cancelled => State::Stopped,
                        Outcome::Failed(ProviderError::PublishClosed) => {
                            warn!(provider = PROVIDER_NAME, "Configuration receiver dropped, stopping");
                            return Err(ProviderError::PublishClosed);
                        }
                        Outcome::Failed(e) => State::Backoff(e),
                    }
                }
                State::Backoff(error) => {
                    let delay = backoff.next_delay();
                    (self.notify)(&error, delay);
                    self.metrics.backoff_retries_total.inc();
                    if sleep_or_cancel(&cancel, delay).await {
                        State::Stopped
                    } else {
                        State::Connecting
                    }
                }
                State::Stopped => {
                    debug!(provider = PROVIDER_NAME, "Polling loop stopped");
                    return Ok(());
                }
            };
        }
    }

    async fn run_job(
        &self,
        client: Arc<dyn CatalogClient>,
        feed: &mut Option<CertificateFeed>,
        bundle: &mut Option<Arc<ConnectCertBundle>>,
        cancel: &CancellationToken,
    ) -> Outcome {
        if let Some(feed) = feed.as_mut() {
            if bundle.is_none() {
                info!(provider = PROVIDER_NAME, "Waiting for the first Connect certificate bundle");
            }
            tokio::select! {
                () = cancel.cancelled() => return Outcome::Cancelled,
                first = feed.first() => match first {
                    Some(first) => *bundle = Some(first),
                    None => {
                        warn!(provider = PROVIDER_NAME, "Certificate watcher stopped before publishing a bundle");
                        cancel.cancelled().await;
                        return Outcome::Cancelled;
                    }
                },
            }
        }

        let fetcher = CatalogFetcher::new(client, &self.config);

        if let Err(e) = self.publish(&fetcher, bundle.as_deref()).await {
            return Outcome::Failed(e);
        }

        let refresh = self.config.refresh_interval;
        let mut ticker = interval_at(Instant::now() + refresh, refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Outcome::Cancelled,
                _ = ticker.tick() => {
                    if let Err(e) = self.publish(&fetcher, bundle.as_deref()).await {
                        return Outcome::Failed(e);
                    }
                }
                Some(update) = next_bundle(feed) => {
                    // Picked up by the next tick.
                    debug!(provider = PROVIDER_NAME, "Received certificate bundle update");
                    *bundle = Some(update);
                }
            }
        }
    }

    async fn publish(&self, fetcher: &CatalogFetcher, bundle: Option<&ConnectCertBundle>) -> Result<()> {
        let instances = match fetcher.fetch().await {
            Ok(instances) => {
                self.metrics.record_fetch(true);
                instances
            }
            Err(e) => {
                self.metrics.record_fetch(false);
                return Err(e);
            }
        };
        self.metrics.instances.set(instances.len() as i64);

        let message = ConfigurationMessage {
            provider_name: PROVIDER_NAME.to_string(),
            configuration: self.builder.build(&instances, bundle),
        };
        self.sender
            .send(message)
            .await
            .map_err(|_| ProviderError::PublishClosed)?;
        self.metrics.snapshots_published_total.inc();
        Ok(())
    }
}

async fn next_bundle(feed: &mut Option<CertificateFeed>) -> Option<Arc<ConnectCertBundle>> {
    match feed {
        Some(feed) => feed.next().await,
        None => pending().await,
    }
}

fn log_retry(error: &ProviderError, delay: Duration) {
    error!(
        provider = PROVIDER_NAME,
        error = %error,
        delay_ms = delay.as_millis() as u64,
        "Provider connection error, retrying"
    );
}
