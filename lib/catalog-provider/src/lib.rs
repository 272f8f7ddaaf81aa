//! Catalog synchronization provider
//!
//! This library provides:
//! - Periodic catalog fetching with tag filtering and health reconciliation
//! - Connect certificate rotation and self-registration
//! - A supervised polling loop publishing configuration snapshots

pub mod backoff;
pub mod cert;
pub mod cert_watcher;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod provider;
pub mod registrar;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::Backoff;
pub use cert::{certificate_channel, CertificateFeed, CertificatePublisher};
pub use cert_watcher::CertificateWatcher;
pub use config::{BackoffConfig, ProviderConfig};
pub use error::{ProviderError, Result};
pub use fetcher::CatalogFetcher;
pub use metrics::ProviderMetrics;
pub use provider::{CatalogProvider, ProviderHandles, PROVIDER_NAME};
pub use registrar::ConnectRegistrar;
pub use supervisor::{Notify, Supervisor};
