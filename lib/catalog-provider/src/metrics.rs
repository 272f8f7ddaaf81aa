//! Prometheus metrics of the synchronization loop

use crate::Result;
use prometheus::{Counter, CounterVec, Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector shared by the provider tasks.
///
/// Clones share the same registry and metrics.
#[derive(Clone)]
pub struct ProviderMetrics {
    /// Catalog fetch cycles by result (`success`, `failure`)
    pub fetch_cycles_total: CounterVec,
    /// Configuration snapshots handed to the consumer
    pub snapshots_published_total: Counter,
    /// Instances in the last fetched batch
    pub instances: IntGauge,
    /// Backoff retries of the polling loop
    pub backoff_retries_total: Counter,
    /// Certificate bundles handed to the polling loop
    pub cert_bundles_published_total: Counter,
    pub registry: Arc<Registry>,
}

impl ProviderMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let fetch_cycles_total = CounterVec::new(
            Opts::new("catalog_sync_fetch_cycles_total", "Catalog fetch cycles by result"),
            &["result"],
        )?;

        let snapshots_published_total = Counter::new(
            "catalog_sync_snapshots_published_total",
            "Configuration snapshots published",
        )?;

        let instances = IntGauge::new(
            "catalog_sync_instances",
            "Service instances in the last fetched batch",
        )?;

        let backoff_retries_total = Counter::new(
            "catalog_sync_backoff_retries_total",
            "Polling loop retries after a failure",
        )?;

        let cert_bundles_published_total = Counter::new(
            "catalog_sync_cert_bundles_published_total",
            "Connect certificate bundles published",
        )?;

        registry.register(Box::new(fetch_cycles_total.clone()))?;
        registry.register(Box::new(snapshots_published_total.clone()))?;
        registry.register(Box::new(instances.clone()))?;
        registry.register(Box::new(backoff_retries_total.clone()))?;
        registry.register(Box::new(cert_bundles_published_total.clone()))?;

        Ok(Self {
            fetch_cycles_total,
            snapshots_published_total,
            instances,
            backoff_retries_total,
            cert_bundles_published_total,
            registry,
        })
    }

    pub fn record_fetch(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.fetch_cycles_total.with_label_values(&[result]).inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather() {
        let metrics = ProviderMetrics::new().unwrap();
        metrics.record_fetch(true);
        metrics.record_fetch(false);
        metrics.record_fetch(false);
        metrics.instances.set(4);

        let text = metrics.gather().unwrap();
        assert!(text.contains("catalog_sync_fetch_cycles_total{result=\"failure\"} 2"));
        assert!(text.contains("catalog_sync_fetch_cycles_total{result=\"success\"} 1"));
        assert!(text.contains("catalog_sync_instances 4"));
    }

    #[test]
    fn test_clones_share_registry() {
        let metrics = ProviderMetrics::new().unwrap();
        let clone = metrics.clone();
        clone.snapshots_published_total.inc();
        assert_eq!(metrics.snapshots_published_total.get(), 1.0);
    }
}
