//! Catalog fetching for one polling cycle

use crate::{ProviderConfig, Result};
use catalog_api::{CatalogService, HealthStatus};
use catalog_client::{CatalogClient, QueryOptions};
use catalog_core::{index_statuses, merge_instances, FilterDecision, MergeOptions, ServiceInstance, TagFilter};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error};

/// Reads the catalog into a batch of service instances
pub struct CatalogFetcher {
    client: Arc<dyn CatalogClient>,
    filter: TagFilter,
    merge: MergeOptions,
    options: QueryOptions,
}

impl CatalogFetcher {
    pub fn new(client: Arc<dyn CatalogClient>, config: &ProviderConfig) -> Self {
        Self {
            client,
            filter: config.tag_filter(),
            merge: config.merge_options(),
            options: config.query_options(),
        }
    }

    /// Names of the exposed services, each with its Connect mode
    pub async fn fetch_services(&self) -> Result<BTreeMap<String, bool>> {
        let services = self.client.services(&self.options).await?;

        let mut filtered = BTreeMap::new();
        for (name, tags) in services {
            match self.filter.decide(&tags) {
                Ok(FilterDecision::Include { connect }) => {
                    filtered.insert(name, connect);
                }
                Ok(FilterDecision::Disabled) => {
                    debug!(service_name = %name, "Filtering disabled item");
                }
                Ok(FilterDecision::Pruned) => {
                    debug!(
                        service_name = %name,
                        "Item pruned by constraint expression: {:?}",
                        self.filter.constraints()
                    );
                }
                Err(e) => {
                    error!(service_name = %name, error = %e, "Error matching constraints expression");
                }
            }
        }

        Ok(filtered)
    }

    /// Registrations of one service with their aggregated health, keyed by
    /// node identifier followed by service identifier
    pub async fn fetch_service(
        &self,
        name: &str,
        connect: bool,
    ) -> Result<(Vec<CatalogService>, HashMap<String, HealthStatus>)> {
        let tag = self.filter.catalog_tag();

        let registrations = self
            .client
            .catalog_service(name, tag.as_deref(), connect, &self.options)
            .await?;

        let entries = self
            .client
            .health_service(name, tag.as_deref(), connect, false, &self.options)
            .await?;

        Ok((registrations, index_statuses(&entries)))
    }

    /// Fetch the whole batch; any query error fails the cycle
    pub async fn fetch(&self) -> Result<Vec<ServiceInstance>> {
        let services = self.fetch_services().await?;

        let mut instances = Vec::new();
        for (name, connect) in &services {
            let (registrations, statuses) = self.fetch_service(name, *connect).await?;
            instances.extend(merge_instances(name, *connect, &registrations, &statuses, &self.merge));
        }

        debug!(services = services.len(), instances = instances.len(), "Fetched catalog");
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCatalog;
    use crate::ProviderError;

    #[tokio::test]
    async fn test_fetch_services_applies_filter() {
        let catalog = FakeCatalog::new();
        catalog.add_service("web", &["traefik.enable=true", "traefik.connect=true", "env=prod"], &[]);
        catalog.add_service("db", &[], &[]);
        catalog.add_service("api", &["TRAEFIK.ENABLE=TRUE"], &[]);

        let config = ProviderConfig {
            exposed_by_default: false,
            ..Default::default()
        };
        let fetcher = CatalogFetcher::new(catalog.clone(), &config);
        let services = fetcher.fetch_services().await.unwrap();

        let expected: BTreeMap<String, bool> = [("api".to_string(), false), ("web".to_string(), true)].into();
        assert_eq!(services, expected);
    }

    #[tokio::test]
    async fn test_constraint_errors_skip_services() {
        let catalog = FakeCatalog::new();
        catalog.add_service("web", &["public"], &["10.0.0.5"]);

        let config = ProviderConfig {
            constraints: "Tag(`public`) &&".to_string(),
            ..Default::default()
        };
        let fetcher = CatalogFetcher::new(catalog.clone(), &config);
        assert!(fetcher.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_merges_health() {
        let catalog = FakeCatalog::new();
        catalog.add_service("web", &[], &["10.0.0.5", "10.0.0.6"]);
        catalog.add_service("api", &["traefik.connect=true"], &["10.0.1.5"]);

        let fetcher = CatalogFetcher::new(catalog.clone(), &ProviderConfig::default());
        let instances = fetcher.fetch().await.unwrap();

        let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["api-0", "web-0", "web-1"]);
        assert!(instances.iter().all(|i| i.status == HealthStatus::Passing));
        assert!(instances[0].connect_enabled);
        assert!(!instances[1].connect_enabled);

        let queries = catalog.catalog_queries.lock().unwrap().clone();
        assert_eq!(
            queries,
            vec![("api".to_string(), None, true), ("web".to_string(), None, false)]
        );
        assert_eq!(*catalog.health_queries.lock().unwrap(), queries);
    }

    #[tokio::test]
    async fn test_consistency_options_on_every_query() {
        let catalog = FakeCatalog::new();
        catalog.add_service("web", &["traefik.enable=true"], &["10.0.0.5"]);
        catalog.add_service("api", &["traefik.enable=true", "traefik.connect=true"], &["10.0.1.5"]);

        let config = ProviderConfig {
            exposed_by_default: false,
            stale: true,
            require_consistent: true,
            cache: true,
            ..Default::default()
        };
        let fetcher = CatalogFetcher::new(catalog.clone(), &config);
        fetcher.fetch().await.unwrap();

        let expected = QueryOptions::consistency(true, true, true);
        let options = catalog.query_options.lock().unwrap().clone();
        // services, then catalog and health for each of the two services
        assert_eq!(options.len(), 5);
        assert!(options.iter().all(|opts| *opts == expected));

        let tag = Some("traefik.enable=true".to_string());
        let health = catalog.health_queries.lock().unwrap().clone();
        assert_eq!(
            health,
            vec![("api".to_string(), tag.clone(), true), ("web".to_string(), tag, false)]
        );
        assert_eq!(*catalog.catalog_queries.lock().unwrap(), health);
    }

    #[tokio::test]
    async fn test_catalog_tag_when_not_exposed_by_default() {
        let catalog = FakeCatalog::new();
        catalog.add_service("web", &["traefik.enable=true"], &["10.0.0.5"]);

        let config = ProviderConfig {
            exposed_by_default: false,
            ..Default::default()
        };
        let fetcher = CatalogFetcher::new(catalog.clone(), &config);
        fetcher.fetch().await.unwrap();

        let queries = catalog.catalog_queries.lock().unwrap().clone();
        assert_eq!(queries[0].1.as_deref(), Some("traefik.enable=true"));
    }

    #[tokio::test]
    async fn test_query_error_fails_cycle() {
        let catalog = FakeCatalog::new();
        catalog.add_service("web", &[], &["10.0.0.5"]);
        catalog.fail_services(&[true]);

        let fetcher = CatalogFetcher::new(catalog.clone(), &ProviderConfig::default());
        assert!(matches!(fetcher.fetch().await, Err(ProviderError::Client(_))));
        assert_eq!(fetcher.fetch().await.unwrap().len(), 1);
    }
}
