//! Provider settings

use catalog_client::{EndpointConfig, QueryOptions};
use catalog_core::{MergeOptions, TagFilter, DEFAULT_TEMPLATE_RULE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_prefix() -> String {
    "traefik".to_string()
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_true() -> bool {
    true
}

fn default_rule() -> String {
    DEFAULT_TEMPLATE_RULE.to_string()
}

fn default_service_name() -> String {
    "traefik".to_string()
}

/// Static configuration of the catalog provider, loaded once at startup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Constraint expression matched against service tags
    #[serde(default)]
    pub constraints: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_refresh_interval", with = "catalog_client::duration")]
    pub refresh_interval: Duration,
    #[serde(default)]
    pub require_consistent: bool,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default = "default_true")]
    pub exposed_by_default: bool,
    #[serde(default = "default_rule")]
    pub default_rule: String,
    /// Watch Connect certificates and register as a Connect native service
    #[serde(default)]
    pub connect_aware: bool,
    #[serde(default)]
    pub connect_by_default: bool,
    /// Name of the Connect native service this process registers as
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub service_port: u16,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            constraints: String::new(),
            prefix: default_prefix(),
            refresh_interval: default_refresh_interval(),
            require_consistent: false,
            stale: false,
            cache: false,
            exposed_by_default: true,
            default_rule: default_rule(),
            connect_aware: false,
            connect_by_default: false,
            service_name: default_service_name(),
            service_port: 0,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Read-consistency options shared by every catalog query
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::consistency(self.stale, self.require_consistent, self.cache)
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(
            self.prefix.clone(),
            self.constraints.clone(),
            self.exposed_by_default,
            self.connect_by_default,
        )
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            prefix: self.prefix.clone(),
            exposed_by_default: self.exposed_by_default,
        }
    }
}

/// Retry delays of the polling loop and the self-registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    #[serde(with = "catalog_client::duration")]
    pub initial_interval: Duration,
    #[serde(with = "catalog_client::duration")]
    pub max_interval: Duration,
    /// A run lasting at least this long starts the next backoff from scratch
    #[serde(with = "catalog_client::duration")]
    pub min_job_interval: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(60),
            min_job_interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg: ProviderConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, ProviderConfig::default());
        assert_eq!(cfg.prefix, "traefik");
        assert_eq!(cfg.refresh_interval, Duration::from_secs(15));
        assert!(cfg.exposed_by_default);
        assert_eq!(cfg.default_rule, "Host(`{{ normalize .Name }}`)");
        assert_eq!(cfg.service_name, "traefik");
        assert_eq!(cfg.endpoint.address, "127.0.0.1:8500");
        assert_eq!(cfg.backoff.min_job_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_from_yaml() {
        let cfg: ProviderConfig = serde_yaml::from_str(
            r#"
endpoint:
  address: consul:8500
  datacenter: dc1
constraints: Tag(`public`)
prefix: edge
refreshInterval: 500ms
stale: true
exposedByDefault: false
connectAware: true
connectByDefault: true
servicePort: 8443
backoff:
  initialInterval: 1s
  maxInterval: 2m
  minJobInterval: 45
"#,
        )
        .unwrap();

        assert_eq!(cfg.endpoint.datacenter.as_deref(), Some("dc1"));
        assert_eq!(cfg.refresh_interval, Duration::from_millis(500));
        assert_eq!(cfg.backoff.max_interval, Duration::from_secs(120));
        assert_eq!(cfg.backoff.min_job_interval, Duration::from_secs(45));
        assert_eq!(cfg.service_port, 8443);

        let opts = cfg.query_options();
        assert!(opts.allow_stale);
        assert!(!opts.require_consistent);

        let filter = cfg.tag_filter();
        assert_eq!(filter.prefix(), "edge");
        assert_eq!(filter.catalog_tag().as_deref(), Some("edge.enable=true"));
    }

    #[test]
    fn test_partial_backoff_rejected() {
        let result: Result<ProviderConfig, _> = serde_yaml::from_str("backoff:\n  initialInterval: 1s\n");
        assert!(result.is_err());
    }
}
