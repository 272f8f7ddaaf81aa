//! Endpoint and query settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_address() -> String {
    "127.0.0.1:8500".to_string()
}

/// How to reach the catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// `host:port`, optionally with an `http://` or `https://` scheme
    #[serde(default = "default_address")]
    pub address: String,
    /// Defaults to `https` when TLS is configured, `http` otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ClientTls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_auth: Option<HttpAuth>,
    /// Upper bound of a blocking query; agent default when unset
    #[serde(default, with = "crate::duration::option", skip_serializing_if = "Option::is_none")]
    pub endpoint_wait_time: Option<Duration>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            scheme: None,
            datacenter: None,
            token: None,
            tls: None,
            http_auth: None,
            endpoint_wait_time: None,
        }
    }
}

/// File paths of the TLS material used to reach the catalog
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpAuth {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Per-query options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Any server may answer, possibly with stale data
    pub allow_stale: bool,
    /// Force a fully consistent read through the leader
    pub require_consistent: bool,
    /// Serve from the agent cache when possible
    pub use_cache: bool,
    /// Block until the index moves past this value
    pub wait_index: u64,
    pub wait_time: Option<Duration>,
}

impl QueryOptions {
    /// Options carrying the read-consistency settings only
    pub fn consistency(allow_stale: bool, require_consistent: bool, use_cache: bool) -> Self {
        Self {
            allow_stale,
            require_consistent,
            use_cache,
            ..Default::default()
        }
    }

    /// Blocking variant of these options
    pub fn blocking(&self, wait_index: u64, wait_time: Option<Duration>) -> Self {
        Self {
            wait_index,
            wait_time,
            ..self.clone()
        }
    }
}

/// Metadata of a query response
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// `X-Consul-Index` of the response
    pub last_index: u64,
}
