//! Dynamic configuration published to the consumer

use serde::Serialize;
use std::collections::BTreeMap;

/// A full configuration snapshot tagged with the provider that built it.
///
/// Each message replaces the previous snapshot of the same provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationMessage {
    pub provider_name: String,
    pub configuration: Configuration,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Configuration {
    pub http: HttpConfiguration,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfiguration {
    pub routers: BTreeMap<String, Router>,
    pub services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub servers_transports: BTreeMap<String, ServersTransport>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<String>,
    pub rule: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub load_balancer: ServersLoadBalancer,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServersLoadBalancer {
    pub servers: Vec<Server>,
    pub pass_host_header: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers_transport: Option<String>,
}

impl Default for ServersLoadBalancer {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            pass_host_header: true,
            servers_transport: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Server {
    pub url: String,
}

/// TLS settings used to reach Connect-enabled servers
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServersTransport {
    pub server_name: String,
    pub insecure_skip_verify: bool,
    #[serde(rename = "rootCAs")]
    pub root_cas: Vec<String>,
    pub certificates: Vec<Certificate>,
    #[serde(rename = "peerCertURI")]
    pub peer_cert_uri: String,
}

/// PEM content, not file paths
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub cert_file: String,
    pub key_file: String,
}

impl Configuration {
    pub fn is_empty(&self) -> bool {
        self.http.routers.is_empty() && self.http.services.is_empty()
    }
}
