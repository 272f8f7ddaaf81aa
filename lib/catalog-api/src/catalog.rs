//! Catalog registrations

use crate::nullable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single service registration as returned by `/v1/catalog/service/:name`
/// and `/v1/catalog/connect/:name`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogService {
    /// Node identifier (not the service identifier)
    #[serde(rename = "ID", default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub node: String,
    /// Node-level address, used when the service has none of its own
    #[serde(default, deserialize_with = "nullable")]
    pub address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub datacenter: String,
    #[serde(default, deserialize_with = "nullable")]
    pub node_meta: BTreeMap<String, String>,
    #[serde(rename = "ServiceID", default, deserialize_with = "nullable")]
    pub service_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service_address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service_tags: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub service_meta: BTreeMap<String, String>,
    #[serde(default)]
    pub service_port: u16,
    #[serde(default, deserialize_with = "nullable")]
    pub namespace: String,
}
