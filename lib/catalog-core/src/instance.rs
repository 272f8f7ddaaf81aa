//! Routable service instances
use crate::labels::ExtraConfiguration;
use catalog_api::HealthStatus;
use serde::Serialize;
use std::collections::BTreeMap;

/// One concrete, routable endpoint of a catalog service
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceInstance {
    pub id: String,
    pub node: String,
    pub datacenter: String,
    pub namespace: String,
    pub name: String,
    pub address: String,
    pub port: String,
    pub status: HealthStatus,
    pub labels: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub connect_enabled: bool,
    pub extra_conf: ExtraConfiguration,
}
