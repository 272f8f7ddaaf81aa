//! Wire types of the Consul catalog HTTP API
//!
//! This library defines the payloads exchanged with the catalog:
//! - CatalogService: a registration returned by the catalog endpoints
//! - ServiceEntry: a registration with its node and health checks
//! - AgentServiceRegistration: the agent-local registration request
//! - CaRootList / LeafCert: Connect certificate authority payloads

pub mod agent;
pub mod catalog;
pub mod connect;
pub mod health;

pub use agent::{AgentServiceConnect, AgentServiceRegistration};
pub use catalog::CatalogService;
pub use connect::{CaRoot, CaRootList, LeafCert};
pub use health::{aggregated_status, AgentService, HealthCheck, HealthStatus, Node, ServiceEntry};

use serde::{Deserialize, Deserializer};

/// The catalog encodes empty collections and strings as `null`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
