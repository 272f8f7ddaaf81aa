//! Reconciliation of catalog registrations with health listings

use crate::labels::{tags_to_labels, ExtraConfiguration};
use crate::ServiceInstance;
use catalog_api::{aggregated_status, CatalogService, HealthStatus, ServiceEntry};
use std::collections::HashMap;
use tracing::error;

/// Index aggregated statuses by node identifier followed by service identifier.
///
/// The catalog and health listings are fetched separately and may disagree;
/// entries missing their node or service are ignored.
pub fn index_statuses(entries: &[ServiceEntry]) -> HashMap<String, HealthStatus> {
    let mut statuses = HashMap::with_capacity(entries.len());

    for entry in entries {
        let (Some(node), Some(service)) = (&entry.node, &entry.service) else {
            continue;
        };
        statuses.insert(format!("{}{}", node.id, service.id), aggregated_status(&entry.checks));
    }

    statuses
}

/// Settings applied while turning registrations into instances
#[derive(Clone, Debug)]
pub struct MergeOptions {
    pub prefix: String,
    pub exposed_by_default: bool,
}

/// Merge the registrations of one service with their health.
///
/// A registration without a health record is kept with status `any`. An
/// instance whose labels cannot be decoded is logged and skipped.
pub fn merge_instances(
    name: &str,
    connect_enabled: bool,
    registrations: &[CatalogService],
    statuses: &HashMap<String, HealthStatus>,
    options: &MergeOptions,
) -> Vec<ServiceInstance> {
    let mut instances = Vec::with_capacity(registrations.len());

    for registration in registrations {
        let address = if registration.service_address.is_empty() {
            registration.address.clone()
        } else {
            registration.service_address.clone()
        };

        let namespace = if registration.namespace.is_empty() {
            "default".to_string()
        } else {
            registration.namespace.clone()
        };

        let status = statuses
            .get(&format!("{}{}", registration.id, registration.service_id))
            .copied()
            .unwrap_or(HealthStatus::Any);

        let labels = tags_to_labels(&registration.service_tags, &options.prefix);

        let extra_conf = match ExtraConfiguration::from_labels(&labels, options.exposed_by_default, connect_enabled) {
            Ok(conf) => conf,
            Err(e) => {
                error!(
                    service_name = %name,
                    service_id = %registration.service_id,
                    "Skip item {}: {}", name, e
                );
                continue;
            }
        };

        instances.push(ServiceInstance {
            id: registration.service_id.clone(),
            node: registration.node.clone(),
            datacenter: registration.datacenter.clone(),
            namespace,
            name: name.to_string(),
            address,
            port: registration.service_port.to_string(),
            status,
            labels,
            tags: registration.service_tags.clone(),
            connect_enabled,
            extra_conf,
        });
    }

    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_api::{AgentService, HealthCheck, Node};

    fn options() -> MergeOptions {
        MergeOptions {
            prefix: "traefik".to_string(),
            exposed_by_default: true,
        }
    }

    fn registration(node_id: &str, service_id: &str) -> CatalogService {
        CatalogService {
            id: node_id.to_string(),
            node: "node-1".to_string(),
            address: "10.0.0.5".to_string(),
            datacenter: "dc1".to_string(),
            service_id: service_id.to_string(),
            service_name: "web".to_string(),
            service_port: 8080,
            ..Default::default()
        }
    }

    fn entry(node_id: &str, service_id: &str, status: &str) -> ServiceEntry {
        ServiceEntry {
            node: Some(Node {
                id: node_id.to_string(),
                ..Default::default()
            }),
            service: Some(AgentService {
                id: service_id.to_string(),
                ..Default::default()
            }),
            checks: vec![HealthCheck {
                check_id: "check".to_string(),
                status: status.to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_index_statuses_ignores_partial_entries() {
        let mut partial = entry("n2", "web-2", "passing");
        partial.service = None;
        let statuses = index_statuses(&[entry("n1", "web-1", "critical"), partial]);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses["n1web-1"], HealthStatus::Critical);
    }

    #[test]
    fn test_missing_health_defaults_to_any() {
        let instances = merge_instances("web", false, &[registration("n1", "web-1")], &HashMap::new(), &options());
        assert_eq!(instances.len(), 1);
        let instance = &instances[0];
        assert_eq!(instance.address, "10.0.0.5");
        assert_eq!(instance.port, "8080");
        assert_eq!(instance.status, HealthStatus::Any);
        assert_eq!(instance.namespace, "default");
    }

    #[test]
    fn test_health_matched_by_node_and_service_id() {
        let statuses = index_statuses(&[entry("n1", "web-1", "warning"), entry("n2", "web-1", "critical")]);
        let instances = merge_instances(
            "web",
            true,
            &[registration("n1", "web-1"), registration("n2", "web-1"), registration("n3", "web-1")],
            &statuses,
            &options(),
        );
        let got: Vec<_> = instances.iter().map(|i| i.status).collect();
        assert_eq!(got, vec![HealthStatus::Warning, HealthStatus::Critical, HealthStatus::Any]);
        assert!(instances.iter().all(|i| i.connect_enabled));
    }

    #[test]
    fn test_service_address_preferred() {
        let mut reg = registration("n1", "web-1");
        reg.service_address = "192.168.1.1".to_string();
        reg.namespace = "team-a".to_string();
        let instances = merge_instances("web", false, &[reg], &HashMap::new(), &options());
        assert_eq!(instances[0].address, "192.168.1.1");
        assert_eq!(instances[0].namespace, "team-a");
    }

    #[test]
    fn test_invalid_labels_skip_only_that_instance() {
        let mut bad = registration("n1", "web-1");
        bad.service_tags = vec!["traefik.enable=perhaps".to_string()];
        let mut good = registration("n2", "web-2");
        good.service_tags = vec!["traefik.enable=true".to_string(), "primary".to_string()];

        let instances = merge_instances("web", false, &[bad, good], &HashMap::new(), &options());
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "web-2");
        assert_eq!(instances[0].tags, vec!["traefik.enable=true", "primary"]);
        assert_eq!(instances[0].labels.len(), 1);
    }
}
