//! Health listings and the aggregated status rollup

use crate::nullable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Check identifier used by node maintenance mode
pub const NODE_MAINTENANCE: &str = "_node_maintenance";
/// Prefix of check identifiers used by service maintenance mode
pub const SERVICE_MAINTENANCE_PREFIX: &str = "_service_maintenance:";

/// Health status of a check or of an aggregated instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Passing,
    Warning,
    Critical,
    Maintenance,
    /// Unknown or unfiltered
    #[default]
    Any,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Passing => "passing",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Maintenance => "maintenance",
            HealthStatus::Any => "any",
        }
    }

    /// Parse a check status. Unrecognized values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "passing" => Some(HealthStatus::Passing),
            "warning" => Some(HealthStatus::Warning),
            "critical" => Some(HealthStatus::Critical),
            "maintenance" => Some(HealthStatus::Maintenance),
            "any" => Some(HealthStatus::Any),
            _ => None,
        }
    }

    /// Whether the instance may receive traffic
    pub fn is_serving(&self) -> bool {
        matches!(self, HealthStatus::Passing | HealthStatus::Warning)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of `/v1/health/service/:name` and `/v1/health/connect/:name`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEntry {
    #[serde(default)]
    pub node: Option<Node>,
    #[serde(default)]
    pub service: Option<AgentService>,
    #[serde(default, deserialize_with = "nullable")]
    pub checks: Vec<HealthCheck>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    #[serde(rename = "ID", default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub node: String,
    #[serde(default, deserialize_with = "nullable")]
    pub address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub datacenter: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    #[serde(rename = "ID", default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub port: u16,
    #[serde(default, deserialize_with = "nullable")]
    pub address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(default, deserialize_with = "nullable")]
    pub node: String,
    #[serde(rename = "CheckID", default, deserialize_with = "nullable")]
    pub check_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Raw status; kept as a string so unknown values survive decoding
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
    #[serde(rename = "ServiceID", default, deserialize_with = "nullable")]
    pub service_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service_name: String,
}

/// Roll the checks of one instance up into a single status.
///
/// Maintenance wins over critical, critical over warning, warning over
/// passing. No checks at all counts as passing. A check with a status
/// outside the known set makes the whole rollup unknown.
pub fn aggregated_status(checks: &[HealthCheck]) -> HealthStatus {
    let (mut warning, mut critical, mut maintenance) = (false, false, false);

    for check in checks {
        if check.check_id == NODE_MAINTENANCE || check.check_id.starts_with(SERVICE_MAINTENANCE_PREFIX) {
            maintenance = true;
            continue;
        }

        match HealthStatus::parse(&check.status) {
            Some(HealthStatus::Passing) => {}
            Some(HealthStatus::Warning) => warning = true,
            Some(HealthStatus::Critical) => critical = true,
            _ => return HealthStatus::Any,
        }
    }

    if maintenance {
        HealthStatus::Maintenance
    } else if critical {
        HealthStatus::Critical
    } else if warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Passing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, status: &str) -> HealthCheck {
        HealthCheck {
            check_id: id.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_aggregated_status_empty_is_passing() {
        assert_eq!(aggregated_status(&[]), HealthStatus::Passing);
    }

    #[test]
    fn test_aggregated_status_precedence() {
        let checks = vec![check("a", "passing"), check("b", "warning")];
        assert_eq!(aggregated_status(&checks), HealthStatus::Warning);

        let checks = vec![check("a", "warning"), check("b", "critical"), check("c", "passing")];
        assert_eq!(aggregated_status(&checks), HealthStatus::Critical);

        let checks = vec![check("a", "critical"), check("_service_maintenance:web-1", "critical")];
        assert_eq!(aggregated_status(&checks), HealthStatus::Maintenance);

        let checks = vec![check(NODE_MAINTENANCE, "critical"), check("a", "passing")];
        assert_eq!(aggregated_status(&checks), HealthStatus::Maintenance);
    }

    #[test]
    fn test_aggregated_status_unknown_check() {
        let checks = vec![check("a", "passing"), check("b", "flapping")];
        assert_eq!(aggregated_status(&checks), HealthStatus::Any);
    }

    #[test]
    fn test_health_status_serde() {
        assert_eq!(serde_json::to_string(&HealthStatus::Any).unwrap(), "\"any\"");
        let s: HealthStatus = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(s, HealthStatus::Warning);
        assert!(HealthStatus::Warning.is_serving());
        assert!(!HealthStatus::Any.is_serving());
    }

    #[test]
    fn test_decode_service_entry() {
        let raw = r#"[{
            "Node": {"ID": "n1", "Node": "node-1", "Address": "10.0.0.5", "Datacenter": "dc1"},
            "Service": {"ID": "web-1", "Service": "web", "Tags": null, "Port": 80},
            "Checks": [{"Node": "node-1", "CheckID": "serfHealth", "Status": "passing"}]
        }, {"Node": null, "Service": null, "Checks": null}]"#;
        let entries: Vec<ServiceEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].node.as_ref().unwrap().id, "n1");
        assert_eq!(entries[0].service.as_ref().unwrap().id, "web-1");
        assert!(entries[1].node.is_none());
        assert!(entries[1].checks.is_empty());
    }
}
