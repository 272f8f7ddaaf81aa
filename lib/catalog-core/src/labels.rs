//! Tag to label conversion and per-instance configuration carried in labels

use crate::{CoreError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Prefix every label is rewritten to, whatever prefix the tags use
pub const NEUTRAL_PREFIX: &str = "traefik";

const ENABLE_LABEL: &str = "traefik.enable";
const CONNECT_LABEL: &str = "traefik.consulcatalog.connect";
const ROUTERS_PREFIX: &str = "traefik.http.routers.";
const SERVICES_PREFIX: &str = "traefik.http.services.";

/// Convert `key=value` tags into labels.
///
/// The first `<prefix>.` of each tag is rewritten to `traefik.`. Tags without
/// `=` carry no label. A later tag wins over an earlier tag with the same key.
pub fn tags_to_labels(tags: &[String], prefix: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    let from = format!("{}.", prefix);
    let to = format!("{}.", NEUTRAL_PREFIX);

    for tag in tags {
        let tag = if prefix != NEUTRAL_PREFIX {
            tag.replacen(&from, &to, 1)
        } else {
            tag.clone()
        };

        if let Some((key, value)) = tag.split_once('=') {
            labels.insert(key.to_string(), value.to_string());
        }
    }

    labels
}

/// Router settings read from `traefik.http.routers.<name>.*`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RouterLabels {
    pub rule: Option<String>,
    pub entry_points: Vec<String>,
    pub service: Option<String>,
    pub priority: Option<i32>,
}

/// Service settings read from `traefik.http.services.<name>.loadbalancer.*`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ServiceLabels {
    pub port: Option<u16>,
    pub scheme: Option<String>,
    pub pass_host_header: Option<bool>,
}

/// Values an instance overrides through its labels
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExtraConfiguration {
    pub enable: bool,
    pub connect: bool,
    pub routers: BTreeMap<String, RouterLabels>,
    pub services: BTreeMap<String, ServiceLabels>,
}

impl ExtraConfiguration {
    /// Decode the labels of one instance.
    ///
    /// `enable` defaults to `exposed_by_default` and `connect` to the mode the
    /// service name was resolved with. Unknown labels are ignored; malformed
    /// values are errors.
    pub fn from_labels(
        labels: &BTreeMap<String, String>,
        exposed_by_default: bool,
        connect_enabled: bool,
    ) -> Result<Self> {
        let mut conf = ExtraConfiguration {
            enable: exposed_by_default,
            connect: connect_enabled,
            ..Default::default()
        };

        for (key, value) in labels {
            if key.eq_ignore_ascii_case(ENABLE_LABEL) {
                conf.enable = parse_bool(key, value)?;
            } else if key.eq_ignore_ascii_case(CONNECT_LABEL) {
                conf.connect = parse_bool(key, value)?;
            } else if let Some(rest) = strip_prefix_ignore_case(key, ROUTERS_PREFIX) {
                let (name, field) = split_name(key, rest)?;
                let router = conf.routers.entry(name.to_string()).or_default();
                match field.to_ascii_lowercase().as_str() {
                    "rule" => router.rule = Some(value.clone()),
                    "entrypoints" => {
                        router.entry_points = value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect()
                    }
                    "service" => router.service = Some(value.clone()),
                    "priority" => {
                        router.priority = Some(value.trim().parse().map_err(|e| CoreError::InvalidLabel {
                            key: key.clone(),
                            reason: format!("{}", e),
                        })?)
                    }
                    _ => {}
                }
            } else if let Some(rest) = strip_prefix_ignore_case(key, SERVICES_PREFIX) {
                let (name, field) = split_name(key, rest)?;
                let service = conf.services.entry(name.to_string()).or_default();
                match field.to_ascii_lowercase().as_str() {
                    "loadbalancer.server.port" => {
                        service.port = Some(value.trim().parse().map_err(|e| CoreError::InvalidLabel {
                            key: key.clone(),
                            reason: format!("{}", e),
                        })?)
                    }
                    "loadbalancer.server.scheme" => service.scheme = Some(value.clone()),
                    "loadbalancer.passhostheader" => service.pass_host_header = Some(parse_bool(key, value)?),
                    _ => {}
                }
            }
        }

        Ok(conf)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(CoreError::InvalidLabel {
            key: key.to_string(),
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}

fn strip_prefix_ignore_case<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    if key.len() >= prefix.len()
        && key.is_char_boundary(prefix.len())
        && key[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&key[prefix.len()..])
    } else {
        None
    }
}

fn split_name<'a>(key: &str, rest: &'a str) -> Result<(&'a str, &'a str)> {
    match rest.split_once('.') {
        Some((name, field)) if !name.is_empty() && !field.is_empty() => Ok((name, field)),
        _ => Err(CoreError::InvalidLabel {
            key: key.to_string(),
            reason: "missing name or field".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tags_to_labels() {
        let labels = tags_to_labels(&tags(&["traefik.enable=true", "primary", "env=prod"]), "traefik");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["traefik.enable"], "true");
        assert_eq!(labels["env"], "prod");
    }

    #[test]
    fn test_tags_to_labels_custom_prefix() {
        let labels = tags_to_labels(&tags(&["edge.http.routers.a.rule=Path(`/a=b`)"]), "edge");
        assert_eq!(labels["traefik.http.routers.a.rule"], "Path(`/a=b`)");
    }

    #[test]
    fn test_tags_to_labels_later_wins() {
        let labels = tags_to_labels(&tags(&["k=1", "k=2"]), "traefik");
        assert_eq!(labels["k"], "2");
    }

    #[test]
    fn test_extra_configuration_defaults() {
        let conf = ExtraConfiguration::from_labels(&BTreeMap::new(), true, false).unwrap();
        assert!(conf.enable);
        assert!(!conf.connect);
        assert!(conf.routers.is_empty());
    }

    #[test]
    fn test_extra_configuration_routers_and_services() {
        let labels = tags_to_labels(
            &tags(&[
                "traefik.enable=false",
                "traefik.consulcatalog.connect=true",
                "traefik.http.routers.api.rule=PathPrefix(`/api`)",
                "traefik.http.routers.api.entrypoints=web, websecure",
                "traefik.http.routers.api.priority=10",
                "traefik.http.services.api-svc.loadbalancer.server.port=9090",
            ]),
            "traefik",
        );
        let conf = ExtraConfiguration::from_labels(&labels, true, false).unwrap();
        assert!(!conf.enable);
        assert!(conf.connect);
        let router = &conf.routers["api"];
        assert_eq!(router.rule.as_deref(), Some("PathPrefix(`/api`)"));
        assert_eq!(router.entry_points, vec!["web", "websecure"]);
        assert_eq!(router.priority, Some(10));
        assert_eq!(conf.services["api-svc"].port, Some(9090));
    }

    #[test]
    fn test_extra_configuration_invalid_values() {
        let labels = tags_to_labels(&tags(&["traefik.enable=maybe"]), "traefik");
        assert!(ExtraConfiguration::from_labels(&labels, true, false).is_err());

        let labels = tags_to_labels(&tags(&["traefik.http.services.s.loadbalancer.server.port=http"]), "traefik");
        assert!(ExtraConfiguration::from_labels(&labels, true, false).is_err());

        let labels = tags_to_labels(&tags(&["traefik.http.routers.rule=Host(`x`)"]), "traefik");
        assert!(ExtraConfiguration::from_labels(&labels, true, false).is_err());
    }
}
