//! Configuration builder turning service instances into a snapshot

use crate::dynamic::{Certificate, Configuration, Router, Server, ServersTransport, Service};
use crate::rule::{normalize, DefaultRuleTemplate};
use crate::{ConnectCertBundle, ServiceInstance};
use tracing::{debug, warn};

/// Builds the dynamic configuration for one batch of instances
#[derive(Clone, Debug, Default)]
pub struct ConfigurationBuilder {
    default_rule: DefaultRuleTemplate,
}

impl ConfigurationBuilder {
    pub fn new(default_rule: DefaultRuleTemplate) -> Self {
        Self { default_rule }
    }

    /// Build a snapshot.
    ///
    /// Only enabled instances with a passing or warning status are kept.
    /// Connect instances need `cert`; without it they are skipped. Output maps
    /// are ordered so an unchanged input always yields the same snapshot.
    pub fn build(&self, instances: &[ServiceInstance], cert: Option<&ConnectCertBundle>) -> Configuration {
        let mut conf = Configuration::default();

        for item in instances {
            if !item.extra_conf.enable {
                debug!(service_name = %item.name, service_id = %item.id, "Filtering disabled item");
                continue;
            }

            if !item.status.is_serving() {
                debug!(
                    service_name = %item.name,
                    service_id = %item.id,
                    status = %item.status,
                    "Filtering unhealthy or starting item"
                );
                continue;
            }

            let connect = item.extra_conf.connect;
            if connect && cert.is_none() {
                warn!(
                    service_name = %item.name,
                    service_id = %item.id,
                    "Skipping Connect item: no certificate bundle available yet"
                );
                continue;
            }

            let service_names: Vec<String> = if item.extra_conf.services.is_empty() {
                vec![normalize(&item.name)]
            } else {
                item.extra_conf.services.keys().cloned().collect()
            };

            for service_name in &service_names {
                let labels = item.extra_conf.services.get(service_name);
                let port = labels
                    .and_then(|l| l.port)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| item.port.clone());
                let scheme = labels
                    .and_then(|l| l.scheme.clone())
                    .unwrap_or_else(|| if connect { "https" } else { "http" }.to_string());

                let service = conf.http.services.entry(service_name.clone()).or_insert_with(Service::default);
                if let Some(pass) = labels.and_then(|l| l.pass_host_header) {
                    service.load_balancer.pass_host_header = pass;
                }
                service.load_balancer.servers.push(Server {
                    url: format!("{}://{}:{}", scheme, host(&item.address), port),
                });

                if let (true, Some(bundle)) = (connect, cert) {
                    let transport_name = format!("tls-{}-{}-{}", item.namespace, item.datacenter, normalize(&item.name));
                    conf.http
                        .servers_transports
                        .entry(transport_name.clone())
                        .or_insert_with(|| connect_transport(item, bundle));
                    service.load_balancer.servers_transport = Some(transport_name);
                }
            }

            if item.extra_conf.routers.is_empty() {
                if service_names.len() != 1 {
                    warn!(
                        service_name = %item.name,
                        "Could not create a router for the item: too many services"
                    );
                    continue;
                }
                conf.http.routers.entry(normalize(&item.name)).or_insert_with(|| Router {
                    entry_points: Vec::new(),
                    rule: self.default_rule.render(&item.name, &item.labels),
                    service: service_names[0].clone(),
                    priority: None,
                });
                continue;
            }

            for (router_name, labels) in &item.extra_conf.routers {
                let service = match (&labels.service, service_names.len()) {
                    (Some(service), _) => service.clone(),
                    (None, 1) => service_names[0].clone(),
                    (None, _) => {
                        warn!(
                            service_name = %item.name,
                            router = %router_name,
                            "Could not define the service name for the router: too many services"
                        );
                        continue;
                    }
                };

                conf.http.routers.entry(router_name.clone()).or_insert_with(|| Router {
                    entry_points: labels.entry_points.clone(),
                    rule: labels
                        .rule
                        .clone()
                        .unwrap_or_else(|| self.default_rule.render(&item.name, &item.labels)),
                    service,
                    priority: labels.priority,
                });
            }
        }

        for service in conf.http.services.values_mut() {
            service.load_balancer.servers.sort();
            service.load_balancer.servers.dedup();
        }

        conf
    }
}

fn host(address: &str) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{}]", address)
    } else {
        address.to_string()
    }
}

fn connect_transport(item: &ServiceInstance, bundle: &ConnectCertBundle) -> ServersTransport {
    ServersTransport {
        server_name: format!("{}-{}-{}", item.namespace, item.datacenter, item.name),
        insecure_skip_verify: true,
        root_cas: bundle.roots.clone(),
        certificates: vec![Certificate {
            cert_file: bundle.leaf.cert.clone(),
            key_file: bundle.leaf.key.clone(),
        }],
        peer_cert_uri: format!(
            "spiffe:///ns/{}/dc/{}/svc/{}",
            item.namespace, item.datacenter, item.name
        ),
    }
}
