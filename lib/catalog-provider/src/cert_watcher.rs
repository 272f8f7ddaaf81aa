//! Connect certificate rotation watcher

use crate::{CertificatePublisher, ProviderConfig, ProviderMetrics};
use catalog_client::{tls, ClientFactory, QueryOptions, WatchPayload, WatchPlan};
use catalog_core::{ConnectCertBundle, KeyPair};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatcherState {
    Starting,
    WaitingForFirstPair,
    Steady,
    Stopped,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatcherState::Starting => "starting",
            WatcherState::WaitingForFirstPair => "waiting_for_first_pair",
            WatcherState::Steady => "steady",
            WatcherState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Follows the Connect roots and the leaf certificate of this process and
/// republishes the latest pair on every refresh tick.
pub struct CertificateWatcher {
    factory: ClientFactory,
    service_name: String,
    refresh_interval: Duration,
    options: QueryOptions,
    wait_time: Option<Duration>,
    publisher: CertificatePublisher,
    metrics: ProviderMetrics,
    state: WatcherState,
}

impl CertificateWatcher {
    pub fn new(
        factory: ClientFactory,
        config: &ProviderConfig,
        publisher: CertificatePublisher,
        metrics: ProviderMetrics,
    ) -> Self {
        Self {
            factory,
            service_name: config.service_name.clone(),
            refresh_interval: config.refresh_interval,
            options: config.query_options(),
            wait_time: config.endpoint.endpoint_wait_time,
            publisher,
            metrics,
            state: WatcherState::Starting,
        }
    }

    fn transition(&mut self, next: WatcherState) {
        debug!(service_name = %self.service_name, from = %self.state, to = %next, "Certificate watcher transition");
        self.state = next;
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let client = match (self.factory)() {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to create catalog client for the certificate watcher");
                self.transition(WatcherState::Stopped);
                return;
            }
        };

        let watches = cancel.child_token();
        let _stop_watches = watches.clone().drop_guard();

        let (roots_tx, mut roots_rx) = mpsc::unbounded_channel();
        let (leaf_tx, mut leaf_rx) = mpsc::unbounded_channel();

        tokio::spawn(WatchPlan::ConnectRoots.run(
            client.clone(),
            self.options.clone(),
            self.wait_time,
            move |payload| {
                if let Some(roots) = decode_roots(payload) {
                    let _ = roots_tx.send(roots);
                }
            },
            watches.clone(),
        ));

        tokio::spawn(
            WatchPlan::ConnectLeaf {
                service: self.service_name.clone(),
            }
            .run(
                client,
                self.options.clone(),
                self.wait_time,
                move |payload| {
                    if let Some(leaf) = decode_leaf(payload) {
                        let _ = leaf_tx.send(leaf);
                    }
                },
                watches.clone(),
            ),
        );

        self.transition(WatcherState::WaitingForFirstPair);

        let mut first_roots = None;
        let mut first_leaf = None;
        while first_roots.is_none() || first_leaf.is_none() {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.transition(WatcherState::Stopped);
                    return;
                }
                Some(r) = roots_rx.recv() => first_roots = Some(r),
                Some(l) = leaf_rx.recv() => first_leaf = Some(l),
            }
        }
        let (Some(mut roots), Some(mut leaf)) = (first_roots, first_leaf) else {
            return;
        };

        info!(service_name = %self.service_name, roots = roots.len(), "Received first Connect certificate pair");
        self.transition(WatcherState::Steady);
        self.publish(&roots, &leaf);

        let mut ticker = interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(r) = roots_rx.recv() => {
                    debug!(roots = r.len(), "Connect roots rotated");
                    roots = r;
                }
                Some(l) = leaf_rx.recv() => {
                    debug!(service_name = %self.service_name, "Connect leaf certificate rotated");
                    leaf = l;
                }
                _ = ticker.tick() => self.publish(&roots, &leaf),
            }
        }

        self.transition(WatcherState::Stopped);
    }

    fn publish(&self, roots: &[String], leaf: &KeyPair) {
        let bundle = ConnectCertBundle::new(self.service_name.clone(), roots.to_vec(), leaf.clone());
        if !self.publisher.publish(bundle) {
            debug!("No consumer for the certificate bundle");
        }
        self.metrics.cert_bundles_published_total.inc();
    }
}

/// Root PEMs of a roots payload; the list is replaced wholesale on each update
fn decode_roots(payload: Option<WatchPayload>) -> Option<Vec<String>> {
    let list = match payload? {
        WatchPayload::Roots(list) => list,
        WatchPayload::Leaf(_) => {
            error!("Invalid result for root certificate watcher: got a leaf certificate");
            return None;
        }
    };

    let roots = list.root_pems();
    if roots.is_empty() {
        error!("Invalid result for root certificate watcher: no roots");
        return None;
    }
    for pem in &roots {
        if let Err(e) = tls::load_certificates(pem.as_bytes()) {
            error!(error = %e, "Invalid result for root certificate watcher");
            return None;
        }
    }

    Some(roots)
}

fn decode_leaf(payload: Option<WatchPayload>) -> Option<KeyPair> {
    let leaf = match payload? {
        WatchPayload::Leaf(leaf) => leaf,
        WatchPayload::Roots(_) => {
            error!("Invalid result for leaf certificate watcher: got roots");
            return None;
        }
    };

    if let Err(e) = tls::load_certificates(leaf.cert_pem.as_bytes()) {
        error!(error = %e, "Invalid result for leaf certificate watcher");
        return None;
    }
    if let Err(e) = tls::load_private_key(leaf.private_key_pem.as_bytes()) {
        error!(error = %e, "Invalid result for leaf certificate watcher");
        return None;
    }

    Some(KeyPair {
        cert: leaf.cert_pem,
        key: leaf.private_key_pem,
    })
}
