//! Certificate bundle handoff between the rotation watcher and the polling loop

use catalog_core::ConnectCertBundle;
use std::sync::Arc;
use tokio::sync::watch;

type Slot = Option<Arc<ConnectCertBundle>>;

/// Create a connected publisher and feed pair
pub fn certificate_channel() -> (CertificatePublisher, CertificateFeed) {
    let (tx, rx) = watch::channel(None);
    (CertificatePublisher { tx }, CertificateFeed { rx })
}

/// Producing half, owned by the certificate watcher. Never blocks.
#[derive(Debug)]
pub struct CertificatePublisher {
    tx: watch::Sender<Slot>,
}

impl CertificatePublisher {
    /// Replace the current bundle; false when no feed is left
    pub fn publish(&self, bundle: ConnectCertBundle) -> bool {
        self.tx.send_replace(Some(Arc::new(bundle)));
        self.tx.receiver_count() > 0
    }
}

/// Consuming half; only the latest bundle is ever observed.
#[derive(Clone, Debug)]
pub struct CertificateFeed {
    rx: watch::Receiver<Slot>,
}

impl CertificateFeed {
    /// Wait for the first bundle, or return the current one.
    ///
    /// `None` once the publisher is gone without ever publishing.
    pub async fn first(&mut self) -> Option<Arc<ConnectCertBundle>> {
        let current = self.rx.wait_for(Option::is_some).await.ok()?;
        current.clone()
    }

    /// Wait for a bundle newer than the last one observed
    pub async fn next(&mut self) -> Option<Arc<ConnectCertBundle>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    pub fn latest(&self) -> Option<Arc<ConnectCertBundle>> {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::KeyPair;
    use std::time::Duration;

    fn bundle(serial: &str) -> ConnectCertBundle {
        ConnectCertBundle::new(
            "traefik",
            vec!["root".to_string()],
            KeyPair {
                cert: serial.to_string(),
                key: "key".to_string(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_waits_for_publish() {
        let (publisher, mut feed) = certificate_channel();
        assert!(feed.latest().is_none());

        let waiter = tokio::spawn(async move { feed.first().await });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        publisher.publish(bundle("a"));
        let first = waiter.await.unwrap().unwrap();
        assert_eq!(first.leaf.cert, "a");
    }

    #[tokio::test]
    async fn test_last_value_wins() {
        let (publisher, mut feed) = certificate_channel();
        publisher.publish(bundle("a"));
        assert_eq!(feed.first().await.unwrap().leaf.cert, "a");

        publisher.publish(bundle("b"));
        publisher.publish(bundle("c"));
        assert_eq!(feed.next().await.unwrap().leaf.cert, "c");
        assert_eq!(feed.latest().unwrap().leaf.cert, "c");
    }

    #[tokio::test]
    async fn test_first_returns_current_bundle() {
        let (publisher, mut feed) = certificate_channel();
        publisher.publish(bundle("a"));
        assert_eq!(feed.first().await.unwrap().leaf.cert, "a");
        assert_eq!(feed.first().await.unwrap().leaf.cert, "a");
    }

    #[tokio::test]
    async fn test_closed_publisher() {
        let (publisher, mut feed) = certificate_channel();
        drop(publisher);
        assert!(feed.first().await.is_none());
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_feed() {
        let (publisher, feed) = certificate_channel();
        assert!(publisher.publish(bundle("a")));
        drop(feed);
        assert!(!publisher.publish(bundle("b")));
    }
}
