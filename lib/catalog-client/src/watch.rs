//! Blocking-query watches over the Connect CA endpoints

use crate::{CatalogClient, QueryMeta, QueryOptions, Result};
use catalog_api::{CaRootList, LeafCert};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RETRY_INITIAL: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(20);

/// What a watch follows
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchPlan {
    ConnectRoots,
    ConnectLeaf { service: String },
}

/// Value delivered to a watch handler
#[derive(Clone, Debug, PartialEq)]
pub enum WatchPayload {
    Roots(CaRootList),
    Leaf(LeafCert),
}

impl WatchPlan {
    fn describe(&self) -> String {
        match self {
            WatchPlan::ConnectRoots => "connect_roots".to_string(),
            WatchPlan::ConnectLeaf { service } => format!("connect_leaf({})", service),
        }
    }

    async fn fetch(
        &self,
        client: &dyn CatalogClient,
        opts: &QueryOptions,
    ) -> Result<(Option<WatchPayload>, QueryMeta)> {
        match self {
            WatchPlan::ConnectRoots => {
                let (roots, meta) = client.connect_ca_roots(opts).await?;
                Ok((roots.map(WatchPayload::Roots), meta))
            }
            WatchPlan::ConnectLeaf { service } => {
                let (leaf, meta) = client.connect_ca_leaf(service, opts).await?;
                Ok((leaf.map(WatchPayload::Leaf), meta))
            }
        }
    }

    /// Follow this plan until `cancel` fires.
    ///
    /// `handler` runs on the first response and on every index change. Query
    /// errors are retried after a delay doubling from one to twenty seconds.
    pub async fn run<F>(
        self,
        client: Arc<dyn CatalogClient>,
        opts: QueryOptions,
        wait: Option<Duration>,
        mut handler: F,
        cancel: CancellationToken,
    ) where
        F: FnMut(Option<WatchPayload>) + Send,
    {
        let plan = self.describe();
        let mut index = 0u64;
        let mut fired = false;
        let mut retry = RETRY_INITIAL;

        loop {
            let query = opts.blocking(index, wait);
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.fetch(client.as_ref(), &query) => result,
            };

            let (payload, meta) = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(watch = %plan, error = %e, retry_ms = retry.as_millis() as u64, "Watch query failed");
                    if sleep_or_cancel(&cancel, retry).await {
                        break;
                    }
                    retry = (retry * 2).min(RETRY_MAX);
                    continue;
                }
            };
            retry = RETRY_INITIAL;

            let previous = index;
            index = meta.last_index;
            let changed = !fired || index != previous;
            if index < previous {
                debug!(watch = %plan, previous, index, "Watch index went backwards, resetting");
                index = 0;
            }

            if changed {
                fired = true;
                handler(payload);
            }

            // Without an index the next query cannot block.
            if meta.last_index == 0 {
                debug!(watch = %plan, delay_ms = RETRY_INITIAL.as_millis() as u64, "Watch response carried no index");
                if sleep_or_cancel(&cancel, RETRY_INITIAL).await {
                    break;
                }
            }
        }

        debug!(watch = %plan, "Watch stopped");
    }
}

/// Sleep for `dur` unless `token` fires first; true when cancelled.
pub async fn sleep_or_cancel(token: &CancellationToken, dur: Duration) -> bool {
    tokio::select! {
        () = token.cancelled() => true,
        () = sleep(dur) => false,
    }
}
