//! Client for the Consul catalog HTTP API
pub mod client;
pub mod config;
pub mod duration;
pub mod error;
pub mod tls;
pub mod watch;

pub use client::{http_client_factory, CatalogClient, ClientFactory, HttpCatalogClient};
pub use config::{ClientTls, EndpointConfig, HttpAuth, QueryMeta, QueryOptions};
pub use error::{ClientError, Result};
pub use watch::{sleep_or_cancel, WatchPayload, WatchPlan};
