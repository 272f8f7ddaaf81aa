use catalog_client::ClientError;
use catalog_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Catalog client error: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid default rule: {0}")]
    InvalidDefaultRule(#[source] CoreError),

    #[error("Refresh interval must be greater than zero")]
    InvalidRefreshInterval,

    #[error("Configuration channel closed")]
    PublishClosed,

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Provider task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
