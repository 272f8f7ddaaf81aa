use anyhow::{Context, Result};
use catalog_provider::ProviderConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

pub const CONFIG_ENV: &str = "CATALOG_SYNC_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "catalog-sync.yaml";

/// Daemon settings file
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Serves `/metrics` and `/healthz` when set
    #[serde(default)]
    pub metrics_address: Option<SocketAddr>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Settings {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}
