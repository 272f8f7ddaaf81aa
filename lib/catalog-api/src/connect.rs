//! Connect certificate authority payloads

use crate::nullable;
use serde::{Deserialize, Serialize};

/// Response of `/v1/agent/connect/ca/roots`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaRootList {
    #[serde(rename = "ActiveRootID", default, deserialize_with = "nullable")]
    pub active_root_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub trust_domain: String,
    #[serde(default, deserialize_with = "nullable")]
    pub roots: Vec<CaRoot>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaRoot {
    #[serde(rename = "ID", default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(rename = "RootCertPEM", default, deserialize_with = "nullable")]
    pub root_cert_pem: String,
    #[serde(default)]
    pub active: bool,
}

/// Response of `/v1/agent/connect/ca/leaf/:service`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeafCert {
    #[serde(default, deserialize_with = "nullable")]
    pub serial_number: String,
    #[serde(rename = "CertPEM", default, deserialize_with = "nullable")]
    pub cert_pem: String,
    #[serde(rename = "PrivateKeyPEM", default, deserialize_with = "nullable")]
    pub private_key_pem: String,
    #[serde(default, deserialize_with = "nullable")]
    pub service: String,
    #[serde(rename = "ServiceURI", default, deserialize_with = "nullable")]
    pub service_uri: String,
    #[serde(default, deserialize_with = "nullable")]
    pub valid_after: String,
    #[serde(default, deserialize_with = "nullable")]
    pub valid_before: String,
}

impl CaRootList {
    /// PEM of every root, in catalog order
    pub fn root_pems(&self) -> Vec<String> {
        self.roots.iter().map(|r| r.root_cert_pem.clone()).collect()
    }
}
