//! Agent-local service registration

use serde::{Deserialize, Serialize};

/// Body of `PUT /v1/agent/service/register`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    /// Empty string is the "typical" service kind
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<AgentServiceConnect>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceConnect {
    /// The service speaks Connect mTLS itself, no sidecar proxy
    #[serde(default)]
    pub native: bool,
}

impl AgentServiceRegistration {
    /// Registration of a Connect-native service
    pub fn connect_native(id: impl Into<String>, name: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            kind: String::new(),
            name: name.into(),
            port,
            tags: Vec::new(),
            connect: Some(AgentServiceConnect { native: true }),
        }
    }
}
