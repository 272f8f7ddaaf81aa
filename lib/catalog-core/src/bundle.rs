//! Connect certificate material

/// PEM certificate and private key issued for this process
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyPair {
    pub cert: String,
    pub key: String,
}

/// Latest Connect roots and leaf for one service identity.
///
/// Never mutated: every rotation produces a new bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectCertBundle {
    pub service: String,
    pub roots: Vec<String>,
    pub leaf: KeyPair,
}

impl ConnectCertBundle {
    pub fn new(service: impl Into<String>, roots: Vec<String>, leaf: KeyPair) -> Self {
        Self {
            service: service.into(),
            roots,
            leaf,
        }
    }
}
