//! PEM handling for catalog TLS and Connect certificates

use crate::{ClientError, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, read_all, Item};
use std::io::BufReader;
use tracing::debug;

/// Load certificates from PEM-encoded data
pub fn load_certificates(pem_data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(pem_data);
    let certs = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ClientError::Tls(format!("Failed to parse certificates: {}", e)))?;

    if certs.is_empty() {
        return Err(ClientError::Tls("No certificates found in PEM data".to_string()));
    }
    Ok(certs)
}

/// Load the first private key from PEM-encoded data
pub fn load_private_key(pem_data: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(pem_data);
    let items: Vec<_> = read_all(&mut reader)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| ClientError::Tls(format!("Failed to parse private key: {}", e)))?;

    for item in items {
        match item {
            Item::Pkcs8Key(k) => return Ok(PrivateKeyDer::Pkcs8(k)),
            Item::Sec1Key(k) => return Ok(PrivateKeyDer::Sec1(k)),
            Item::Pkcs1Key(k) => return Ok(PrivateKeyDer::Pkcs1(k)),
            _ => {}
        }
    }

    Err(ClientError::Tls("No private key found in PEM data".to_string()))
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ClientError::Io {
        path: path.to_string(),
        source,
    })
}

/// Apply the endpoint TLS settings to a reqwest client builder
pub(crate) fn configure(
    mut builder: reqwest::ClientBuilder,
    tls: &crate::ClientTls,
) -> Result<reqwest::ClientBuilder> {
    builder = builder.use_rustls_tls();

    if let Some(ca_path) = &tls.ca {
        let ca_certs = load_certificates(&read_file(ca_path)?)?;
        debug!("Loaded {} CA certificate(s) from {}", ca_certs.len(), ca_path);
        for cert in ca_certs {
            builder = builder.add_root_certificate(reqwest::Certificate::from_der(cert.as_ref())?);
        }
    }

    match (&tls.cert, &tls.key) {
        (Some(cert_path), Some(key_path)) => {
            let cert_pem = read_file(cert_path)?;
            let key_pem = read_file(key_path)?;
            load_certificates(&cert_pem)?;
            load_private_key(&key_pem)?;

            let mut identity_pem = cert_pem;
            identity_pem.push(b'\n');
            identity_pem.extend_from_slice(&key_pem);
            builder = builder.identity(reqwest::Identity::from_pem(&identity_pem)?);
            debug!("Loaded client identity from {} and {}", cert_path, key_path);
        }
        (None, None) => {}
        _ => {
            return Err(ClientError::InvalidConfiguration(
                "tls.cert and tls.key must be set together".to_string(),
            ))
        }
    }

    if tls.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder)
}
