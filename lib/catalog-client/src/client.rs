//! Catalog client capability and its HTTP implementation

use crate::{tls, ClientError, EndpointConfig, QueryMeta, QueryOptions, Result};
use async_trait::async_trait;
use catalog_api::{AgentServiceRegistration, CaRootList, CatalogService, LeafCert, ServiceEntry};
use reqwest::{header::HeaderMap, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Operations the synchronization engine needs from the catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Every known service name with the union of its tags
    async fn services(&self, opts: &QueryOptions) -> Result<HashMap<String, Vec<String>>>;

    /// Registrations of one service, through the Connect-capable listing when `connect` is set
    async fn catalog_service(
        &self,
        name: &str,
        tag: Option<&str>,
        connect: bool,
        opts: &QueryOptions,
    ) -> Result<Vec<CatalogService>>;

    /// Registrations of one service together with their health checks
    async fn health_service(
        &self,
        name: &str,
        tag: Option<&str>,
        connect: bool,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> Result<Vec<ServiceEntry>>;

    async fn register_service(&self, registration: &AgentServiceRegistration) -> Result<()>;

    async fn deregister_service(&self, service_id: &str) -> Result<()>;

    /// Connect CA roots, blocking when `opts.wait_index` is set
    async fn connect_ca_roots(&self, opts: &QueryOptions) -> Result<(Option<CaRootList>, QueryMeta)>;

    /// Connect leaf certificate of `service`, blocking when `opts.wait_index` is set
    async fn connect_ca_leaf(&self, service: &str, opts: &QueryOptions) -> Result<(Option<LeafCert>, QueryMeta)>;
}

/// Builds a fresh client; every task owns the client it creates
pub type ClientFactory = Arc<dyn Fn() -> Result<Arc<dyn CatalogClient>> + Send + Sync>;

/// Factory producing [`HttpCatalogClient`]s for `config`
pub fn http_client_factory(config: EndpointConfig) -> ClientFactory {
    Arc::new(move || {
        let client: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(&config)?);
        Ok(client)
    })
}

/// Catalog client speaking the Consul HTTP API
#[derive(Clone, Debug)]
pub struct HttpCatalogClient {
    http: reqwest::Client,
    base: Url,
    datacenter: Option<String>,
    token: Option<String>,
    basic_auth: Option<(String, String)>,
    wait_time: Option<Duration>,
}

impl HttpCatalogClient {
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let base = base_url(config)?;

        let mut builder = reqwest::Client::builder();
        if let Some(tls_config) = &config.tls {
            builder = tls::configure(builder, tls_config)?;
        }
        let http = builder.build()?;

        debug!("Created catalog client for {}", base);

        Ok(Self {
            http,
            base,
            datacenter: config.datacenter.clone().filter(|dc| !dc.is_empty()),
            token: config.token.clone().filter(|t| !t.is_empty()),
            basic_auth: config
                .http_auth
                .as_ref()
                .map(|a| (a.username.clone(), a.password.clone())),
            wait_time: config.endpoint_wait_time,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidConfiguration(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, opts: Option<&QueryOptions>) -> RequestBuilder {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(dc) = &self.datacenter {
            params.push(("dc", dc.clone()));
        }

        let mut wait = None;
        if let Some(opts) = opts {
            params.extend(query_params(opts));
            if opts.wait_index > 0 {
                wait = opts.wait_time.or(self.wait_time);
                if let Some(w) = wait {
                    params.push(("wait", format!("{}ms", w.as_millis())));
                }
            }
        }

        let mut req = self.http.request(method, url).query(&params);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        if let Some((user, pass)) = &self.basic_auth {
            req = req.basic_auth(user, Some(pass));
        }
        if let Some(w) = wait {
            // The server adds up to wait/16 of jitter to blocking queries.
            req = req.timeout(w + w / 16 + Duration::from_secs(5));
        }
        req
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        extra: &[(&str, String)],
        opts: &QueryOptions,
    ) -> Result<(Option<T>, QueryMeta)> {
        let url = self.url(segments)?;
        let response = self.request(Method::GET, url, Some(opts)).query(extra).send().await?;
        let status = response.status();
        let meta = query_meta(response.headers());
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        Ok((decode_body(&body)?, meta))
    }

    async fn put<B: serde::Serialize + ?Sized>(&self, segments: &[&str], body: Option<&B>) -> Result<()> {
        let url = self.url(segments)?;
        let mut req = self.request(Method::PUT, url, None);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn services(&self, opts: &QueryOptions) -> Result<HashMap<String, Vec<String>>> {
        let (services, _) = self
            .get::<HashMap<String, Option<Vec<String>>>>(&["v1", "catalog", "services"], &[], opts)
            .await?;
        Ok(services
            .unwrap_or_default()
            .into_iter()
            .map(|(name, tags)| (name, tags.unwrap_or_default()))
            .collect())
    }

    async fn catalog_service(
        &self,
        name: &str,
        tag: Option<&str>,
        connect: bool,
        opts: &QueryOptions,
    ) -> Result<Vec<CatalogService>> {
        let kind = if connect { "connect" } else { "service" };
        let extra = tag_param(tag);
        let (services, _) = self.get(&["v1", "catalog", kind, name], &extra, opts).await?;
        Ok(services.unwrap_or_default())
    }

    async fn health_service(
        &self,
        name: &str,
        tag: Option<&str>,
        connect: bool,
        passing_only: bool,
        opts: &QueryOptions,
    ) -> Result<Vec<ServiceEntry>> {
        let kind = if connect { "connect" } else { "service" };
        let mut extra = tag_param(tag);
        if passing_only {
            extra.push(("passing", "1".to_string()));
        }
        let (entries, _) = self.get(&["v1", "health", kind, name], &extra, opts).await?;
        Ok(entries.unwrap_or_default())
    }

    async fn register_service(&self, registration: &AgentServiceRegistration) -> Result<()> {
        self.put(&["v1", "agent", "service", "register"], Some(registration)).await
    }

    async fn deregister_service(&self, service_id: &str) -> Result<()> {
        self.put::<()>(&["v1", "agent", "service", "deregister", service_id], None)
            .await
    }

    async fn connect_ca_roots(&self, opts: &QueryOptions) -> Result<(Option<CaRootList>, QueryMeta)> {
        self.get(&["v1", "agent", "connect", "ca", "roots"], &[], opts).await
    }

    async fn connect_ca_leaf(&self, service: &str, opts: &QueryOptions) -> Result<(Option<LeafCert>, QueryMeta)> {
        self.get(&["v1", "agent", "connect", "ca", "leaf", service], &[], opts)
            .await
    }
}

fn base_url(config: &EndpointConfig) -> Result<Url> {
    let address = config.address.trim();
    if address.is_empty() {
        return Err(ClientError::InvalidConfiguration("empty catalog address".to_string()));
    }

    let raw = if address.contains("://") {
        address.to_string()
    } else {
        let scheme = match config.scheme.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ if config.tls.is_some() => "https",
            _ => "http",
        };
        format!("{}://{}", scheme, address)
    };

    let url = Url::parse(&raw)
        .map_err(|e| ClientError::InvalidConfiguration(format!("invalid address {:?}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidConfiguration(format!("unsupported scheme {:?}", other))),
    }
}

fn query_params(opts: &QueryOptions) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if opts.allow_stale {
        params.push(("stale", String::new()));
    }
    if opts.require_consistent {
        params.push(("consistent", String::new()));
    }
    if opts.use_cache {
        params.push(("cached", String::new()));
    }
    if opts.wait_index > 0 {
        params.push(("index", opts.wait_index.to_string()));
    }
    params
}

fn tag_param(tag: Option<&str>) -> Vec<(&'static str, String)> {
    tag.filter(|t| !t.is_empty())
        .map(|t| vec![("tag", t.to_string())])
        .unwrap_or_default()
}

fn query_meta(headers: &HeaderMap) -> QueryMeta {
    let last_index = headers
        .get(INDEX_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    QueryMeta { last_index }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice(body)?)
}
