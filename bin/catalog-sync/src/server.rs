use anyhow::Result;
use catalog_provider::ProviderMetrics;
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::tokio::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Serve `/metrics` and `/healthz` until `cancel` fires
pub async fn serve(addr: SocketAddr, metrics: ProviderMetrics, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let metrics = Arc::new(metrics);

    loop {
        let (stream, peer_addr) = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Error accepting metrics connection: {}", e);
                    continue;
                }
            },
        };
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, metrics.clone()));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving metrics connection from {}: {}", peer_addr, e);
            }
        });
    }

    debug!("Metrics server stopped");
    Ok(())
}

async fn handle_request<B>(req: Request<B>, metrics: Arc<ProviderMetrics>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    debug!("{} {}", req.method(), path);

    let response = match (req.method(), path) {
        (&Method::GET, "/metrics") => match metrics.gather() {
            Ok(text) => {
                let mut response = Response::new(Full::new(Bytes::from(text)));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
                response
            }
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                status_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics\n")
            }
        },
        (_, "/healthz") => status_response(StatusCode::OK, "OK\n"),
        _ => status_response(StatusCode::NOT_FOUND, "Not Found\n"),
    };

    Ok(response)
}

fn status_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
