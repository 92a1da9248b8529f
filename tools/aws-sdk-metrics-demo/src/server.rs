/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub(crate) const METRICS_PATH: &str = "/metrics";

/// Connections that do not send complete request headers in time are closed.
pub(crate) const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves the text exposition of `registry` on `GET /metrics` until the listener fails.
pub(crate) async fn serve_metrics(addr: SocketAddr, registry: Registry) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, path = METRICS_PATH, "serving metrics");
    serve(listener, registry, HEADER_READ_TIMEOUT).await
}

async fn serve(
    listener: TcpListener,
    registry: Registry,
    header_read_timeout: Duration,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "new connection");
        let io = TokioIo::new(stream);
        let registry = registry.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = route(&registry, &req);
                async move { Ok::<_, Infallible>(response) }
            });
            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .header_read_timeout(header_read_timeout)
                .serve_connection(io, service)
                .await
            {
                debug!("error serving connection: {:?}", err);
            }
        });
    }
}

fn route<B>(registry: &Registry, req: &Request<B>) -> Response<Full<Bytes>> {
    if req.uri().path() != METRICS_PATH {
        return status(StatusCode::NOT_FOUND);
    }
    if req.method() != Method::GET {
        return status(StatusCode::METHOD_NOT_ALLOWED);
    }
    match render_metrics(registry) {
        Ok(body) => Response::builder()
            .header(CONTENT_TYPE, TextEncoder::new().format_type())
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| status(StatusCode::INTERNAL_SERVER_ERROR)),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn status(code: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = code;
    response
}

/// Encodes everything gathered from `registry` in the Prometheus text format.
pub(crate) fn render_metrics(registry: &Registry) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}
