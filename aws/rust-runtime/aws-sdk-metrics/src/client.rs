/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! HTTP clients and connectors that record request metrics.

use crate::classify::{classify, RequestClassification};
use crate::error::MetricRegistrationError;
use crate::metrics::{MetricLabels, RequestMetrics};
use aws_smithy_runtime_api::client::connector_metadata::ConnectorMetadata;
use aws_smithy_runtime_api::client::http::{
    HttpClient, HttpConnector, HttpConnectorFuture, HttpConnectorSettings, SharedHttpClient,
    SharedHttpConnector,
};
use aws_smithy_runtime_api::client::orchestrator::{HttpRequest, HttpResponse};
use aws_smithy_runtime_api::client::result::ConnectorError;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_runtime_api::shared::IntoShared;
use prometheus::Registry;
use std::cell::RefCell;
use std::time::Instant;

thread_local! {
    /// Metric sets recording the call currently being handed to a wrapped connector on this
    /// thread.
    static DISPATCHING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Registers `metrics` into `registry` and wraps `client` so that every request it sends is
/// recorded.
///
/// Calling this repeatedly with the same `metrics` and `registry` is fine: registration is
/// idempotent and each request is still counted once, by the client that sent it.
pub fn instrument(
    client: impl HttpClient + 'static,
    metrics: &RequestMetrics,
    registry: &Registry,
) -> Result<InstrumentedHttpClient, MetricRegistrationError> {
    metrics.register(registry)?;
    Ok(InstrumentedHttpClient::new(client, metrics.clone()))
}

/// An [`HttpClient`] whose connectors record request metrics.
///
/// Every connector handed out by the wrapped client is wrapped in an
/// [`InstrumentedConnector`].
#[derive(Clone, Debug)]
pub struct InstrumentedHttpClient {
    inner: SharedHttpClient,
    metrics: RequestMetrics,
}

impl InstrumentedHttpClient {
    /// Wraps `client`. `metrics` is expected to be registered already, see [`instrument`].
    pub fn new(client: impl HttpClient + 'static, metrics: RequestMetrics) -> Self {
        Self {
            inner: client.into_shared(),
            metrics,
        }
    }

    /// Returns the metrics requests are recorded to.
    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }
}

impl HttpClient for InstrumentedHttpClient {
    fn http_connector(
        &self,
        settings: &HttpConnectorSettings,
        components: &RuntimeComponents,
    ) -> SharedHttpConnector {
        InstrumentedConnector {
            inner: self.inner.http_connector(settings, components),
            metrics: self.metrics.clone(),
        }
        .into_shared()
    }

    fn connector_metadata(&self) -> Option<ConnectorMetadata> {
        self.inner.connector_metadata()
    }
}

/// An [`HttpConnector`] that classifies each request, delegates it to the wrapped connector
/// and records the outcome.
///
/// The request and the result of the wrapped connector are passed through unchanged. A
/// request that cannot be classified is still sent and recorded with empty labels. A request
/// that produces no response (a connector error, or a future dropped before completion) is
/// recorded with status code `0`.
///
/// When instrumented connectors sharing the same [`RequestMetrics`] are nested, for example
/// because an already instrumented `SdkConfig` was instrumented again, only the outermost one
/// records the call.
#[derive(Clone, Debug)]
pub struct InstrumentedConnector {
    inner: SharedHttpConnector,
    metrics: RequestMetrics,
}

impl InstrumentedConnector {
    /// Wraps `connector`. `metrics` is expected to be registered already.
    pub fn new(connector: impl HttpConnector + 'static, metrics: RequestMetrics) -> Self {
        Self {
            inner: connector.into_shared(),
            metrics,
        }
    }

    /// Sends `request` and waits for the response.
    ///
    /// Equivalent to awaiting [`HttpConnector::call`].
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ConnectorError> {
        self.call(request).await
    }
}

impl HttpConnector for InstrumentedConnector {
    fn call(&self, request: HttpRequest) -> HttpConnectorFuture {
        let metrics_id = self.metrics.id();
        if DISPATCHING.with(|dispatching| dispatching.borrow().contains(&metrics_id)) {
            tracing::trace!("request is already recorded by an outer instrumented connector");
            return self.inner.call(request);
        }
        let classification = classify(&request);
        let in_flight = InFlightRequest::start(self.metrics.clone(), classification);
        let response = {
            let _dispatch = Dispatch::enter(metrics_id);
            self.inner.call(request)
        };
        HttpConnectorFuture::new(async move {
            let result = response.await;
            in_flight.finish(match &result {
                Ok(response) => response.status().as_u16(),
                Err(_) => 0,
            });
            result
        })
    }
}

/// Marks a metric set as recording the call being dispatched on this thread.
struct Dispatch(usize);

impl Dispatch {
    fn enter(metrics_id: usize) -> Self {
        DISPATCHING.with(|dispatching| dispatching.borrow_mut().push(metrics_id));
        Self(metrics_id)
    }
}

impl Drop for Dispatch {
    fn drop(&mut self) {
        DISPATCHING.with(|dispatching| {
            let mut dispatching = dispatching.borrow_mut();
            if let Some(position) = dispatching.iter().rposition(|id| *id == self.0) {
                dispatching.remove(position);
            }
        });
    }
}

/// Records a request when dropped.
///
/// Dropping without [`finish`](InFlightRequest::finish) records status code `0`, which covers
/// requests whose future was cancelled.
struct InFlightRequest {
    metrics: RequestMetrics,
    labels: MetricLabels,
    start: Instant,
}

impl InFlightRequest {
    fn start(metrics: RequestMetrics, classification: RequestClassification) -> Self {
        Self {
            metrics,
            labels: MetricLabels::new(classification.service, classification.action, 0),
            start: Instant::now(),
        }
    }

    fn finish(mut self, status_code: u16) {
        self.labels.status_code = status_code;
    }
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::trace!(
            service = %self.labels.service,
            action = %self.labels.action,
            status_code = self.labels.status_code,
            elapsed = ?elapsed,
            "recording AWS SDK request"
        );
        self.metrics.record(&self.labels, elapsed);
    }
}
