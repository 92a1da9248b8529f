/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Request count and latency collectors.

use crate::error::MetricRegistrationError;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Name of the request counter.
pub const REQUESTS_TOTAL: &str = "aws_sdk_requests_total";

/// Name of the request latency histogram.
pub const REQUEST_LATENCY_MS: &str = "aws_sdk_request_latency_ms";

const LABEL_NAMES: [&str; 3] = ["service", "action", "status_code"];

/// Latency histogram bucket boundaries, in milliseconds.
///
/// Buckets are dense below 300ms and sparse up to 10s.
pub const LATENCY_BUCKETS_MS: &[f64] = &[
    10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, //
    125.0, 150.0, 175.0, 200.0, 225.0, 250.0, 275.0, 300.0, //
    400.0, 500.0, 600.0, 700.0, 800.0, 900.0, //
    1_000.0, 1_500.0, 2_000.0, 2_500.0, 3_000.0, 3_500.0, 4_000.0, 4_500.0, 5_000.0, //
    6_000.0, 7_000.0, 8_000.0, 9_000.0, 10_000.0,
];

/// Labels a single request is recorded under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricLabels {
    /// Service from the request's credential scope, or empty.
    pub service: String,
    /// Action or URI path of the request, or empty.
    pub action: String,
    /// HTTP status code of the response, `0` when no response was received.
    pub status_code: u16,
}

impl MetricLabels {
    /// Creates a new set of labels.
    pub fn new(service: impl Into<String>, action: impl Into<String>, status_code: u16) -> Self {
        Self {
            service: service.into(),
            action: action.into(),
            status_code,
        }
    }
}

/// The request counter and latency histogram shared by every instrumented connector.
///
/// Cloning is cheap and clones share the underlying collectors, so one `RequestMetrics` can
/// be handed to any number of clients. Registering it into the same registry more than once
/// is a no-op.
#[derive(Clone)]
pub struct RequestMetrics {
    requests_total: Tracked<CounterVec>,
    request_latency: Tracked<HistogramVec>,
}

impl fmt::Debug for RequestMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMetrics")
            .field("requests_total", &REQUESTS_TOTAL)
            .field("request_latency", &REQUEST_LATENCY_MS)
            .finish()
    }
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    /// Creates unregistered collectors.
    pub fn new() -> Self {
        let requests_total = CounterVec::new(
            Opts::new(REQUESTS_TOTAL, "The total number of AWS SDK requests"),
            &LABEL_NAMES,
        )
        .expect("metric name, help and labels are valid");
        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                REQUEST_LATENCY_MS,
                "Latency of AWS SDK requests in milliseconds",
            )
            .buckets(LATENCY_BUCKETS_MS.to_vec()),
            &LABEL_NAMES,
        )
        .expect("metric name, help, labels and buckets are valid");
        Self {
            requests_total: Tracked::new(requests_total),
            request_latency: Tracked::new(request_latency),
        }
    }

    /// Registers both collectors into `registry`.
    ///
    /// Registering this instance (or a clone of it) again succeeds without effect. Fails if
    /// a different collector already uses one of the metric names, in which case nothing
    /// registered by this call is left behind in `registry`.
    pub fn register(&self, registry: &Registry) -> Result<(), MetricRegistrationError> {
        let added_requests_total = self.requests_total.register(REQUESTS_TOTAL, registry)?;
        if let Err(err) = self.request_latency.register(REQUEST_LATENCY_MS, registry) {
            if added_requests_total {
                if let Err(source) = registry.unregister(Box::new(self.requests_total.clone())) {
                    tracing::warn!(
                        metric = REQUESTS_TOTAL,
                        error = %source,
                        "failed to roll back partial metric registration"
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Identifies the collectors shared by this instance and its clones.
    pub(crate) fn id(&self) -> usize {
        self.requests_total.id()
    }

    /// Counts one request and observes its latency.
    pub fn record(&self, labels: &MetricLabels, elapsed: Duration) {
        let status_code = labels.status_code.to_string();
        let values = [
            labels.service.as_str(),
            labels.action.as_str(),
            status_code.as_str(),
        ];
        self.requests_total.inner.with_label_values(&values).inc();
        self.request_latency
            .inner
            .with_label_values(&values)
            .observe(elapsed.as_secs_f64() * 1_000.0);
    }

    /// The `aws_sdk_requests_total` counter.
    pub fn requests_total(&self) -> &CounterVec {
        &self.requests_total.inner
    }

    /// The `aws_sdk_request_latency_ms` histogram.
    pub fn request_latency(&self) -> &HistogramVec {
        &self.request_latency.inner
    }
}

thread_local! {
    /// The collector a registration on this thread is looking for, and whether the registry
    /// collected from it.
    static LOOKING_FOR: Cell<Option<(usize, bool)>> = const { Cell::new(None) };
}

/// A collector that can tell whether a registry collects from it.
///
/// `prometheus` reports `AlreadyReg` both for the same collector registered twice and for a
/// distinct collector with an identical descriptor, so registration checks which one it is
/// by gathering the registry and looking for its own collections. `Registry::gather` collects
/// on the calling thread, so only collections made on the registering thread count and a
/// concurrent scrape of another registry holding the same collector is not mistaken for a
/// match.
#[derive(Clone)]
struct Tracked<C> {
    inner: C,
    identity: Arc<()>,
}

impl<C> Tracked<C>
where
    C: Collector + Clone + 'static,
{
    fn new(inner: C) -> Self {
        Self {
            inner,
            identity: Arc::new(()),
        }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.identity) as usize
    }

    /// Returns `true` when this call added the collector to `registry`.
    fn register(
        &self,
        name: &'static str,
        registry: &Registry,
    ) -> Result<bool, MetricRegistrationError> {
        match registry.register(Box::new(self.clone())) {
            Ok(()) => Ok(true),
            Err(prometheus::Error::AlreadyReg) if self.is_collected_by(registry) => {
                tracing::debug!(metric = name, "metric already registered");
                Ok(false)
            }
            Err(prometheus::Error::AlreadyReg) => Err(MetricRegistrationError::Conflict { name }),
            Err(source) => Err(MetricRegistrationError::Registry { name, source }),
        }
    }

    fn is_collected_by(&self, registry: &Registry) -> bool {
        LOOKING_FOR.with(|looking_for| looking_for.set(Some((self.id(), false))));
        let _ = registry.gather();
        matches!(
            LOOKING_FOR.with(|looking_for| looking_for.take()),
            Some((_, true))
        )
    }
}

impl<C> Collector for Tracked<C>
where
    C: Collector,
{
    fn desc(&self) -> Vec<&Desc> {
        self.inner.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let id = Arc::as_ptr(&self.identity) as usize;
        LOOKING_FOR.with(|looking_for| {
            if looking_for.get() == Some((id, false)) {
                looking_for.set(Some((id, true)));
            }
        });
        self.inner.collect()
    }
}
