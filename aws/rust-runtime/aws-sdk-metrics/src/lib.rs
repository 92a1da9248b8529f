/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! Prometheus metrics for the requests an AWS SDK client sends.
//!
//! Wrapping an SDK HTTP client with [`InstrumentedHttpClient`] records two metrics for every
//! request, labeled by `service`, `action` and `status_code`:
//!
//! - `aws_sdk_requests_total`: a counter of requests
//! - `aws_sdk_request_latency_ms`: a histogram of request latency in milliseconds
//!
//! The service is read from the SigV4 credential scope of the request, and the action from
//! the `Action` parameter of query protocol requests or the URI path of everything else. See
//! [`classify`] for details.
//!
//! Instrumentation never changes the request or its result. A request that cannot be
//! classified is recorded with empty labels, and a request that fails without a response is
//! recorded with status code `0`.
//!
//! # Examples
//!
//! ```no_run
//! # async fn docs(sdk_config: aws_types::SdkConfig) -> Result<(), Box<dyn std::error::Error>> {
//! use aws_sdk_metrics::{instrument_sdk_config, RequestMetrics};
//!
//! // The registry is owned by whatever serves `/metrics`.
//! let registry = prometheus::Registry::new();
//! let metrics = RequestMetrics::new();
//!
//! let sdk_config = instrument_sdk_config(&sdk_config, &metrics, &registry)?;
//! // let s3 = aws_sdk_s3::Client::new(&sdk_config);
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Features
//!
//! - `default-https-client`: instrument the default HTTPS client when an `SdkConfig` does not
//!   carry one.

pub mod classify;
mod client;
pub mod error;
mod metrics;
mod sdk_config;

pub use client::{instrument, InstrumentedConnector, InstrumentedHttpClient};
pub use metrics::{
    MetricLabels, RequestMetrics, LATENCY_BUCKETS_MS, REQUESTS_TOTAL, REQUEST_LATENCY_MS,
};
pub use sdk_config::instrument_sdk_config;
