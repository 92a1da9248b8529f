/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Instrument the HTTP client of a shared [`SdkConfig`].

use crate::client::instrument;
use crate::error::InstrumentError;
use crate::metrics::RequestMetrics;
use aws_smithy_runtime_api::client::http::SharedHttpClient;
use aws_types::SdkConfig;
use prometheus::Registry;

/// Returns a copy of `config` whose HTTP client records request metrics.
///
/// Every service client built from the returned config shares `metrics`. If `config` has no
/// HTTP client, the default HTTPS client is instrumented instead when the
/// `default-https-client` feature is enabled.
///
/// ```no_run
/// # async fn docs() -> Result<(), Box<dyn std::error::Error>> {
/// use aws_sdk_metrics::{instrument_sdk_config, RequestMetrics};
///
/// let registry = prometheus::Registry::new();
/// let metrics = RequestMetrics::new();
/// # let sdk_config = aws_types::SdkConfig::builder().build();
/// let sdk_config = instrument_sdk_config(&sdk_config, &metrics, &registry)?;
/// # Ok(())
/// # }
/// ```
pub fn instrument_sdk_config(
    config: &SdkConfig,
    metrics: &RequestMetrics,
    registry: &Registry,
) -> Result<SdkConfig, InstrumentError> {
    let http_client = match config.http_client() {
        Some(http_client) => http_client,
        None => default_http_client()?,
    };
    let http_client = instrument(http_client, metrics, registry)?;
    Ok(config.to_builder().http_client(http_client).build())
}

#[cfg(feature = "default-https-client")]
fn default_http_client() -> Result<SharedHttpClient, InstrumentError> {
    use aws_smithy_http_client::{tls, Builder};

    tracing::debug!("SdkConfig has no HTTP client, instrumenting the default HTTPS client");
    Ok(Builder::new()
        .tls_provider(tls::Provider::Rustls(
            tls::rustls_provider::CryptoMode::AwsLc,
        ))
        .build_https())
}

#[cfg(not(feature = "default-https-client"))]
fn default_http_client() -> Result<SharedHttpClient, InstrumentError> {
    Err(InstrumentError::MissingHttpClient)
}
