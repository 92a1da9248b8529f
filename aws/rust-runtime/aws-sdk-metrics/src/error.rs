/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Errors produced while instrumenting an HTTP client.
//!
//! Transport failures are not represented here: the
//! [`ConnectorError`](aws_smithy_runtime_api::client::result::ConnectorError) returned by the
//! wrapped connector is handed back to the caller untouched.

/// The service or action label could not be derived from a request.
///
/// These errors never fail the request. The instrumented connector logs them and
/// records the call with an empty label instead.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    /// The request has no `Authorization` header.
    #[error("request has no authorization header")]
    MissingAuthorization,

    /// The `Authorization` header has no `Credential=` component.
    #[error("unable to find a credential in the authorization header `{header}`")]
    MissingCredential {
        /// The authorization scheme, without credential or signature.
        header: String,
    },

    /// The credential scope has too few `/`-separated fields to contain a service.
    #[error("unable to find the service in credential scope, only found {found} fields")]
    IncompleteCredentialScope {
        /// Number of fields found in the credential scope.
        found: usize,
    },

    /// The request body is streaming and cannot be read without consuming it.
    #[error("{method} request body is not buffered in memory and cannot be inspected")]
    BodyNotBuffered {
        /// The request method.
        method: String,
    },

    /// The form encoded request body has no `Action` parameter.
    #[error("unable to find an Action parameter in the request body")]
    MissingAction,

    /// The request URI could not be parsed to extract its path.
    #[error("invalid request URI `{uri}`")]
    InvalidUri {
        /// The URI as it appears on the request.
        uri: String,
        /// The parse failure.
        #[source]
        source: http_1x::uri::InvalidUri,
    },
}

/// The request metrics could not be registered.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MetricRegistrationError {
    /// A different collector is already registered under this metric name.
    #[error("a different collector is already registered as `{name}`")]
    Conflict {
        /// The metric name.
        name: &'static str,
    },

    /// The registry rejected the collector for another reason.
    #[error("failed to register `{name}`")]
    Registry {
        /// The metric name.
        name: &'static str,
        /// The registry failure.
        #[source]
        source: prometheus::Error,
    },
}

/// An [`SdkConfig`](aws_types::SdkConfig) could not be instrumented.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    /// The config has no HTTP client and no default client is available.
    #[error(
        "SdkConfig has no HTTP client to instrument. Set one or enable the `default-https-client` feature"
    )]
    MissingHttpClient,

    /// The request metrics could not be registered.
    #[error("unable to construct an instrumented HTTP client")]
    Registration(#[from] MetricRegistrationError),
}
