/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Derive the `service` and `action` labels of an outgoing request.
//!
//! The service comes from the SigV4 credential scope in the `Authorization` header:
//!
//! ```text
//! Authorization: AWS4-HMAC-SHA256 Credential=AKID/20240101/us-east-1/s3/aws4_request, SignedHeaders=..., Signature=...
//!                                            ^^^^ ^^^^^^^^ ^^^^^^^^^ ^^ ^^^^^^^^^^^^
//!                                            key  date     region    service
//! ```
//!
//! The action comes from the `Action` parameter of a form encoded body for `POST` and `PUT`
//! requests (query protocol services such as EC2 or STS), and is the URI path otherwise.

use crate::error::ClassificationError;
use aws_smithy_runtime_api::client::orchestrator::HttpRequest;

const AUTHORIZATION: &str = "authorization";
const CREDENTIAL_MARKER: &str = "Credential";
const ACTION_PARAM: &str = "Action";

/// `<access-key>/<date>/<region>/<service>/<terminator>`
const CREDENTIAL_SCOPE_FIELDS: usize = 5;
const SERVICE_FIELD: usize = 3;

/// Labels derived from a request before it is sent.
///
/// Labels that could not be derived are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestClassification {
    /// Short service identifier from the credential scope, e.g. `s3`.
    pub service: String,
    /// Operation name or URI path, e.g. `DescribeInstances` or `/my-bucket`.
    pub action: String,
}

/// Classifies `request`, logging and substituting an empty label for anything that fails.
pub fn classify(request: &HttpRequest) -> RequestClassification {
    let service = classify_service(request).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "unable to classify request service");
        String::new()
    });
    let action = classify_action(request).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "unable to classify request action");
        String::new()
    });
    RequestClassification { service, action }
}

/// Returns the service from the credential scope of the request's `Authorization` header.
pub fn classify_service(request: &HttpRequest) -> Result<String, ClassificationError> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(ClassificationError::MissingAuthorization)?;
    service_from_authorization(authorization).map(str::to_owned)
}

fn service_from_authorization(authorization: &str) -> Result<&str, ClassificationError> {
    let tokens: Vec<&str> = authorization.split('=').collect();
    let credential = tokens
        .windows(2)
        .filter(|pair| pair[0].contains(CREDENTIAL_MARKER))
        .map(|pair| pair[1])
        .last()
        .filter(|credential| !credential.is_empty())
        .ok_or_else(|| ClassificationError::MissingCredential {
            // never echo the credential or signature
            header: authorization
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_owned(),
        })?;

    let scope: Vec<&str> = credential.split('/').collect();
    if scope.len() < CREDENTIAL_SCOPE_FIELDS {
        return Err(ClassificationError::IncompleteCredentialScope { found: scope.len() });
    }
    Ok(scope[SERVICE_FIELD])
}

/// Returns the API action of the request.
///
/// For `POST` and `PUT` this is the `Action` parameter of the form encoded body. The body is
/// only borrowed, so the same bytes are later sent by the underlying connector. Streaming
/// bodies are never read.
///
/// For every other method this is the path of the request URI, still percent-encoded.
///
/// Form values are decoded the way any form body is, so `+` and percent escapes in the
/// `Action` value are unescaped. AWS action names never contain either.
pub fn classify_action(request: &HttpRequest) -> Result<String, ClassificationError> {
    match request.method() {
        "POST" | "PUT" => {
            let body =
                request
                    .body()
                    .bytes()
                    .ok_or_else(|| ClassificationError::BodyNotBuffered {
                        method: request.method().to_owned(),
                    })?;
            action_from_form(body).ok_or(ClassificationError::MissingAction)
        }
        _ => path_of(request.uri()),
    }
}

fn action_from_form(body: &[u8]) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(key, _)| key == ACTION_PARAM)
        .map(|(_, action)| action.into_owned())
}

fn path_of(uri: &str) -> Result<String, ClassificationError> {
    uri.parse::<http_1x::Uri>()
        .map(|uri| uri.path().to_owned())
        .map_err(|source| ClassificationError::InvalidUri {
            uri: uri.to_owned(),
            source,
        })
}
