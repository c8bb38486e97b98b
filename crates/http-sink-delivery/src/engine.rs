//! Batch delivery: request construction and outcome classification.

use std::{collections::HashMap, error::Error as StdError};

use http_sink_core::{Batch, DeliveryOutcome, HttpMethod, SinkConfig};
use reqwest::{
    Client, Method, RequestBuilder,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::format::encode_body;

/// Delivery error.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to marshal batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("HTTP request failed: {}", chain(.0))]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("delivery cancelled")]
    Cancelled,
}

/// Deliver one batch and classify the result.
///
/// Never fails: every error becomes a `DeliveryOutcome::Failure` whose
/// reason describes the cause.
pub async fn deliver(
    client: &Client,
    config: &SinkConfig,
    batch: &Batch,
    cancel: &CancellationToken,
) -> DeliveryOutcome {
    match send_batch(client, config, batch, cancel).await {
        Ok(()) => DeliveryOutcome::Success,
        Err(e) => e.into(),
    }
}

impl From<DeliveryError> for DeliveryOutcome {
    fn from(err: DeliveryError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Encode `batch` and send it to the configured endpoint.
///
/// `Content-Type: application/json` is set first, then every configured
/// header, so a configured `Content-Type` wins. The request is abandoned as
/// soon as `cancel` fires.
///
/// # Errors
/// Returns error if encoding fails, a header is invalid, the request cannot
/// be sent, the response status is 400 or above, or `cancel` fires.
pub async fn send_batch(
    client: &Client,
    config: &SinkConfig,
    batch: &Batch,
    cancel: &CancellationToken,
) -> Result<(), DeliveryError> {
    let body = encode_body(config.batch_format, batch)?;
    let headers = build_headers(&config.headers)?;

    tracing::trace!(
        method = %config.method,
        endpoint = %config.endpoint,
        records = batch.len(),
        bytes = body.len(),
        "sending batch"
    );

    let request = client
        .request(to_method(config.method), &config.endpoint)
        .headers(headers)
        .body(body);

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DeliveryError::Cancelled),
        result = execute(request) => result,
    }
}

async fn execute(request: RequestBuilder) -> Result<(), DeliveryError> {
    let response = request.send().await?;
    let status = response.status();

    if status.as_u16() >= 400 {
        // Best effort: a failed read still reports the status.
        let body = response.text().await.unwrap_or_default();
        return Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(())
}

fn build_headers(configured: &HashMap<String, String>) -> Result<HeaderMap, DeliveryError> {
    let mut headers = HeaderMap::with_capacity(configured.len() + 1);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in configured {
        let invalid = |reason: String| DeliveryError::InvalidHeader {
            name: name.clone(),
            reason,
        };
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

const fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
    }
}

/// Render an error with its source chain, e.g.
/// `error sending request: operation timed out`.
fn chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
