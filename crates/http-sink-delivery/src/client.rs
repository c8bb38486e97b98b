//! Outbound HTTP client provisioning.

use std::time::Duration;

use thiserror::Error;

/// Client construction error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Build the client a session reuses for every batch.
///
/// The timeout covers the whole exchange, from connect to the end of the
/// response body. A zero timeout disables it.
///
/// # Errors
/// Returns error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder();
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
