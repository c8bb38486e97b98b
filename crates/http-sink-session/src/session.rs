//! Per-session state.

use std::time::{SystemTime, UNIX_EPOCH};

use http_sink_core::{SessionId, SinkConfig};

/// A bound sink session.
///
/// Immutable after creation. The client is cheap to clone and safe to use
/// from several tasks at once; it owns the connection pool for the session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Opaque tenant supplied by the caller.
    pub tenant_id: String,
    /// Validated target configuration.
    pub config: SinkConfig,
    /// Outbound client bound to `config.timeout`.
    pub client: reqwest::Client,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
}

pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}
