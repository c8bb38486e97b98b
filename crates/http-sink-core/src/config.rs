//! Per-session sink configuration.

use std::{collections::HashMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timeout used when the config omits one or supplies an unparseable value.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("endpoint is required")]
    MissingEndpoint,
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

/// HTTP method used for outbound batch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
    Patch,
}

impl HttpMethod {
    /// Parse a method name, case-insensitively.
    ///
    /// An empty value selects the default (`POST`).
    ///
    /// # Errors
    /// Returns `ConfigError::UnsupportedMethod` for anything other than
    /// POST, PUT or PATCH.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            _ => Err(ConfigError::UnsupportedMethod(raw.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body encoding for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFormat {
    /// A single JSON array holding every record.
    #[default]
    JsonArray,
    /// One record per line, each terminated by `\n`.
    Ndjson,
}

impl BatchFormat {
    /// Resolve a format name. Unrecognized names fall back to `JsonArray`.
    #[must_use]
    pub fn from_lenient(raw: &str) -> Self {
        match raw {
            "ndjson" => Self::Ndjson,
            "json_array" | "" => Self::JsonArray,
            other => {
                tracing::warn!(batch_format = other, "unknown batch format, using json_array");
                Self::JsonArray
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JsonArray => "json_array",
            Self::Ndjson => "ndjson",
        }
    }
}

/// Validated sink configuration.
///
/// Built once when a session is created and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Target URI every batch is sent to.
    pub endpoint: String,
    /// Request method.
    pub method: HttpMethod,
    /// Static headers applied after the default `Content-Type`.
    pub headers: HashMap<String, String>,
    /// Client timeout. Zero disables the timeout.
    pub timeout: Duration,
    /// Body encoding.
    pub batch_format: BatchFormat,
}

/// Wire shape of the config object. Every field is optional so that
/// validation can report the precise problem.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSinkConfig {
    endpoint: Option<String>,
    method: Option<String>,
    headers: Option<HashMap<String, String>>,
    timeout: Option<String>,
    batch_format: Option<String>,
}

impl SinkConfig {
    /// Create a config for `endpoint` with every other field defaulted.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: HttpMethod::default(),
            headers: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            batch_format: BatchFormat::default(),
        }
    }

    /// Parse and validate a JSON-encoded config object.
    ///
    /// `timeout` and `batch_format` are resolved leniently: values that
    /// cannot be understood fall back to their defaults instead of failing.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed, `endpoint` is missing or
    /// empty, or `method` names an unsupported method.
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let raw: RawSinkConfig = serde_json::from_slice(raw)?;

        let endpoint = raw.endpoint.unwrap_or_default();
        if endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        Ok(Self {
            endpoint,
            method: HttpMethod::parse(raw.method.as_deref().unwrap_or_default())?,
            headers: raw.headers.unwrap_or_default(),
            timeout: resolve_timeout(raw.timeout.as_deref()),
            batch_format: BatchFormat::from_lenient(raw.batch_format.as_deref().unwrap_or_default()),
        })
    }

    /// Set the request method.
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Add a static header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the client timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the body encoding.
    #[must_use]
    pub const fn with_batch_format(mut self, batch_format: BatchFormat) -> Self {
        self.batch_format = batch_format;
        self
    }
}

/// Resolve a duration string such as `"30s"` or `"500ms"`.
///
/// Absent, empty and unparseable values resolve to [`DEFAULT_TIMEOUT`].
#[must_use]
pub fn resolve_timeout(raw: Option<&str>) -> Duration {
    match raw {
        None | Some("") => DEFAULT_TIMEOUT,
        Some(value) => humantime::parse_duration(value).unwrap_or_else(|e| {
            tracing::warn!(timeout = value, error = %e, "unparseable timeout, using default");
            DEFAULT_TIMEOUT
        }),
    }
}
