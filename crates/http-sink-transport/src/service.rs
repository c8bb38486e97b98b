//! The three sink operations: `CreateSession`, `Write`, `CloseSession`.

use std::{fmt::Display, sync::Arc};

use futures::Stream;
use http_sink_core::{BatchDecoder, PackedBatchDecoder};
use http_sink_session::{RegistryError, SessionRegistry, parse_session_id};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    protocol::{
        AckResponse, CloseSessionRequest, CreateSessionRequest, CreateSessionResponse,
        WriteRequest,
    },
    stream::{StreamError, WriteStream},
};

/// Error returned to the caller of a single unary operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request was malformed, e.g. an invalid session config.
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Config(_) => Self::InvalidArgument(err.to_string()),
            RegistryError::NotFound(_) => Self::NotFound(err.to_string()),
            RegistryError::Client(_) | RegistryError::Internal(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

/// HTTP sink service.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct HttpSinkService {
    registry: Arc<SessionRegistry>,
    decoder: Arc<dyn BatchDecoder>,
}

impl HttpSinkService {
    /// Create a service using the packed-batch decoder.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_decoder(registry, Arc::new(PackedBatchDecoder))
    }

    /// Create a service with a custom batch decoder.
    #[must_use]
    pub fn with_decoder(registry: Arc<SessionRegistry>, decoder: Arc<dyn BatchDecoder>) -> Self {
        Self { registry, decoder }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Validate the config and open a session.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the config is malformed or incomplete.
    pub fn create_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ServiceError> {
        match self.registry.create(req.tenant_id.as_str(), &req.config_json) {
            Ok(id) => Ok(CreateSessionResponse {
                session_id: id.to_string(),
            }),
            Err(e) => {
                tracing::warn!(tenant_id = %req.tenant_id, error = %e, "Rejected session");
                Err(e.into())
            }
        }
    }

    /// Handle one `Write` stream until it ends.
    ///
    /// # Errors
    /// Returns a stream-fatal error; see [`WriteStream::run`].
    pub async fn write<S, E>(
        &self,
        requests: S,
        acks: mpsc::Sender<AckResponse>,
        cancel: CancellationToken,
    ) -> Result<(), StreamError>
    where
        S: Stream<Item = Result<WriteRequest, E>> + Unpin,
        E: Display,
    {
        let mut stream = WriteStream::new(&self.registry, self.decoder.as_ref(), cancel);
        let result = stream.run(requests, acks).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Write stream terminated");
        }
        result
    }

    /// Close a session.
    ///
    /// # Errors
    /// Returns `NotFound` if the session does not exist or is already closed.
    pub fn close_session(&self, req: &CloseSessionRequest) -> Result<(), ServiceError> {
        let result = parse_session_id(&req.session_id).and_then(|id| self.registry.close(id));
        if let Err(e) = &result {
            tracing::warn!(session_id = %req.session_id, error = %e, "Failed to close session");
        }
        result.map_err(Into::into)
    }
}
