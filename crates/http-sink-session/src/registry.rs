//! Session registry: identifier to session state.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use http_sink_core::{ConfigError, SessionId, SinkConfig};
use http_sink_delivery::{ClientError, build_client};
use uuid::Uuid;

use crate::session::{Session, now};

/// Registry error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("registry error: {0}")]
    Internal(String),
}

/// Parse a caller-supplied session identifier.
///
/// # Errors
/// Returns `RegistryError::NotFound` if `raw` is not a valid identifier, since
/// no session can exist under it.
pub fn parse_session_id(raw: &str) -> Result<SessionId, RegistryError> {
    Uuid::parse_str(raw).map_err(|_| RegistryError::NotFound(raw.to_string()))
}

/// Registry of live sessions.
///
/// Constructed once per service and shared by reference. Map mutations are
/// serialized by the lock; the lock is never held while building clients or
/// while batches are in flight.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `raw_config`, provision a client and store a new session.
    ///
    /// # Errors
    /// Returns error if the config is malformed or incomplete, or if the
    /// client cannot be built. No session is stored in that case.
    pub fn create(
        &self,
        tenant_id: impl Into<String>,
        raw_config: &[u8],
    ) -> Result<SessionId, RegistryError> {
        let config = SinkConfig::from_json(raw_config)?;
        let client = build_client(config.timeout)?;

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            config,
            client,
            created_at: now(),
        });
        let id = session.id;

        self.sessions
            .write()
            .map_err(|e| RegistryError::Internal(e.to_string()))?
            .insert(id, Arc::clone(&session));

        tracing::info!(
            session_id = %id,
            tenant_id = %session.tenant_id,
            endpoint = %session.config.endpoint,
            method = %session.config.method,
            batch_format = session.config.batch_format.as_str(),
            "HTTP sink session created"
        );

        Ok(id)
    }

    /// Look up a session.
    ///
    /// The returned handle stays usable even if the session is closed
    /// afterwards.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if no such session exists.
    pub fn get(&self, id: SessionId) -> Result<Arc<Session>, RegistryError> {
        self.sessions
            .read()
            .map_err(|e| RegistryError::Internal(e.to_string()))?
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Remove a session.
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` if no such session exists.
    pub fn close(&self, id: SessionId) -> Result<(), RegistryError> {
        let removed = self
            .sessions
            .write()
            .map_err(|e| RegistryError::Internal(e.to_string()))?
            .remove(&id);

        match removed {
            Some(session) => {
                tracing::info!(
                    session_id = %id,
                    tenant_id = %session.tenant_id,
                    "HTTP sink session closed"
                );
                Ok(())
            }
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().map_or(0, |s| s.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
