//! Session registry for the HTTP sink.
//!
//! Provides:
//! - `Session` - Typed per-session state (tenant, config, client)
//! - `SessionRegistry` - Concurrent create/get/close of sessions

pub mod registry;
pub mod session;

pub use registry::{RegistryError, SessionRegistry, parse_session_id};
pub use session::Session;
