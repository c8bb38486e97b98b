//! Service handlers and transport for the HTTP sink.
//!
//! Provides:
//! - Request/response contract and WebSocket wire protocol (JSON + base64)
//! - `WriteStream` - Per-stream sequencing of decode, delivery and acks
//! - `HttpSinkService` - The CreateSession / Write / CloseSession handlers
//! - WebSocket host (feature: websocket)

pub mod protocol;
pub mod service;
pub mod stream;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use protocol::{
    AckResponse, ClientMessage, CloseSessionRequest, CreateSessionRequest, CreateSessionResponse,
    ServerMessage, WriteRequest,
};
pub use service::{HttpSinkService, ServiceError};
pub use stream::{StreamError, StreamState, WriteStream};
