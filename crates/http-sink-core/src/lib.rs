//! Core types for the HTTP sink.
//!
//! This crate provides the building blocks shared by every layer:
//! - `SinkConfig` - Validated per-session target configuration
//! - `Record` / `Batch` - Decoded batch payloads
//! - `BatchDecoder` - Packed-batch codec seam
//! - `DeliveryOutcome` - Per-batch delivery result

pub mod batch;
pub mod config;
pub mod traits;

pub use batch::{Batch, DecodeError, PackError, Record, pack_batch, unpack_batch};
pub use config::{BatchFormat, ConfigError, HttpMethod, SinkConfig};
pub use traits::{BatchDecoder, DeliveryOutcome, PackedBatchDecoder, SessionId};
