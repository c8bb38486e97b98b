//! Batch delivery engine.
//!
//! Provides:
//! - Body encoding (`json_array`, `ndjson`)
//! - Outbound client provisioning
//! - Request construction and outcome classification

pub mod client;
pub mod engine;
pub mod format;

pub use client::{ClientError, build_client};
pub use engine::{DeliveryError, deliver, send_batch};
pub use format::encode_body;
