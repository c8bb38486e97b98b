//! Local HTTP endpoint that records what the sink sends it.

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    routing::any,
};
use bytes::Bytes;
use http_sink_core::pack_batch;
use http_sink_transport::WriteRequest;

#[derive(Debug, Clone)]
pub struct Received {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct Endpoint {
    status: Arc<Mutex<StatusCode>>,
    delay: Duration,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Endpoint {
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(StatusCode::OK)),
            delay: Duration::ZERO,
            received: Arc::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond_with(&self, status: StatusCode) {
        *self.status.lock().unwrap() = status;
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    /// Serve on an ephemeral port and return the ingest URL.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/ingest", any(ingest))
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/ingest")
    }
}

async fn ingest(
    State(endpoint): State<Endpoint>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    endpoint.received.lock().unwrap().push(Received {
        method,
        headers,
        body,
    });
    if !endpoint.delay.is_zero() {
        tokio::time::sleep(endpoint.delay).await;
    }
    let status = *endpoint.status.lock().unwrap();
    let reply = if status.is_success() { "ok" } else { "upstream unhappy" };
    (status, reply)
}

pub fn packed(payloads: &[&str]) -> Bytes {
    pack_batch(payloads.iter().map(|p| p.as_bytes())).unwrap()
}

pub fn write_request(session_id: &str, payloads: &[&str]) -> WriteRequest {
    WriteRequest {
        session_id: session_id.to_string(),
        packed_batch: packed(payloads),
    }
}
