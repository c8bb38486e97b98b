//! HTTP + WebSocket host for the sink service.
//!
//! Routes:
//! - `POST /sessions` - open a session
//! - `GET /sessions/{id}` - describe a session (header values are not echoed)
//! - `DELETE /sessions/{id}` - close a session
//! - `GET /sessions/write` - WebSocket `Write` stream
//! - `GET /health` - liveness and session count

use axum::{
    Json, Router,
    extract::{
        Path, State, WebSocketUpgrade,
        rejection::JsonRejection,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use http_sink_core::{BatchFormat, HttpMethod};
use http_sink_session::parse_session_id;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{
    protocol::{
        AckResponse, ClientMessage, CloseSessionRequest, CreateSessionRequest,
        CreateSessionResponse, ServerMessage, WriteRequest,
    },
    service::{HttpSinkService, ServiceError},
    stream::StreamError,
};

/// Router state.
#[derive(Clone)]
pub struct WsState {
    service: HttpSinkService,
    shutdown: CancellationToken,
}

/// Fault in the socket framing, as opposed to the batch payload.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    Message(#[from] serde_json::Error),
    #[error("invalid packed_batch encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Create the sink router.
///
/// Cancelling `shutdown` ends every open write stream; in-flight batches
/// are abandoned without an acknowledgment.
///
/// # Example
/// ```ignore
/// let service = HttpSinkService::new(Arc::new(SessionRegistry::new()));
/// let app = create_router(service, shutdown.clone());
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_router(service: HttpSinkService, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/write", get(write_handler))
        .route(
            "/sessions/{session_id}",
            get(describe_session).delete(close_session),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(WsState { service, shutdown })
}

#[derive(Serialize)]
struct Health {
    plugin: &'static str,
    kind: &'static str,
    sessions: usize,
}

async fn health(State(state): State<WsState>) -> Json<Health> {
    Json(Health {
        plugin: "http",
        kind: "sink",
        sessions: state.service.registry().len(),
    })
}

#[derive(Deserialize)]
struct CreateSessionBody {
    #[serde(default)]
    tenant_id: String,
    config: serde_json::Value,
}

async fn create_session(
    State(state): State<WsState>,
    body: Result<Json<CreateSessionBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ServiceError> {
    let Json(body) = body.map_err(|e| ServiceError::InvalidArgument(e.body_text()))?;
    let config_json =
        serde_json::to_vec(&body.config).map_err(|e| ServiceError::InvalidArgument(e.to_string()))?;
    let response = state.service.create_session(CreateSessionRequest {
        tenant_id: body.tenant_id,
        config_json,
    })?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Serialize)]
struct SessionInfo {
    session_id: String,
    tenant_id: String,
    created_at: i64,
    endpoint: String,
    method: HttpMethod,
    batch_format: BatchFormat,
    timeout: String,
    headers: Vec<String>,
}

async fn describe_session(
    State(state): State<WsState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, ServiceError> {
    let session = parse_session_id(&session_id).and_then(|id| state.service.registry().get(id))?;

    let mut headers: Vec<String> = session.config.headers.keys().cloned().collect();
    headers.sort();

    Ok(Json(SessionInfo {
        session_id: session.id.to_string(),
        tenant_id: session.tenant_id.clone(),
        created_at: session.created_at,
        endpoint: session.config.endpoint.clone(),
        method: session.config.method,
        batch_format: session.config.batch_format,
        timeout: humantime::format_duration(session.config.timeout).to_string(),
        headers,
    }))
}

async fn close_session(
    State(state): State<WsState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state
        .service
        .close_session(&CloseSessionRequest { session_id })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn write_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (sink, source) = socket.split();
    let cancel = state.shutdown.child_token();

    let (request_tx, request_rx) = mpsc::channel(1);
    let (ack_tx, ack_rx) = mpsc::channel(1);
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_responses(sink, ack_rx, control_rx, cancel.clone()));
    let reader = tokio::spawn(read_requests(
        source,
        request_tx,
        control_tx.clone(),
        cancel.clone(),
    ));

    let result = state
        .service
        .write(ReceiverStream::new(request_rx), ack_tx, cancel)
        .await;

    match result {
        Ok(()) | Err(StreamError::Cancelled) => {}
        Err(e) => {
            let _ = control_tx.send(ServerMessage::Error {
                message: e.to_string(),
            });
        }
    }

    drop(control_tx);
    reader.abort();
    let _ = writer.await;
}

/// Forward socket frames as write requests.
///
/// An `end` message closes the input while the socket stays open, so
/// pending acknowledgments still reach the client. A close frame, a socket
/// error, or the peer vanishing cancels the stream: once the peer has sent
/// its close frame no acknowledgment can reach it.
async fn read_requests(
    mut source: SplitStream<WebSocket>,
    requests: mpsc::Sender<Result<WriteRequest, ProtocolError>>,
    control: mpsc::UnboundedSender<ServerMessage>,
    disconnect: CancellationToken,
) {
    while let Some(frame) = source.next().await {
        let parsed = match frame {
            Ok(Message::Text(text)) => serde_json::from_str::<ClientMessage>(text.as_str()),
            Ok(Message::Binary(data)) => serde_json::from_slice::<ClientMessage>(&data),
            Ok(Message::Close(_)) => {
                tracing::debug!("Client closed socket");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                disconnect.cancel();
                return;
            }
        };

        let message = match parsed {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Invalid client message: {e}");
                let _ = requests.send(Err(e.into())).await;
                return;
            }
        };

        if matches!(message, ClientMessage::End) {
            tracing::debug!("Client ended input");
            return;
        }

        let Some(request) = message.into_write_request() else {
            let _ = control.send(ServerMessage::Pong);
            continue;
        };

        if requests
            .send(request.map_err(ProtocolError::from))
            .await
            .is_err()
        {
            return;
        }
    }

    disconnect.cancel();
}

/// Serialize acknowledgments and control messages onto the socket, acks
/// first, then close it.
async fn write_responses(
    mut sink: SplitSink<WebSocket, Message>,
    mut acks: mpsc::Receiver<AckResponse>,
    mut control: mpsc::UnboundedReceiver<ServerMessage>,
    disconnect: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            Some(ack) = acks.recv() => ServerMessage::from(ack),
            Some(msg) = control.recv() => msg,
            else => break,
        };

        let json = match serde_json::to_string(&msg) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!("Failed to serialize message: {e}");
                continue;
            }
        };

        if sink.send(Message::Text(json.into())).await.is_err() {
            disconnect.cancel();
            return;
        }
    }

    let _ = sink.send(Message::Close(None)).await;
}
