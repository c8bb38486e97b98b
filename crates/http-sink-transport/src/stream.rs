//! Write-stream sequencing.
//!
//! A stream binds to one session, resolved from its first message, then
//! handles each message strictly in order: decode, deliver, acknowledge.
//! The next message is not pulled until the current acknowledgment has been
//! handed off, so at most one batch per stream is in flight.
//!
//! Faults are split by level:
//! - payload faults (undecodable batch, failed delivery) become a negative
//!   acknowledgment and the stream continues;
//! - protocol faults (unknown session, broken inbound transport, closed ack
//!   channel, cancellation) end the stream.

use std::{fmt::Display, sync::Arc};

use futures::{Stream, StreamExt};
use http_sink_core::{BatchDecoder, DeliveryOutcome};
use http_sink_delivery::{DeliveryError, send_batch};
use http_sink_session::{RegistryError, Session, SessionRegistry, parse_session_id};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{AckResponse, WriteRequest};

/// Stream-fatal error.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Session(#[from] RegistryError),
    #[error("receive failed: {0}")]
    Recv(String),
    #[error("acknowledgment channel closed")]
    AckClosed,
    #[error("stream cancelled")]
    Cancelled,
}

/// Where a stream is in its lifecycle.
#[derive(Debug, Clone, Default)]
pub enum StreamState {
    /// No message seen yet; the session is unresolved.
    #[default]
    AwaitingFirstMessage,
    /// Bound to the session named by the first message.
    Bound(Arc<Session>),
    /// Input ended or a fatal error occurred.
    Closed,
}

/// Handler for a single `Write` stream.
pub struct WriteStream<'a> {
    registry: &'a SessionRegistry,
    decoder: &'a dyn BatchDecoder,
    cancel: CancellationToken,
    state: StreamState,
}

impl<'a> WriteStream<'a> {
    #[must_use]
    pub fn new(
        registry: &'a SessionRegistry,
        decoder: &'a dyn BatchDecoder,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            decoder,
            cancel,
            state: StreamState::AwaitingFirstMessage,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &StreamState {
        &self.state
    }

    /// Consume `requests`, sending one acknowledgment per message to `acks`.
    ///
    /// Returns `Ok(())` when `requests` ends. A closed stream stays closed:
    /// running it again returns immediately.
    ///
    /// # Errors
    /// Returns error if the first message names an unknown session, the
    /// inbound stream fails, `acks` is closed, or the stream is cancelled.
    /// No acknowledgment is sent for a batch interrupted by cancellation.
    pub async fn run<S, E>(
        &mut self,
        mut requests: S,
        acks: mpsc::Sender<AckResponse>,
    ) -> Result<(), StreamError>
    where
        S: Stream<Item = Result<WriteRequest, E>> + Unpin,
        E: Display,
    {
        if matches!(self.state, StreamState::Closed) {
            return Ok(());
        }

        let result = self.pump(&mut requests, &acks).await;
        self.state = StreamState::Closed;
        result
    }

    async fn pump<S, E>(
        &mut self,
        requests: &mut S,
        acks: &mpsc::Sender<AckResponse>,
    ) -> Result<(), StreamError>
    where
        S: Stream<Item = Result<WriteRequest, E>> + Unpin,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(StreamError::Cancelled),
                next = requests.next() => next,
            };

            let request = match next {
                None => return Ok(()),
                Some(Err(e)) => return Err(StreamError::Recv(e.to_string())),
                Some(Ok(request)) => request,
            };

            let session = self.bind(&request.session_id)?;
            let ack = self.process(&session, request).await?;

            acks.send(ack).await.map_err(|_| StreamError::AckClosed)?;
        }
    }

    /// Resolve the session on the first message; reuse it afterwards.
    fn bind(&mut self, session_id: &str) -> Result<Arc<Session>, StreamError> {
        match &self.state {
            StreamState::Bound(session) => Ok(Arc::clone(session)),
            StreamState::AwaitingFirstMessage => {
                let session = parse_session_id(session_id).and_then(|id| self.registry.get(id))?;
                tracing::debug!(session_id = %session.id, "write stream bound");
                self.state = StreamState::Bound(Arc::clone(&session));
                Ok(session)
            }
            StreamState::Closed => Err(StreamError::Cancelled),
        }
    }

    async fn process(
        &self,
        session: &Session,
        request: WriteRequest,
    ) -> Result<AckResponse, StreamError> {
        let batch = match self.decoder.decode(request.packed_batch) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Failed to unpack batch");
                return Ok(AckResponse::failure(format!("failed to unpack batch: {e}")));
            }
        };

        let result = send_batch(&session.client, &session.config, &batch, &self.cancel).await;
        let outcome = classify(result)?;

        match &outcome {
            DeliveryOutcome::Success => tracing::debug!(
                session_id = %session.id,
                records = batch.len(),
                "Batch sent to HTTP endpoint"
            ),
            DeliveryOutcome::Failure { reason } => tracing::error!(
                session_id = %session.id,
                records = batch.len(),
                error = %reason,
                "Failed to send batch"
            ),
        }

        Ok(outcome.into())
    }
}

/// A completed request keeps its outcome even if cancellation fires right
/// after it; only an interrupted one ends the stream.
fn classify(result: Result<(), DeliveryError>) -> Result<DeliveryOutcome, StreamError> {
    match result {
        Ok(()) => Ok(DeliveryOutcome::Success),
        Err(DeliveryError::Cancelled) => Err(StreamError::Cancelled),
        Err(e) => Ok(e.into()),
    }
}
