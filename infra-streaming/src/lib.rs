use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use scribe_application::{
    ApplicationError, EngineHandle, OrchestratorHandle, TranscriptionOrchestrator,
};
use scribe_domain::{ChunkingParams, DomainError, ModelConfig, TranscriptionEvent};

pub mod protocol;

use protocol::{ClientEnvelope, ClientMessage, ServerEnvelope, ServerMessage, PROTOCOL_VERSION};

type SocketSink = SplitSink<WebSocket, Message>;

/// Shared by every connection; each connection owns its own orchestrator.
#[derive(Clone)]
pub struct StreamingState {
    pub engine: Arc<EngineHandle>,
    pub default_model: ModelConfig,
    pub chunking: ChunkingParams,
    pub max_message_bytes: usize,
}

pub fn build_router(state: StreamingState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn run_server(router: Router, bind_addr: &str) -> Result<(), DomainError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|err| DomainError::Streaming(format!("bind failed: {err}")))?;
    info!("websocket server listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| DomainError::Streaming(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn health(State(state): State<StreamingState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine_ready": state.engine.is_initialized(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<StreamingState>) -> Response {
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| {
            let span = tracing::info_span!("connection", connection_id = %Uuid::new_v4());
            handle_socket(socket, state).instrument(span)
        })
}

async fn handle_socket(socket: WebSocket, state: StreamingState) {
    let (mut sink, mut stream) = socket.split();
    let (orchestrator, mut events) =
        TranscriptionOrchestrator::spawn(Arc::clone(&state.engine), state.chunking);
    debug!("connection opened");

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                if let Err(err) = send_event(&mut sink, event).await {
                    warn!("dropping connection: {}", err);
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(raw))) => {
                    match dispatch(&orchestrator, &state, raw.as_str()) {
                        Ok(Some(reply)) => {
                            if send_message(&mut sink, reply).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(SessionError::Rejected(err)) => {
                            warn!("request rejected: {}", err);
                            let reply = ServerMessage::Error { message: err.to_string() };
                            if send_message(&mut sink, reply).await.is_err() {
                                break;
                            }
                        }
                        Err(SessionError::Protocol(err)) => {
                            error!("session error: {}", err);
                            let _ = send_message(&mut sink, ServerMessage::Error { message: err.to_string() }).await;
                            break;
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    let reply = ServerMessage::Error {
                        message: "binary frames are not supported; use JSON transcribe".to_string(),
                    };
                    if send_message(&mut sink, reply).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    error!("websocket transport error: {}", err);
                    break;
                }
            }
        }
    }

    // Stop decoding for a host that is gone, then let the worker drain.
    if orchestrator.cancel().is_err() {
        debug!("orchestrator already stopped");
    }
    orchestrator.shutdown().await;
    debug!("connection closed");
}

enum SessionError {
    /// The message could not be understood; the connection is closed.
    Protocol(DomainError),
    /// The message was understood but its request is invalid.
    Rejected(ApplicationError),
}

fn dispatch(
    orchestrator: &OrchestratorHandle,
    state: &StreamingState,
    raw: &str,
) -> Result<Option<ServerMessage>, SessionError> {
    let envelope: ClientEnvelope = serde_json::from_str(raw).map_err(|err| {
        SessionError::Protocol(DomainError::Streaming(format!("invalid message: {err}")))
    })?;
    if envelope.version != PROTOCOL_VERSION {
        return Err(SessionError::Protocol(DomainError::Streaming(format!(
            "unsupported protocol version {}, expected {}",
            envelope.version, PROTOCOL_VERSION
        ))));
    }

    match envelope.message {
        ClientMessage::Transcribe(request) => {
            let request = request
                .into_request(&state.default_model)
                .map_err(SessionError::Rejected)?;
            let request_id = orchestrator
                .submit_request(request)
                .map_err(SessionError::Rejected)?;
            debug!(%request_id, "transcription submitted");
            Ok(None)
        }
        ClientMessage::Cancel => {
            orchestrator.cancel().map_err(SessionError::Rejected)?;
            Ok(None)
        }
        ClientMessage::Ping => Ok(Some(ServerMessage::Pong)),
    }
}

async fn send_event(sink: &mut SocketSink, event: TranscriptionEvent) -> Result<(), DomainError> {
    send_message(sink, ServerMessage::from(event)).await
}

async fn send_message(sink: &mut SocketSink, message: ServerMessage) -> Result<(), DomainError> {
    let payload = encode(message)?;
    sink.send(Message::Text(payload.into()))
        .await
        .map_err(|err| DomainError::Streaming(format!("send error: {err}")))
}

/// Serializes one outbound message in its versioned envelope.
pub fn encode(message: ServerMessage) -> Result<String, DomainError> {
    serde_json::to_string(&ServerEnvelope::new(message))
        .map_err(|err| DomainError::Streaming(format!("serialization error: {err}")))
}
