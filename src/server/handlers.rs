use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, info_span, warn, Instrument};

use super::state::AppState;
use crate::error::GatewayError;
use crate::session::{
    ClientCommand, ServerEvent, SessionConfig, SessionController, SessionEvent, SessionStats,
};

/// Outbound events buffered per client before the writer backpressures
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend_available: bool,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let active_sessions = state.sessions.read().await.len();

    Json(HealthResponse {
        status: "ok".to_string(),
        backend_available: state.backend_available,
        active_sessions,
    })
}

/// GET /sessions
/// Snapshot of all active sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    let mut stats = Vec::with_capacity(sessions.len());
    for handle in sessions.values() {
        stats.push(handle.read().await.clone());
    }
    stats.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    Json(stats)
}

/// GET /sessions/:session_id
/// Snapshot of one session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(handle) => {
            let stats = handle.read().await.clone();
            (StatusCode::OK, Json(stats)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET /ws
/// Upgrade to a transcription session
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one client session over its WebSocket.
///
/// The socket is split: a writer task drains the controller's outbound
/// events, while this task translates incoming frames into session events.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = format!("session-{}", uuid::Uuid::new_v4());
    info!(%session_id, "client connected");

    let session_config = SessionConfig {
        session_id: session_id.clone(),
        default_language: state.config.recognition.default_language.clone(),
        stop_settle: Duration::from_millis(state.config.recognition.stop_settle_ms),
    };

    let stats_handle = Arc::new(RwLock::new(SessionStats::new(&session_id)));
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), Arc::clone(&stats_handle));

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE_CAPACITY);
    let (controller, events_tx) = SessionController::new(
        session_config,
        state.config.recognition.clone(),
        Arc::clone(&state.extractor),
        outbound_tx.clone(),
        Arc::clone(&stats_handle),
    );

    let controller_task = tokio::spawn(
        controller
            .run()
            .instrument(info_span!("session", id = %session_id)),
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: serialize server events onto the socket
    let writer_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("failed to serialize server event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Reader: translate frames into session events
    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%session_id, "websocket error: {}", e);
                break;
            }
        };

        let event = match frame {
            Message::Binary(bytes) => SessionEvent::Audio(bytes),
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => SessionEvent::Command(command),
                Err(e) => {
                    warn!(%session_id, "unparseable client message: {}", e);
                    let message = GatewayError::InvalidInput(format!(
                        "unrecognized client message: {}",
                        e
                    ))
                    .to_string();
                    let _ = outbound_tx.send(ServerEvent::Error { message }).await;
                    continue;
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if events_tx.send(event).await.is_err() {
            break;
        }
    }

    // Connection gone: tear the session down immediately
    let _ = events_tx.send(SessionEvent::Disconnected).await;
    if let Err(e) = controller_task.await {
        error!(%session_id, "session task failed: {}", e);
    }
    writer_task.abort();

    state.sessions.write().await.remove(&session_id);
    info!(%session_id, "session removed");
}
