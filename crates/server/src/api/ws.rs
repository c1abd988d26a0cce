//! WebSocket job control sessions.
//!
//! Each connection is one session. Clients send job commands as JSON text
//! frames and receive the events of their own session's jobs. When the
//! connection closes, every job of the session is removed and stops before
//! its next item.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use deskrelay_core::{JobEvent, StartBulkJob};

use crate::metrics::{
    WS_COMMANDS, WS_LAG_EVENTS, WS_MESSAGES_SENT, WS_SESSIONS_ACTIVE, WS_SESSIONS_TOTAL,
};
use crate::state::AppState;

/// Buffer for messages addressed directly to one session.
const DIRECT_BUFFER: usize = 32;

/// Command sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Start a bulk job for a profile.
    StartBulk(StartBulkJob),
    Pause { profile: String },
    Resume { profile: String },
    End { profile: String },
}

impl ClientCommand {
    fn name(&self) -> &'static str {
        match self {
            ClientCommand::StartBulk(_) => "start-bulk",
            ClientCommand::Pause { .. } => "pause",
            ClientCommand::Resume { .. } => "resume",
            ClientCommand::End { .. } => "end",
        }
    }
}

/// Session-level message sent to a client, next to job events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionMessage {
    /// First message of every connection.
    #[serde(rename_all = "camelCase")]
    Session { session_id: String },
    /// A command frame could not be understood.
    CommandError { message: String },
}

fn event_type(event: &JobEvent) -> &'static str {
    match event {
        JobEvent::ItemResult { .. } => "item-result",
        JobEvent::ItemUpdate { .. } => "item-update",
        JobEvent::JobCompleted { .. } => "job-completed",
        JobEvent::JobEnded { .. } => "job-ended",
        JobEvent::JobError { .. } => "job-error",
    }
}

/// Parse a command frame and apply it to the session's jobs.
///
/// Returns a message for the client when the frame is not a valid command.
pub async fn handle_command(
    state: &AppState,
    session_id: &str,
    text: &str,
) -> Option<SessionMessage> {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(session_id, error = %e, "Invalid command frame");
            WS_COMMANDS.with_label_values(&["invalid"]).inc();
            return Some(SessionMessage::CommandError {
                message: format!("Invalid command: {}", e),
            });
        }
    };

    WS_COMMANDS.with_label_values(&[command.name()]).inc();
    let runner = state.runner();

    let (profile, applied) = match command {
        ClientCommand::StartBulk(request) => {
            runner.start(session_id, request).await;
            return None;
        }
        ClientCommand::Pause { profile } => {
            let applied = runner.pause(session_id, &profile).await;
            (profile, applied)
        }
        ClientCommand::Resume { profile } => {
            let applied = runner.resume(session_id, &profile).await;
            (profile, applied)
        }
        ClientCommand::End { profile } => {
            let applied = runner.end(session_id, &profile).await;
            (profile, applied)
        }
    };

    if !applied {
        debug!(session_id, profile = %profile, "Control command for unknown job ignored");
    }
    None
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

fn to_frame<T: Serialize>(msg: &T) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize session message: {}", e);
            None
        }
    }
}

/// Handle a single WebSocket session.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before accepting commands so no event of this session is missed
    let mut events = state.runner().events().subscribe();
    let (direct_tx, mut direct_rx) = mpsc::channel::<SessionMessage>(DIRECT_BUFFER);

    WS_SESSIONS_TOTAL.inc();
    WS_SESSIONS_ACTIVE.inc();
    info!(
        session_id = %session_id,
        subscribers = state.runner().events().subscriber_count(),
        "WebSocket session opened"
    );

    let _ = direct_tx
        .send(SessionMessage::Session {
            session_id: session_id.clone(),
        })
        .await;

    let own_session = session_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => {
                        let msg_type = match &msg {
                            SessionMessage::Session { .. } => "session",
                            SessionMessage::CommandError { .. } => "command-error",
                        };
                        WS_MESSAGES_SENT.with_label_values(&[msg_type]).inc();
                        to_frame(&msg)
                    }
                    None => break,
                },
                result = events.recv() => match result {
                    Ok(envelope) if envelope.session_id == own_session => {
                        WS_MESSAGES_SENT
                            .with_label_values(&[event_type(&envelope.event)])
                            .inc();
                        to_frame(&envelope.event)
                    }
                    Ok(_) => None,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(session_id = %own_session, "WebSocket session lagged, skipped {} events", n);
                        WS_LAG_EVENTS.inc();
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                },
            };

            if let Some(frame) = frame {
                if sender.send(frame).await.is_err() {
                    debug!("WebSocket send failed, client disconnected");
                    break;
                }
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_command(&state, &session_id, text.as_str()).await {
                    if direct_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(_) => {
                // Ping/pong is handled by axum; binary frames are ignored
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Stop every job this session started
    let removed = state.registry().delete_all_for_session(&session_id).await;
    send_task.abort();
    WS_SESSIONS_ACTIVE.dec();
    info!(session_id = %session_id, jobs_stopped = removed, "WebSocket session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_bulk() {
        let command: ClientCommand = serde_json::from_value(json!({
            "type": "start-bulk",
            "profile": "support",
            "emails": ["a@x.com", "b@x.com"],
            "subject": "Hello",
            "description": "<p>Body</p>",
            "delay": 2.5,
            "sendReply": true,
            "verify": false
        }))
        .unwrap();

        match command {
            ClientCommand::StartBulk(request) => {
                assert_eq!(request.profile, "support");
                assert_eq!(request.emails.len(), 2);
                assert_eq!(request.delay, 2.5);
                assert!(request.send_reply);
                assert!(!request.verify);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_commands() {
        for (kind, expected) in [("pause", "pause"), ("resume", "resume"), ("end", "end")] {
            let command: ClientCommand =
                serde_json::from_value(json!({"type": kind, "profile": "support"})).unwrap();
            assert_eq!(command.name(), expected);
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        let result: Result<ClientCommand, _> =
            serde_json::from_value(json!({"type": "restart", "profile": "support"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_session_message_format() {
        let json = serde_json::to_value(SessionMessage::Session {
            session_id: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "session", "sessionId": "abc"}));

        let json = serde_json::to_value(SessionMessage::CommandError {
            message: "bad".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "command-error");
    }
}
