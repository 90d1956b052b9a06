use std::sync::Arc;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use bson::oid::ObjectId;
use futures::{SinkExt, StreamExt};
use scribeflow_billing::{
    ActiveSession, Ledger, SessionCoordinator, SessionEndReason, SessionError, SessionEvent,
    SessionStopper,
};
use scribeflow_services::UserLedger;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::storage::WsSender;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Verify JWT before accepting the WebSocket
    let claims = match state.auth.verify_access_token(&params.token) {
        Ok(c) => c,
        Err(_) => {
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap();
        }
    };

    let user_id = match ObjectId::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return Response::builder()
                .status(400)
                .body("Invalid user ID".into())
                .unwrap();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// One live transcription session at most per connection.
struct ConnectionSession {
    stopper: SessionStopper,
    audio_tx: mpsc::Sender<Vec<u8>>,
    pump: JoinHandle<()>,
}

impl ConnectionSession {
    fn is_live(&self) -> bool {
        !self.pump.is_finished()
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: ObjectId) {
    let connection_id = Uuid::new_v4().to_string();
    info!(%user_id, %connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    state
        .ws_storage
        .add(user_id, connection_id.clone(), sender.clone());

    send_json(
        &sender,
        &serde_json::json!({
            "type": "connected",
            "data": { "user_id": user_id.to_hex() },
        }),
    )
    .await;

    let mut session: Option<ConnectionSession> = None;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &sender, user_id, &connection_id, &text, &mut session)
                    .await;
            }
            Ok(Message::Binary(data)) => {
                // Audio frames only make sense inside a live session.
                if let Some(active) = session.as_ref().filter(|s| s.is_live()) {
                    if active.audio_tx.send(data.to_vec()).await.is_err() {
                        debug!(%connection_id, "audio channel closed, frame dropped");
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(%user_id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Socket gone: stop any live session; the coordinator halts billing
    // before tearing down the provider connection.
    if let Some(active) = session.take() {
        active.stopper.stop();
        active.pump.abort();
    }
    state.ws_storage.remove(&user_id, &connection_id);
    info!(%user_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    sender: &WsSender,
    user_id: ObjectId,
    connection_id: &str,
    text: &str,
    session: &mut Option<ConnectionSession>,
) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return,
    };

    let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let data = parsed.get("data");

    debug!(%user_id, %connection_id, msg_type, "WS message received");

    match msg_type {
        "ping" => {
            send_json(sender, &serde_json::json!({ "type": "pong" })).await;
        }
        "session:start" => {
            if session.as_ref().is_some_and(|s| s.is_live()) {
                // Starting while active is a no-op.
                debug!(%connection_id, "session:start ignored, session already active");
                return;
            }

            let language = data
                .and_then(|d| d.get("language"))
                .and_then(|l| l.as_str())
                .unwrap_or("en-US")
                .to_string();

            match start_session(state, user_id, &language).await {
                Ok(active) => {
                    send_json(
                        sender,
                        &serde_json::json!({
                            "type": "session:started",
                            "data": { "credits": active.balance_at_start(), "language": language },
                        }),
                    )
                    .await;

                    let (stopper, audio_tx, events) = active.into_parts();
                    let pump = tokio::spawn(pump_session_events(
                        events,
                        sender.clone(),
                        state.clone(),
                        user_id,
                        connection_id.to_string(),
                    ));
                    *session = Some(ConnectionSession {
                        stopper,
                        audio_tx,
                        pump,
                    });
                }
                Err(e) => {
                    send_session_refusal(sender, e).await;
                }
            }
        }
        "session:stop" => {
            if let Some(active) = session.take() {
                // The Ended event still flows through the pump.
                active.stopper.stop();
            }
        }
        _ => {
            debug!(%user_id, msg_type, "Unknown WS message type");
        }
    }
}

async fn start_session(
    state: &AppState,
    user_id: ObjectId,
    language: &str,
) -> Result<ActiveSession, SessionError> {
    let provider = state.providers.for_language(language)?;
    let ledger: Arc<dyn Ledger> = Arc::new(UserLedger::new(state.credits.clone(), user_id));
    SessionCoordinator::new(ledger, provider, language)
        .start()
        .await
}

/// Forwards session events to the client until the session ends. Balance
/// changes also fan out to the user's other tabs.
async fn pump_session_events(
    mut events: mpsc::Receiver<SessionEvent>,
    sender: WsSender,
    state: AppState,
    user_id: ObjectId,
    connection_id: String,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Transcript(transcript) => {
                send_json(
                    &sender,
                    &serde_json::json!({
                        "type": "transcript",
                        "data": {
                            "text": transcript.text,
                            "is_final": transcript.is_final,
                            "confidence": transcript.confidence,
                        },
                    }),
                )
                .await;
            }
            SessionEvent::Balance(credits) => {
                let update = serde_json::json!({
                    "type": "balance:update",
                    "data": { "credits": credits },
                });
                send_json(&sender, &update).await;
                super::dispatcher::send_to_user_except(
                    &state.ws_storage,
                    &user_id,
                    &connection_id,
                    &update,
                )
                .await;
            }
            SessionEvent::Ended(reason) => {
                send_json(&sender, &session_ended_message(&reason)).await;
                break;
            }
        }
    }
}

fn session_ended_message(reason: &SessionEndReason) -> serde_json::Value {
    let (reason_str, message) = match reason {
        SessionEndReason::Stopped => ("stopped", None),
        SessionEndReason::InsufficientCredits => ("insufficient_credits", None),
        SessionEndReason::BillingError(msg) => ("billing_error", Some(msg.clone())),
        SessionEndReason::ProviderClosed => ("provider_closed", None),
        SessionEndReason::ProviderError(msg) => ("provider_error", Some(msg.clone())),
    };

    serde_json::json!({
        "type": "session:ended",
        "data": { "reason": reason_str, "message": message },
    })
}

/// Session-start failures happen before any billing; insufficient credits
/// is reported in the same shape the metering loop would have used, so the
/// client has one code path for "go top up".
async fn send_session_refusal(sender: &WsSender, error: SessionError) {
    let message = match error {
        SessionError::InsufficientCredits => {
            send_json(
                sender,
                &serde_json::json!({
                    "type": "session:ended",
                    "data": { "reason": "insufficient_credits", "message": null },
                }),
            )
            .await;
            return;
        }
        SessionError::Configuration(field) => {
            format!("Speech provider not configured ({field})")
        }
        SessionError::Connect(e) => format!("Speech provider unreachable: {e}"),
        SessionError::Ledger(e) => format!("Billing unavailable: {e}"),
    };

    send_json(
        sender,
        &serde_json::json!({
            "type": "error",
            "data": { "message": message },
        }),
    )
    .await;
}

async fn send_json(sender: &WsSender, value: &serde_json::Value) {
    let text = serde_json::to_string(value).unwrap_or_default();
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        debug!(%e, "WS send failed");
    }
}
