use axum::extract::ws::Message;
use bson::oid::ObjectId;
use futures::SinkExt;
use tracing::{debug, warn};

use super::storage::{WsSender, WsStorage};

async fn send_all(senders: Vec<WsSender>, message: &serde_json::Value) {
    let text = serde_json::to_string(message).unwrap_or_default();

    for sender in senders {
        let mut guard = sender.lock().await;
        if let Err(e) = guard.send(Message::text(text.clone())).await {
            warn!(%e, "Failed to send WS message");
        } else {
            debug!("WS message sent");
        }
    }
}

/// Broadcasts a JSON message to all connections of the specified users.
pub async fn broadcast(ws_storage: &WsStorage, user_ids: &[ObjectId], message: &serde_json::Value) {
    for user_id in user_ids {
        send_all(ws_storage.get_senders(user_id), message).await;
    }
}

/// Sends a JSON message to a specific user's connections.
pub async fn send_to_user(
    ws_storage: &WsStorage,
    user_id: &ObjectId,
    message: &serde_json::Value,
) {
    broadcast(ws_storage, &[*user_id], message).await;
}

/// Sends a JSON message to a user's connections except the named one.
pub async fn send_to_user_except(
    ws_storage: &WsStorage,
    user_id: &ObjectId,
    connection_id: &str,
    message: &serde_json::Value,
) {
    send_all(
        ws_storage.get_senders_except(user_id, connection_id),
        message,
    )
    .await;
}
