use axum::extract::ws::{Message, WebSocket};
use bson::oid::ObjectId;
use dashmap::DashMap;
use futures::stream::SplitSink;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

struct Connection {
    id: String,
    sender: WsSender,
}

/// Tracks all active WebSocket connections by user ID.
/// Each user can have multiple connections (multiple tabs/devices).
pub struct WsStorage {
    connections: DashMap<ObjectId, Vec<Connection>>,
}

impl WsStorage {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn add(&self, user_id: ObjectId, connection_id: String, sender: WsSender) {
        self.connections.entry(user_id).or_default().push(Connection {
            id: connection_id,
            sender,
        });
    }

    pub fn remove(&self, user_id: &ObjectId, connection_id: &str) {
        if let Some(mut connections) = self.connections.get_mut(user_id) {
            connections.retain(|c| c.id != connection_id);
            if connections.is_empty() {
                drop(connections);
                self.connections.remove(user_id);
            }
        }
    }

    pub fn get_senders(&self, user_id: &ObjectId) -> Vec<WsSender> {
        self.connections
            .get(user_id)
            .map(|conns| conns.iter().map(|c| c.sender.clone()).collect())
            .unwrap_or_default()
    }

    /// All of a user's senders except the named connection (the "other tabs").
    pub fn get_senders_except(&self, user_id: &ObjectId, connection_id: &str) -> Vec<WsSender> {
        self.connections
            .get(user_id)
            .map(|conns| {
                conns
                    .iter()
                    .filter(|c| c.id != connection_id)
                    .map(|c| c.sender.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|r| r.value().len()).sum()
    }
}

impl Default for WsStorage {
    fn default() -> Self {
        Self::new()
    }
}
