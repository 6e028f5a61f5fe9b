//! Session state and registry.
//!
//! Uses DashMap so connection setup and teardown never contend on a global lock.

use crate::error::{GatewayError, Result};
use crate::protocol::ServerMessage;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Buffer size for a session's outbound channel.
pub const SESSION_CHANNEL_BUFFER_SIZE: usize = 64;

/// Outbound side of one live connection.
pub struct ClientState {
    /// Unique session identifier.
    pub id: SessionId,
    /// Authenticated user.
    pub user_id: String,
    /// Channel feeding the connection's writer task. Pushes are delivered in
    /// the order they are sent here.
    pub tx: mpsc::Sender<Message>,
}

impl ClientState {
    pub fn new(user_id: impl Into<String>, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            tx,
        }
    }

    /// Serialize and push a message, waiting for buffer space.
    pub async fn send(&self, msg: &ServerMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.tx
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| GatewayError::ChannelSend)
    }
}

/// Registry of live sessions.
pub struct ClientRegistry {
    clients: DashMap<SessionId, Arc<ClientState>>,
}

impl ClientRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Register a new session.
    pub fn register(&self, client: Arc<ClientState>) -> SessionId {
        let id = client.id;
        info!("Session {} registered for user {}", id, client.user_id);
        self.clients.insert(id, client);
        id
    }

    /// Unregister a session.
    pub fn unregister(&self, session_id: &SessionId) {
        if let Some((_, client)) = self.clients.remove(session_id) {
            info!("Session {} unregistered for user {}", session_id, client.user_id);
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of live sessions for one user.
    pub fn sessions_for_user(&self, user_id: &str) -> usize {
        self.clients
            .iter()
            .filter(|c| c.value().user_id == user_id)
            .count()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
