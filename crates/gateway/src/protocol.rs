//! WebSocket protocol message types.
//!
//! Defines the JSON message format for client-server communication.

use ledger::{AwardEvent, LedgerEntry, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Client → Server Messages
// ============================================================================

/// Message sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Award points to the connected user.
    AddPoints {
        /// Category key (e.g. "dailyLogin"). Validated against the known set.
        category: String,
        /// Human label for the award (e.g. "Daily Check-in").
        name: String,
        /// Positive point amount.
        amount: i64,
    },
    /// Ask for the current snapshot without changing anything.
    GetPoints,
}

impl ClientMessage {
    /// Validate an `add_points` payload into an award.
    pub fn to_award(&self) -> Option<Result<AwardEvent>> {
        match self {
            ClientMessage::AddPoints {
                category,
                name,
                amount,
            } => Some(AwardEvent::parse(category, name, *amount)),
            ClientMessage::GetPoints => None,
        }
    }
}

// ============================================================================
// Server → Client Messages
// ============================================================================

/// Message sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full ledger snapshot.
    PointsData {
        data: LedgerEntry,
    },
    /// Error message. The connection stays open.
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn points(entry: LedgerEntry) -> Self {
        ServerMessage::PointsData { data: entry }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
