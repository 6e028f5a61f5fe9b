//! Gateway error types.

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger::LedgerError;
use serde::Serialize;
use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Token missing, malformed, forged, or expired.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Ledger validation or storage error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// JSON serialization/deserialization error.
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame type the protocol does not accept.
    #[error("Unsupported message: {0}")]
    UnsupportedMessage(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound channel closed.
    #[error("Channel send error")]
    ChannelSend,
}

impl GatewayError {
    /// Short label used for the `kind` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth(_) => "auth",
            GatewayError::Ledger(e) if e.is_validation() => "validation",
            GatewayError::Ledger(_) => "store",
            GatewayError::Json(_) | GatewayError::UnsupportedMessage(_) => "malformed",
            GatewayError::Config(_) => "config",
            GatewayError::ChannelSend => "channel",
        }
    }
}

impl From<tokio::sync::mpsc::error::SendError<axum::extract::ws::Message>> for GatewayError {
    fn from(_: tokio::sync::mpsc::error::SendError<axum::extract::ws::Message>) -> Self {
        GatewayError::ChannelSend
    }
}

/// API error response.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Ledger(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            GatewayError::Json(_) | GatewayError::UnsupportedMessage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
