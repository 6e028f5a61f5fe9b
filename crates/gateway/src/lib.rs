//! Gateway service for live points ledger updates over WebSocket.
//!
//! This service:
//! - Authenticates connections with a JWT passed as `?token=` before upgrading
//! - Pushes the user's ledger snapshot on connect
//! - Applies `add_points` awards and pushes the updated snapshot
//! - Optionally feeds simulated awards into each session for demos
//!
//! ## Architecture
//!
//! ```text
//! Client ──ws──▶ ws_handler (token check)
//!                    ↓
//!                Session ◀── SimulatedEventSource
//!                    ↓
//!                LedgerService (per-user lock)
//!                    ↓
//!                LedgerStore (memory | redis)
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod simulator;
pub mod ws_server;

pub use auth::{AuthError, TokenAuthority};
pub use client::{ClientRegistry, ClientState, SessionId};
pub use config::{GatewayConfig, StoreBackend};
pub use error::{GatewayError, Result};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{Session, SessionResources, SessionState};
pub use simulator::{SimulatedEventSource, SimulatorHandle};
pub use ws_server::{create_router, AppState};
