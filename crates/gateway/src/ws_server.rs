//! HTTP and WebSocket routes using Axum.
//!
//! Endpoints:
//! - `GET /ws?token=...` - Authenticated WebSocket upgrade
//! - `GET /health` - Health check
//! - `GET /rewards/coupons` - Coupon catalog
//! - `GET /rewards/points` - Caller's ledger snapshot (`Authorization: Bearer`)

use crate::auth::{bearer_token, AuthError, TokenAuthority};
use crate::client::ClientRegistry;
use crate::config::{GatewayConfig, StoreBackend};
use crate::error::{GatewayError, Result};
use crate::session::run_session;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ledger::{
    LedgerEntry, LedgerService, MemoryLedgerStore, RedisLedgerStore, SharedLedgerStore,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub ledger: LedgerService,
    pub authority: TokenAuthority,
    /// Per-session simulator period; `None` disables it.
    pub simulator_interval: Option<Duration>,
}

impl AppState {
    /// Build state with the store backend chosen in `config`.
    ///
    /// For Redis, connectivity is checked up front so a bad store fails
    /// startup instead of the first session.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        let store: SharedLedgerStore = match config.store {
            StoreBackend::Memory => Arc::new(MemoryLedgerStore::new()),
            StoreBackend::Redis => {
                info!("Connecting to Redis at {}", config.redis_url);
                let store = RedisLedgerStore::new(&config.redis_url)?;
                store.ping().await?;
                info!("Connected to Redis");
                Arc::new(store)
            }
        };

        Ok(Self::new(
            store,
            TokenAuthority::new(&config.jwt_secret),
            config.simulator_interval,
        ))
    }

    pub fn new(
        store: SharedLedgerStore,
        authority: TokenAuthority,
        simulator_interval: Option<Duration>,
    ) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            ledger: LedgerService::new(store),
            authority,
            simulator_interval,
        }
    }
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/rewards/coupons", get(coupons_handler))
        .route("/rewards/points", get(points_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sessions: usize,
    store: &'static str,
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        sessions: state.registry.session_count(),
        store: state.ledger.backend(),
    })
}

/// Upgrade query parameters.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The token is checked before upgrading; a rejected request gets a 401 and
/// no session is created.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user_id = match state.authority.verify_optional(params.token.as_deref()) {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!("Rejected WebSocket upgrade: {}", e);
            counter!("rewards_auth_rejections_total").increment(1);
            return GatewayError::Auth(e).into_response();
        }
    };

    info!("Upgrading connection for user {}", user_id);
    ws.on_upgrade(move |socket| run_session(socket, state, user_id))
}

/// A coupon that points can be redeemed for.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub points: u64,
    pub description: &'static str,
}

/// Coupon catalog offered to clients.
pub static COUPONS: [Coupon; 4] = [
    Coupon {
        kind: "zomato",
        name: "Zomato Coupon",
        points: 100,
        description: "Get discount on your next order",
    },
    Coupon {
        kind: "movie",
        name: "Movie Coupon",
        points: 500,
        description: "Get discount on movie tickets",
    },
    Coupon {
        kind: "flight",
        name: "Flight Coupon",
        points: 1000,
        description: "Get discount on flight bookings",
    },
    Coupon {
        kind: "travel",
        name: "Travel Coupon",
        points: 1500,
        description: "Get discount on travel packages",
    },
];

#[derive(Serialize)]
struct CouponsResponse {
    success: bool,
    coupons: &'static [Coupon],
}

async fn coupons_handler() -> impl IntoResponse {
    Json(CouponsResponse {
        success: true,
        coupons: &COUPONS,
    })
}

#[derive(Serialize)]
struct PointsResponse {
    success: bool,
    data: LedgerEntry,
}

/// Read-only ledger snapshot for the bearer of the token.
async fn points_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PointsResponse>> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthError::MissingToken)?;
    let user_id = state.authority.verify(token)?;

    let entry = state.ledger.snapshot(&user_id).await?;
    Ok(Json(PointsResponse {
        success: true,
        data: entry,
    }))
}
