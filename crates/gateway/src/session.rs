//! Per-connection session handling.
//!
//! A session moves through `Connecting → Authenticated → Active → Closed`.
//! `Connecting` covers the token check in the upgrade handler; a rejected
//! token never produces a `Session`. Once active, every inbound application
//! message is answered with exactly one push: a `points_data` snapshot or an
//! `error`.

use crate::client::{ClientState, SESSION_CHANNEL_BUFFER_SIZE};
use crate::error::{GatewayError, Result};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::simulator::{SimulatedEventSource, SimulatorHandle};
use crate::ws_server::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use ledger::{AwardEvent, LedgerEntry, LedgerService};
use metrics::{counter, gauge};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Keepalive ping interval.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long teardown waits for queued pushes to reach the socket.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Authenticated => "authenticated",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Where an award came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardSource {
    Client,
    Simulated,
}

impl AwardSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AwardSource::Client => "client",
            AwardSource::Simulated => "simulated",
        }
    }
}

/// Forward queued messages to the socket until a close frame goes out.
pub fn spawn_writer<S>(mut sink: S, mut rx: mpsc::Receiver<Message>) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    })
}

/// Background tasks owned by a session.
///
/// `teardown` consumes the handle, so cleanup runs exactly once.
pub struct SessionResources {
    simulator: Option<SimulatorHandle>,
    writer: JoinHandle<()>,
    outbound: mpsc::Sender<Message>,
}

impl SessionResources {
    pub fn new(
        simulator: Option<SimulatorHandle>,
        writer: JoinHandle<()>,
        outbound: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            simulator,
            writer,
            outbound,
        }
    }

    /// Cancel the simulator, then flush pending pushes and stop the writer.
    ///
    /// A close frame is queued behind whatever is already buffered, so a
    /// final error push still reaches the client. The writer is aborted only
    /// if the socket stops draining.
    pub async fn teardown(self) {
        if let Some(simulator) = self.simulator {
            simulator.cancel().await;
        }

        let outbound = self.outbound;
        let mut writer = self.writer;
        let drain = async {
            if outbound.send(Message::Close(None)).await.is_err() {
                debug!("Writer already stopped");
            }
            let _ = (&mut writer).await;
        };

        if timeout(WRITER_DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("Writer did not drain in {:?}, aborting", WRITER_DRAIN_TIMEOUT);
            writer.abort();
            let _ = writer.await;
        }
    }
}

/// Application-level state of one live connection.
pub struct Session {
    state: SessionState,
    client: Arc<ClientState>,
    ledger: LedgerService,
    /// Latest snapshot pushed to this client.
    entry: Option<LedgerEntry>,
}

impl Session {
    /// Create a session for a user that already passed the gate.
    pub fn new(client: Arc<ClientState>, ledger: LedgerService) -> Self {
        let mut session = Self {
            state: SessionState::Connecting,
            client,
            ledger,
            entry: None,
        };
        session.transition(SessionState::Authenticated);
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> &str {
        &self.client.user_id
    }

    /// Latest snapshot held by this session.
    pub fn entry(&self) -> Option<&LedgerEntry> {
        self.entry.as_ref()
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            "Session {} ({}): {} -> {}",
            self.client.id, self.client.user_id, self.state, next
        );
        self.state = next;
    }

    /// Load or create the user's entry and push the initial snapshot.
    pub async fn activate(&mut self) -> Result<()> {
        let entry = self.ledger.snapshot(&self.client.user_id).await?;
        self.push_snapshot(entry).await?;
        self.transition(SessionState::Active);
        Ok(())
    }

    /// Apply an award and push the updated snapshot.
    pub async fn apply_award(&mut self, event: AwardEvent, source: AwardSource) -> Result<()> {
        let entry = self.ledger.award(&self.client.user_id, &event).await?;

        counter!("rewards_awards_total", "source" => source.as_str()).increment(1);
        info!(
            "Awarded {} points ({}, {}) to {} via {}",
            event.amount,
            event.category,
            event.name,
            self.client.user_id,
            source.as_str()
        );

        self.push_snapshot(entry).await
    }

    /// Handle a single WebSocket frame.
    pub async fn handle_message(&mut self, msg: Message) -> Result<()> {
        match msg {
            Message::Text(text) => {
                let client_msg: ClientMessage = serde_json::from_str(text.as_str())?;
                self.handle_client_message(client_msg).await
            }
            Message::Binary(data) => {
                let client_msg: ClientMessage = serde_json::from_slice(&data)?;
                self.handle_client_message(client_msg).await
            }
            Message::Ping(data) => {
                self.client.tx.send(Message::Pong(data)).await?;
                Ok(())
            }
            Message::Pong(_) => Ok(()),
            Message::Close(_) => {
                // Will be handled by the connection loop
                Ok(())
            }
        }
    }

    async fn handle_client_message(&mut self, msg: ClientMessage) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(GatewayError::UnsupportedMessage(format!(
                "session is {}",
                self.state
            )));
        }

        match msg.to_award() {
            Some(award) => self.apply_award(award?, AwardSource::Client).await,
            None => {
                let entry = self.ledger.snapshot(&self.client.user_id).await?;
                self.push_snapshot(entry).await
            }
        }
    }

    /// Report an error to the client without closing the connection.
    pub async fn push_error(&self, err: &GatewayError) {
        counter!("rewards_errors_total", "kind" => err.kind()).increment(1);
        if let Err(e) = self.client.send(&ServerMessage::error(err.to_string())).await {
            debug!("Could not deliver error to {}: {}", self.client.id, e);
        }
    }

    async fn push_snapshot(&mut self, entry: LedgerEntry) -> Result<()> {
        self.client
            .send(&ServerMessage::points(entry.clone()))
            .await?;
        self.entry = Some(entry);
        Ok(())
    }

    /// Mark the session closed and drop the in-memory entry.
    pub fn close(&mut self) {
        self.entry = None;
        self.transition(SessionState::Closed);
    }
}

/// Drive one authenticated connection until the transport closes.
pub async fn run_session(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (ws_tx, mut ws_rx) = socket.split();

    // Single outbound channel keeps pushes in processing order
    let (tx, rx) = mpsc::channel::<Message>(SESSION_CHANNEL_BUFFER_SIZE);
    let writer = spawn_writer(ws_tx, rx);

    let client = Arc::new(ClientState::new(user_id, tx.clone()));
    let session_id = state.registry.register(client.clone());

    counter!("rewards_connections_total").increment(1);
    gauge!("rewards_active_sessions").set(state.registry.session_count() as f64);

    let mut session = Session::new(client.clone(), state.ledger.clone());

    let (sim_tx, mut sim_rx) = mpsc::channel::<AwardEvent>(4);
    let simulator = state
        .simulator_interval
        .map(|period| SimulatedEventSource::spawn(period, sim_tx));
    let resources = SessionResources::new(simulator, writer, tx);

    info!(
        "Session {} connected for user {} ({} live sessions for this user)",
        session_id,
        session.user_id(),
        state.registry.sessions_for_user(session.user_id())
    );

    match session.activate().await {
        Ok(()) => {
            let mut ping_interval = interval(PING_INTERVAL);
            ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ping_interval.reset();

            loop {
                tokio::select! {
                    biased;

                    msg = ws_rx.next() => {
                        match msg {
                            Some(Ok(msg)) => {
                                if let Err(e) = session.handle_message(msg).await {
                                    warn!("Error handling message from {}: {}", session_id, e);
                                    session.push_error(&e).await;
                                }
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {:?}", session_id, e);
                                break;
                            }
                            None => {
                                // Connection closed
                                break;
                            }
                        }
                    }

                    Some(event) = sim_rx.recv() => {
                        if let Err(e) = session.apply_award(event, AwardSource::Simulated).await {
                            warn!("Simulated award failed for {}: {}", session_id, e);
                            session.push_error(&e).await;
                        }
                    }

                    _ = ping_interval.tick() => {
                        if client.tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        Err(e) => {
            warn!("Failed to load ledger for session {}: {}", session_id, e);
            session.push_error(&e).await;
        }
    }

    // Simulator stops before the entry is released
    resources.teardown().await;
    session.close();
    state.registry.unregister(&session_id);

    counter!("rewards_disconnections_total").increment(1);
    gauge!("rewards_active_sessions").set(state.registry.session_count() as f64);

    info!("Session {} disconnected", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::channel::mpsc as sink_channel;
    use ledger::{Category, LedgerError, LedgerStore, MemoryLedgerStore};

    /// Store that is never reachable.
    struct UnavailableStore;

    #[async_trait]
    impl LedgerStore for UnavailableStore {
        fn backend(&self) -> &'static str {
            "unavailable"
        }

        async fn get(&self, _user_id: &str) -> ledger::Result<Option<LedgerEntry>> {
            Err(LedgerError::Store("connection refused".to_string()))
        }

        async fn get_or_create(&self, _user_id: &str) -> ledger::Result<LedgerEntry> {
            Err(LedgerError::Store("connection refused".to_string()))
        }

        async fn save(&self, _entry: &LedgerEntry) -> ledger::Result<()> {
            Err(LedgerError::Store("connection refused".to_string()))
        }
    }

    fn frame_json(msg: &Message) -> serde_json::Value {
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    fn session_with_store() -> (Session, mpsc::Receiver<Message>, MemoryLedgerStore) {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerService::new(Arc::new(store.clone()));
        let (tx, rx) = mpsc::channel(16);
        let client = Arc::new(ClientState::new("user-1", tx));
        (Session::new(client, ledger), rx, store)
    }

    async fn next_json(rx: &mut mpsc::Receiver<Message>) -> serde_json::Value {
        match rx.recv().await.unwrap() {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    fn text(json: &str) -> Message {
        Message::Text(json.to_string().into())
    }

    #[tokio::test]
    async fn test_activate_pushes_empty_snapshot() {
        let (mut session, mut rx, _store) = session_with_store();
        assert_eq!(session.state(), SessionState::Authenticated);

        session.activate().await.unwrap();
        assert_eq!(session.state(), SessionState::Active);

        let msg = next_json(&mut rx).await;
        assert_eq!(msg["type"], "points_data");
        assert_eq!(msg["data"]["totalPoints"], 0);
        assert!(msg["data"]["transactions"].as_array().unwrap().is_empty());
        assert!(msg["data"]["monthlyData"].as_array().unwrap().is_empty());
        assert!(msg["data"]["categoryData"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_points_pushes_updated_snapshot() {
        let (mut session, mut rx, store) = session_with_store();
        session.activate().await.unwrap();
        next_json(&mut rx).await;

        session
            .handle_message(text(
                r#"{"type":"add_points","category":"dailyLogin","name":"Daily Check-in","amount":25}"#,
            ))
            .await
            .unwrap();

        let msg = next_json(&mut rx).await;
        assert_eq!(msg["type"], "points_data");
        assert_eq!(msg["data"]["totalPoints"], 25);
        assert_eq!(msg["data"]["transactions"][0]["category"], "dailyLogin");
        assert_eq!(msg["data"]["transactions"][0]["amount"], 25);
        assert_eq!(msg["data"]["categoryData"][0]["category"], "Daily Login");
        assert_eq!(msg["data"]["categoryData"][0]["points"], 25);
        assert_eq!(msg["data"]["categoryData"][0]["percentage"], 100);

        assert_eq!(session.entry().unwrap().total_points, 25);
        let stored = store.get("user-1").await.unwrap().unwrap();
        assert_eq!(stored.total_points, 25);
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected_without_mutation() {
        let (mut session, mut rx, store) = session_with_store();
        session.activate().await.unwrap();
        next_json(&mut rx).await;

        let err = session
            .handle_message(text(
                r#"{"type":"add_points","category":"bogus","name":"x","amount":10}"#,
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Ledger(LedgerError::UnknownCategory(_))
        ));

        session.push_error(&err).await;
        let msg = next_json(&mut rx).await;
        assert_eq!(msg["type"], "error");

        let stored = store.get("user-1").await.unwrap().unwrap();
        assert_eq!(stored.total_points, 0);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_malformed_message_is_an_error() {
        let (mut session, _rx, _store) = session_with_store();
        session.activate().await.unwrap();

        let err = session.handle_message(text("{not json")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Json(_)));
    }

    #[tokio::test]
    async fn test_messages_before_activation_rejected() {
        let (mut session, _rx, _store) = session_with_store();
        let err = session
            .handle_message(text(r#"{"type":"get_points"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedMessage(_)));
    }

    #[tokio::test]
    async fn test_simulated_award_takes_same_path() {
        let (mut session, mut rx, _store) = session_with_store();
        session.activate().await.unwrap();
        next_json(&mut rx).await;

        session
            .apply_award(
                AwardEvent::new(Category::Achievement, "Level Up", 250),
                AwardSource::Simulated,
            )
            .await
            .unwrap();

        let msg = next_json(&mut rx).await;
        assert_eq!(msg["data"]["totalPoints"], 250);
        assert_eq!(msg["data"]["transactions"][0]["type"], "Achievement");
    }

    #[tokio::test]
    async fn test_close_releases_entry() {
        let (mut session, _rx, _store) = session_with_store();
        session.activate().await.unwrap();
        assert!(session.entry().is_some());

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.entry().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_simulator() {
        let (sim_tx, mut sim_rx) = mpsc::channel(4);
        let simulator = SimulatedEventSource::spawn(Duration::from_secs(30), sim_tx);
        let writer = tokio::spawn(std::future::pending::<()>());
        let (outbound, _rx) = mpsc::channel(4);

        SessionResources::new(Some(simulator), writer, outbound)
            .teardown()
            .await;

        // Simulator task is gone, so its sender is dropped
        assert!(sim_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_teardown_flushes_queued_pushes_before_close() {
        let (sink, delivered) = sink_channel::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_BUFFER_SIZE);
        let writer = spawn_writer(sink, rx);

        tx.send(text(r#"{"type":"error","message":"first"}"#))
            .await
            .unwrap();
        tx.send(text(r#"{"type":"error","message":"second"}"#))
            .await
            .unwrap();

        SessionResources::new(None, writer, tx).teardown().await;

        let frames: Vec<Message> = delivered.collect().await;
        assert_eq!(frames.len(), 3);
        assert_eq!(frame_json(&frames[0])["message"], "first");
        assert_eq!(frame_json(&frames[1])["message"], "second");
        assert!(matches!(frames[2], Message::Close(None)));
    }

    #[tokio::test]
    async fn test_failed_initial_load_delivers_error_before_close() {
        let (sink, delivered) = sink_channel::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_BUFFER_SIZE);
        let writer = spawn_writer(sink, rx);

        let client = Arc::new(ClientState::new("user-1", tx.clone()));
        let mut session = Session::new(client, LedgerService::new(Arc::new(UnavailableStore)));

        let err = session.activate().await.unwrap_err();
        assert!(matches!(err, GatewayError::Ledger(LedgerError::Store(_))));
        session.push_error(&err).await;

        SessionResources::new(None, writer, tx).teardown().await;
        session.close();

        let frames: Vec<Message> = delivered.collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frame_json(&frames[0])["type"], "error");
        assert!(matches!(frames[1], Message::Close(None)));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
