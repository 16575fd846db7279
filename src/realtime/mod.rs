//! Realtime dashboard push.
//!
//! Each seller has a broadcast room; connected dashboard sockets join the
//! room and receive `{metrics, distributions}` snapshots whenever a write
//! lands and on a fixed periodic tick. Delivery is fire-and-forget: a dead
//! socket is pruned on the next send and a reconnecting client is caught up
//! by the next tick. The registry is process-local and rebuilt from live
//! connections on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::entities::distribution;
use crate::entities::metric_override::{MetricName, Period};
use crate::errors::ServiceError;
use crate::metrics::REGISTRY;
use crate::services::allocation::AllocationLedger;
use crate::services::metric_resolver::{MetricResolver, ResolvedMetric};
use crate::AppState;

pub type ConnectionId = Uuid;

/// Per-seller room membership. Keys are seller ids, values the live
/// connections subscribed to that seller's dashboard.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<Uuid, HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        seller_id: Uuid,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<String>,
    ) {
        self.rooms
            .entry(seller_id)
            .or_default()
            .insert(connection_id, sender);
        debug!(seller_id = %seller_id, connection_id = %connection_id, "Subscribed to seller room");
    }

    pub fn unsubscribe(&self, seller_id: Uuid, connection_id: ConnectionId) {
        if let Some(mut room) = self.rooms.get_mut(&seller_id) {
            room.remove(&connection_id);
        }
        self.rooms.remove_if(&seller_id, |_, room| room.is_empty());
        debug!(seller_id = %seller_id, connection_id = %connection_id, "Unsubscribed from seller room");
    }

    /// Sends `payload` to every connection in the seller's room. Dead
    /// senders are pruned as they are found; one closed socket never
    /// prevents delivery to the rest. Returns the delivered count.
    pub fn publish(&self, seller_id: Uuid, payload: &str) -> usize {
        let mut delivered = 0;
        if let Some(mut room) = self.rooms.get_mut(&seller_id) {
            room.retain(|_, sender| match sender.send(payload.to_string()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            });
        }
        self.rooms.remove_if(&seller_id, |_, room| room.is_empty());
        delivered
    }

    /// Sellers with at least one live subscriber. The periodic tick only
    /// recomputes for these.
    pub fn active_sellers(&self) -> Vec<Uuid> {
        self.rooms
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn room_size(&self, seller_id: Uuid) -> usize {
        self.rooms
            .get(&seller_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Envelope for every message pushed over a room socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomEventKind {
    Snapshot,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomMessage<T> {
    pub event: RoomEventKind,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> RoomMessage<T> {
    pub fn new(event: RoomEventKind, data: T) -> Self {
        Self {
            event,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What a dashboard needs to repaint: the resolved metric map for the live
/// bucket plus the seller's distribution rows.
#[derive(Debug, Clone, Serialize)]
pub struct SellerSnapshot {
    pub seller_id: Uuid,
    pub period: Period,
    pub metrics: BTreeMap<MetricName, ResolvedMetric>,
    pub distributions: Vec<distribution::Model>,
    pub generated_at: DateTime<Utc>,
}

/// Builds and publishes room snapshots. The event loop calls
/// [`refresh_seller`](Self::refresh_seller) after every write; the periodic
/// tick calls it for every seller with subscribers.
pub struct SnapshotPublisher {
    resolver: Arc<MetricResolver>,
    ledger: Arc<AllocationLedger>,
    registry: RoomRegistry,
}

impl SnapshotPublisher {
    pub fn new(
        resolver: Arc<MetricResolver>,
        ledger: Arc<AllocationLedger>,
        registry: RoomRegistry,
    ) -> Self {
        Self {
            resolver,
            ledger,
            registry,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Resolves the live bucket and assembles the room payload. Reads go
    /// through the resolver, never against raw tables.
    pub async fn build_snapshot(&self, seller_id: Uuid) -> Result<SellerSnapshot, ServiceError> {
        let metrics = self.resolver.resolve(seller_id, Period::Today).await?;
        let distributions = self.ledger.snapshot_for_seller(seller_id).await?;
        Ok(SellerSnapshot {
            seller_id,
            period: Period::Today,
            metrics,
            distributions,
            generated_at: Utc::now(),
        })
    }

    /// Re-resolves and republishes one seller's room. Rooms with no
    /// subscribers are skipped so idle sellers cost nothing.
    pub async fn refresh_seller(&self, seller_id: Uuid) -> Result<(), ServiceError> {
        if self.registry.room_size(seller_id) == 0 {
            return Ok(());
        }

        let snapshot = self.build_snapshot(seller_id).await?;
        let payload = RoomMessage::new(RoomEventKind::Snapshot, snapshot)
            .to_json()
            .map_err(|e| ServiceError::InternalError(format!("snapshot serialization: {}", e)))?;

        let delivered = self.registry.publish(seller_id, &payload);
        if delivered > 0 {
            REGISTRY.snapshots_published_total.inc();
        }
        debug!(seller_id = %seller_id, delivered, "Room snapshot published");
        Ok(())
    }
}

/// Periodic re-resolve tick. Keeps "today" numbers advancing on connected
/// dashboards even without an explicit write. Stops cooperatively when the
/// shutdown signal flips.
pub fn spawn_periodic_tick(
    publisher: Arc<SnapshotPublisher>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "Realtime tick started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for seller_id in publisher.registry().active_sellers() {
                        if let Err(e) = publisher.refresh_seller(seller_id).await {
                            warn!(seller_id = %seller_id, error = %e, "Tick refresh failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Realtime tick stopped");
                        break;
                    }
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct WsAuthParams {
    /// Bearer token; admin tokens unlock multi-room membership.
    pub token: Option<String>,
}

/// Client-to-server room command. Only admin connections may join rooms
/// beyond the one in the connection path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
enum RoomCommand {
    Subscribe { seller_id: Uuid },
    Unsubscribe { seller_id: Uuid },
}

pub fn realtime_routes() -> Router<AppState> {
    Router::new().route("/ws/sellers/:seller_id", get(seller_room_ws))
}

async fn seller_room_ws(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Query(params): Query<WsAuthParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let is_admin = params
        .token
        .as_deref()
        .and_then(|token| auth::verify_token(&state.config.jwt_secret, token).ok())
        .map(|claims| claims.is_admin)
        .unwrap_or(false);

    ws.on_upgrade(move |socket| handle_socket(socket, state, seller_id, is_admin))
}

async fn handle_socket(socket: WebSocket, state: AppState, seller_id: Uuid, is_admin: bool) {
    let connection_id = Uuid::new_v4();
    let registry = state.publisher.registry().clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    registry.subscribe(seller_id, connection_id, tx.clone());
    REGISTRY.realtime_connections.inc();
    info!(seller_id = %seller_id, connection_id = %connection_id, is_admin, "Dashboard connected");

    // Joined rooms, for cleanup on disconnect. Index 0 is the path room.
    let mut rooms = vec![seller_id];

    // Catch the client up immediately; the periodic tick covers it from
    // here on.
    if let Ok(snapshot) = state.publisher.build_snapshot(seller_id).await {
        if let Ok(payload) = RoomMessage::new(RoomEventKind::Snapshot, snapshot).to_json() {
            let _ = tx.send(payload);
        }
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            Some(payload) = rx.recv() => {
                if ws_tx.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_room_command(&text, is_admin, connection_id, &registry, &tx, &mut rooms);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    for room in rooms {
        registry.unsubscribe(room, connection_id);
    }
    REGISTRY.realtime_connections.dec();
    info!(seller_id = %seller_id, connection_id = %connection_id, "Dashboard disconnected");
}

fn handle_room_command(
    text: &str,
    is_admin: bool,
    connection_id: ConnectionId,
    registry: &RoomRegistry,
    tx: &mpsc::UnboundedSender<String>,
    rooms: &mut Vec<Uuid>,
) {
    let command: RoomCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(_) => {
            send_error(tx, "unrecognized command");
            return;
        }
    };

    match command {
        RoomCommand::Subscribe { seller_id } => {
            if !is_admin {
                send_error(tx, "multi-room membership requires admin visibility");
                return;
            }
            if !rooms.contains(&seller_id) {
                registry.subscribe(seller_id, connection_id, tx.clone());
                rooms.push(seller_id);
            }
        }
        RoomCommand::Unsubscribe { seller_id } => {
            // The path room stays for the lifetime of the connection.
            if let Some(pos) = rooms.iter().skip(1).position(|room| *room == seller_id) {
                registry.unsubscribe(seller_id, connection_id);
                rooms.remove(pos + 1);
            }
        }
    }
}

fn send_error(tx: &mpsc::UnboundedSender<String>, reason: &str) {
    if let Ok(payload) =
        RoomMessage::new(RoomEventKind::Error, serde_json::json!({ "reason": reason })).to_json()
    {
        let _ = tx.send(payload);
    }
}
