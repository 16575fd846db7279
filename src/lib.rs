//! Sellerdesk API Library
//!
//! Seller back-office core: the metrics override & resolution engine, the
//! distribution allocation ledger, and the realtime dashboard push that
//! keeps connected clients consistent with both.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod migrator;
pub mod openapi;
pub mod realtime;
pub mod services;

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use utoipa::ToSchema;

use services::allocation::AllocationLedger;
use services::bulk::BulkOperationCoordinator;
use services::metric_resolver::{DbMetricSource, MetricResolver, RealMetricSource};
use services::metric_store::MetricStore;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub metric_store: Arc<MetricStore>,
    pub resolver: Arc<MetricResolver>,
    pub ledger: Arc<AllocationLedger>,
    pub bulk: Arc<BulkOperationCoordinator>,
    pub publisher: Arc<realtime::SnapshotPublisher>,
}

/// Wires the full service stack. The returned event receiver feeds
/// [`events::process_events`]; the shutdown receiver stops bulk batches and
/// the realtime tick cooperatively.
pub fn build_state(
    db: Arc<DatabaseConnection>,
    config: config::AppConfig,
    shutdown: watch::Receiver<bool>,
) -> (AppState, mpsc::Receiver<events::Event>) {
    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = events::EventSender::new(event_tx);

    let metric_store = Arc::new(MetricStore::new(db.clone(), event_sender.clone()));
    let source: Arc<dyn RealMetricSource> = Arc::new(DbMetricSource::new(db.clone()));
    let resolver = Arc::new(MetricResolver::new(metric_store.clone(), source));
    let ledger = Arc::new(AllocationLedger::new(db.clone(), event_sender.clone()));
    let bulk = Arc::new(BulkOperationCoordinator::new(
        ledger.clone(),
        metric_store.clone(),
        shutdown,
    ));
    let registry = realtime::RoomRegistry::new();
    let publisher = Arc::new(realtime::SnapshotPublisher::new(
        resolver.clone(),
        ledger.clone(),
        registry,
    ));

    let state = AppState {
        db,
        config,
        event_sender,
        metric_store,
        resolver,
        ledger,
        bulk,
        publisher,
    };
    (state, event_rx)
}

/// The versioned HTTP API.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::seller_metrics::seller_metrics_routes())
        .merge(handlers::distributions::distribution_routes())
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Common list-endpoint query parameters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}
