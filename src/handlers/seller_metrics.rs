//! Seller metrics and override endpoints.
//!
//! Dashboard reads resolve through the metric resolver; override writes are
//! admin-gated and land in the metric store, which emits the events that
//! refresh connected dashboards.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AdminClaims;
use crate::entities::metric_override::{self, MetricName, Period};
use crate::errors::ServiceError;
use crate::metrics::REGISTRY;
use crate::services::metric_resolver::ResolvedMetric;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct PeriodQuery {
    /// Reporting bucket; defaults to `total`.
    pub period: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub seller_id: Uuid,
    pub period: Period,
    pub metrics: BTreeMap<MetricName, ResolvedMetric>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetOverrideRequest {
    pub metric_name: String,
    /// Defaults to `total` when omitted.
    pub period: Option<String>,
    pub override_value: Decimal,
    pub period_specific_value: Option<Decimal>,
    /// Pre-override value for audit/revert; snapshotted from the real
    /// computation when omitted.
    pub original_value: Option<Decimal>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ClearAllQuery {
    /// Restrict the clear to one seller; clears every seller when omitted.
    pub seller_id: Option<Uuid>,
}

fn parse_period(raw: &Option<String>) -> Result<Period, ServiceError> {
    match raw {
        None => Ok(Period::default()),
        Some(raw) => Period::from_str(raw).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "unrecognized period '{}' (expected today, last7days, last30days or total)",
                raw
            ))
        }),
    }
}

fn parse_metric(raw: &str) -> Result<MetricName, ServiceError> {
    MetricName::from_str(raw)
        .ok_or_else(|| ServiceError::ValidationError(format!("unrecognized metric '{}'", raw)))
}

pub fn seller_metrics_routes() -> Router<AppState> {
    Router::new()
        .route("/sellers/:seller_id/metrics", get(get_seller_metrics))
        .route(
            "/sellers/:seller_id/overrides",
            get(list_overrides).post(set_override),
        )
        .route(
            "/sellers/:seller_id/overrides/:metric",
            delete(clear_override),
        )
        .route("/overrides/clear-all", delete(clear_all_overrides))
}

/// Resolved metrics for one seller and period.
#[utoipa::path(
    get,
    path = "/api/v1/sellers/{seller_id}/metrics",
    params(
        ("seller_id" = Uuid, Path, description = "Seller id"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Resolved metric map; individually unavailable metrics are marked, never omitted"),
        (status = 400, description = "Unrecognized period", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "metrics"
)]
pub async fn get_seller_metrics(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let period = parse_period(&query.period)?;
    let metrics = state.resolver.resolve(seller_id, period).await?;
    Ok(Json(ApiResponse::success(MetricsResponse {
        seller_id,
        period,
        metrics,
    })))
}

pub async fn list_overrides(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let overrides: Vec<metric_override::Model> = state.metric_store.get_overrides(seller_id).await?;
    Ok(Json(ApiResponse::success(overrides)))
}

/// Upserts an override for one (seller, metric, period) tuple.
#[utoipa::path(
    post,
    path = "/api/v1/sellers/{seller_id}/overrides",
    request_body = SetOverrideRequest,
    params(("seller_id" = Uuid, Path, description = "Seller id")),
    responses(
        (status = 200, description = "Override created or updated"),
        (status = 400, description = "Unrecognized metric or period", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin capability required", body = crate::errors::ErrorResponse)
    ),
    tag = "metrics"
)]
pub async fn set_override(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Json(body): Json<SetOverrideRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let metric = parse_metric(&body.metric_name)?;
    let period = parse_period(&body.period)?;

    // The original is the value the dashboard showed before masking; it is
    // only meaningful at creation time, so capture it now if the admin UI
    // did not send one.
    let original_value = match body.original_value {
        Some(value) => value,
        None => {
            state
                .resolver
                .real_value_or_zero(seller_id, metric, period)
                .await
        }
    };

    let stored = state
        .metric_store
        .set_override(
            seller_id,
            metric,
            period,
            body.override_value,
            body.period_specific_value,
            original_value,
        )
        .await?;

    REGISTRY.overrides_set_total.inc();
    Ok(Json(ApiResponse::success(stored)))
}

pub async fn clear_override(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path((seller_id, metric)): Path<(Uuid, String)>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let metric = parse_metric(&metric)?;
    let period = parse_period(&query.period)?;

    let deleted = state
        .metric_store
        .clear_override(seller_id, metric, period)
        .await?;
    if deleted {
        REGISTRY.overrides_cleared_total.inc();
    }

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "deleted": deleted }),
    )))
}

/// Bulk "clear all fake stats" used by admin maintenance tooling.
#[utoipa::path(
    delete,
    path = "/api/v1/overrides/clear-all",
    params(ClearAllQuery),
    responses(
        (status = 200, description = "Batch summary with per-item failures", body = crate::services::bulk::BatchSummary),
        (status = 403, description = "Admin capability required", body = crate::errors::ErrorResponse)
    ),
    tag = "metrics"
)]
pub async fn clear_all_overrides(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Query(query): Query<ClearAllQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.bulk.clear_overrides(query.seller_id).await;
    REGISTRY.overrides_cleared_total.inc_by(summary.successful);
    Ok(Json(ApiResponse::success(summary)))
}
