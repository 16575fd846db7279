//! Distribution endpoints: seller product-management UI plus the sale
//! recording entry point called by the checkout collaborator.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::distribution::DistributionStatus;
use crate::errors::ServiceError;
use crate::metrics::REGISTRY;
use crate::services::allocation::{DistributionUpdate, NewDistribution};
use crate::{ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDistributionRequest {
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub allocated_stock: i32,
    #[serde(default)]
    pub markup: Decimal,
    pub seller_price: Option<Decimal>,
    #[serde(default)]
    pub commission_rate: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkCreateRequest {
    pub seller_id: Uuid,
    pub product_ids: Vec<Uuid>,
    pub allocated_stock: i32,
    #[serde(default)]
    pub markup: Decimal,
    #[serde(default)]
    pub commission_rate: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDistributionRequest {
    pub markup: Option<Decimal>,
    pub seller_price: Option<Decimal>,
    pub allocated_stock: Option<i32>,
    pub status: Option<String>,
    pub is_promoted: Option<bool>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub distribution_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordSaleRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub fn distribution_routes() -> Router<AppState> {
    Router::new()
        .route("/distributions", post(create_distribution))
        .route("/distributions/bulk", post(bulk_create).delete(bulk_delete))
        .route(
            "/distributions/:id",
            put(update_distribution).delete(delete_distribution).get(get_distribution),
        )
        .route("/distributions/:id/sales", post(record_sale))
        .route(
            "/sellers/:seller_id/distributions",
            get(list_seller_distributions),
        )
}

/// Distributes a product into the seller's storefront.
///
/// Re-distributing the same product is treated as "already distributed":
/// the existing row comes back unchanged rather than a hard error.
#[utoipa::path(
    post,
    path = "/api/v1/distributions",
    request_body = CreateDistributionRequest,
    responses(
        (status = 200, description = "Distribution created, or already existed"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Allocation exceeds warehouse stock", body = crate::errors::ErrorResponse)
    ),
    tag = "distributions"
)]
pub async fn create_distribution(
    State(state): State<AppState>,
    Json(body): Json<CreateDistributionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .ledger
        .create_distribution(NewDistribution {
            seller_id: body.seller_id,
            product_id: body.product_id,
            allocated_stock: body.allocated_stock,
            markup: body.markup,
            seller_price: body.seller_price,
            commission_rate: body.commission_rate,
        })
        .await;

    match result {
        Ok(created) => {
            REGISTRY.distributions_created_total.inc();
            Ok(Json(ApiResponse::success(created)))
        }
        Err(ServiceError::DuplicateDistribution(_)) => {
            let existing = state
                .ledger
                .find_distribution(body.seller_id, body.product_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Distribution for product {} not found",
                        body.product_id
                    ))
                })?;
            Ok(Json(ApiResponse::success_with_message(
                existing,
                "product already distributed".to_string(),
            )))
        }
        Err(e) => Err(e),
    }
}

pub async fn get_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let distribution = state.ledger.get_distribution(id).await?;
    Ok(Json(ApiResponse::success(distribution)))
}

pub async fn list_seller_distributions(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);
    let (items, total) = state.ledger.list_for_seller(seller_id, page, limit).await?;
    let total_pages = total.div_ceil(limit);
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn update_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDistributionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = body
        .status
        .as_deref()
        .map(|raw| {
            DistributionStatus::from_str(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("unrecognized status '{}'", raw))
            })
        })
        .transpose()?;

    let updated = state
        .ledger
        .update_distribution(
            id,
            DistributionUpdate {
                markup: body.markup,
                seller_price: body.seller_price.map(Some),
                allocated_stock: body.allocated_stock,
                status,
                is_promoted: body.is_promoted,
                commission_rate: body.commission_rate,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.ledger.delete_distribution(id).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "deleted": true }),
    )))
}

/// Consumes allocated stock for a completed checkout.
#[utoipa::path(
    post,
    path = "/api/v1/distributions/{id}/sales",
    request_body = RecordSaleRequest,
    params(("id" = Uuid, Path, description = "Distribution id")),
    responses(
        (status = 200, description = "Sale recorded; updated distribution returned"),
        (status = 404, description = "Distribution not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Quantity exceeds available stock", body = crate::errors::ErrorResponse)
    ),
    tag = "distributions"
)]
pub async fn record_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RecordSaleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    match state.ledger.record_sale(id, body.quantity).await {
        Ok(updated) => {
            REGISTRY.sales_recorded_total.inc();
            Ok(Json(ApiResponse::success(updated)))
        }
        Err(e @ ServiceError::InsufficientAvailableStock { .. }) => {
            REGISTRY.sales_rejected_total.inc();
            Err(e)
        }
        Err(e) => Err(e),
    }
}

pub async fn bulk_create(
    State(state): State<AppState>,
    Json(body): Json<BulkCreateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state
        .bulk
        .bulk_create_distributions(
            body.seller_id,
            body.product_ids,
            body.allocated_stock,
            body.markup,
            body.commission_rate,
        )
        .await;
    REGISTRY.distributions_created_total.inc_by(summary.successful);
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.bulk.bulk_delete_distributions(body.distribution_ids).await;
    Ok(Json(ApiResponse::success(summary)))
}
