use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::metric_override::{MetricName, Period};
use crate::errors::ErrorResponse;
use crate::handlers::distributions::{
    BulkCreateRequest, BulkDeleteRequest, CreateDistributionRequest, RecordSaleRequest,
    UpdateDistributionRequest,
};
use crate::handlers::seller_metrics::SetOverrideRequest;
use crate::services::bulk::{BatchError, BatchSummary};
use crate::services::metric_resolver::{MetricSource, ResolvedMetric};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::seller_metrics::get_seller_metrics,
        crate::handlers::seller_metrics::set_override,
        crate::handlers::seller_metrics::clear_all_overrides,
        crate::handlers::distributions::create_distribution,
        crate::handlers::distributions::record_sale,
    ),
    components(schemas(
        ErrorResponse,
        MetricName,
        Period,
        MetricSource,
        ResolvedMetric,
        SetOverrideRequest,
        CreateDistributionRequest,
        UpdateDistributionRequest,
        BulkCreateRequest,
        BulkDeleteRequest,
        RecordSaleRequest,
        BatchSummary,
        BatchError,
    )),
    tags(
        (name = "metrics", description = "Seller metric resolution and overrides"),
        (name = "distributions", description = "Product distribution allocation")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
