//! Effective-metric resolution.
//!
//! Every dashboard read goes through [`MetricResolver::resolve`]: for each
//! recognized metric it merges the seller's real computed value with any
//! active override. Real values come from a [`RealMetricSource`], so the
//! order/traffic collaborators stay behind a seam and tests can substitute
//! fixtures.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::allocation_sale::{self, Entity as AllocationSaleEntity};
use crate::entities::metric_override::{MetricName, Period};
use crate::entities::seller::Entity as SellerEntity;
use crate::errors::ServiceError;
use crate::services::metric_store::{MetricStore, OverrideMap};

/// Where a resolved value came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricSource {
    Real,
    Override,
    /// The real computation failed and no override masks it. The dashboard
    /// renders the other metrics and a retry banner for this one.
    Unavailable,
}

/// Final value shown to a dashboard for one metric, with the real value
/// alongside so the admin UI can display "original" next to "current".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedMetric {
    pub metric_name: MetricName,
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    pub source: MetricSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_value: Option<Decimal>,
}

/// Real-data collaborator: computes a seller's actual metric value for a
/// period. Implementations must not panic on missing data; "cannot compute"
/// is `Err(DataUnavailable)`.
#[async_trait]
pub trait RealMetricSource: Send + Sync {
    async fn compute(
        &self,
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    ) -> Result<Decimal, ServiceError>;
}

#[derive(Clone)]
pub struct MetricResolver {
    store: Arc<MetricStore>,
    source: Arc<dyn RealMetricSource>,
}

impl MetricResolver {
    pub fn new(store: Arc<MetricStore>, source: Arc<dyn RealMetricSource>) -> Self {
        Self { store, source }
    }

    /// Resolves every recognized metric for one seller and period.
    ///
    /// Override precedence per metric: period-specific row first; for
    /// static metrics a `total` row applies to every period; otherwise the
    /// real computation. A failing real computation degrades that metric
    /// only — the rest of the map still resolves.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        seller_id: Uuid,
        period: Period,
    ) -> Result<BTreeMap<MetricName, ResolvedMetric>, ServiceError> {
        let overrides = self.store.overrides_map(seller_id).await?;
        let mut resolved = BTreeMap::new();

        for metric in MetricName::iter() {
            // The real value is fetched even when an override masks it so
            // the admin UI can show both.
            let real_value = match self.source.compute(seller_id, metric, period).await {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(
                        seller_id = %seller_id,
                        metric = %metric,
                        error = %e,
                        "Real metric computation unavailable"
                    );
                    None
                }
            };

            let entry = match effective_override(&overrides, metric, period) {
                Some(row) => ResolvedMetric {
                    metric_name: metric,
                    period,
                    value: Some(row.period_specific_value.unwrap_or(row.override_value)),
                    source: MetricSource::Override,
                    real_value,
                },
                None => match real_value {
                    Some(value) => ResolvedMetric {
                        metric_name: metric,
                        period,
                        value: Some(value),
                        source: MetricSource::Real,
                        real_value: Some(value),
                    },
                    None => ResolvedMetric {
                        metric_name: metric,
                        period,
                        value: None,
                        source: MetricSource::Unavailable,
                        real_value: None,
                    },
                },
            };
            resolved.insert(metric, entry);
        }

        Ok(resolved)
    }

    /// Best-effort snapshot of the current real value, used when an
    /// override is created without an explicit original. Unavailable real
    /// data snapshots as zero rather than blocking the admin action.
    pub async fn real_value_or_zero(
        &self,
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    ) -> Decimal {
        self.source
            .compute(seller_id, metric, period)
            .await
            .unwrap_or_else(|e| {
                warn!(
                    seller_id = %seller_id,
                    metric = %metric,
                    error = %e,
                    "Capturing original value as zero; real source unavailable"
                );
                Decimal::ZERO
            })
    }
}

/// Two-level override lookup: exact period first, then (static metrics
/// only) the `total` row.
fn effective_override<'a>(
    overrides: &'a OverrideMap,
    metric: MetricName,
    period: Period,
) -> Option<&'a crate::entities::metric_override::Model> {
    let by_period = overrides.get(&metric)?;
    if let Some(row) = by_period.get(&period) {
        return Some(row);
    }
    if metric.is_static() && period != Period::Total {
        return by_period.get(&Period::Total);
    }
    None
}

/// Production [`RealMetricSource`]: period metrics aggregate the
/// allocation-sale ledger, static metrics read the seller profile row.
/// `visitors` belongs to the traffic-analytics collaborator, which is not
/// wired into this crate, so it reports unavailable.
#[derive(Clone)]
pub struct DbMetricSource {
    db: Arc<DatabaseConnection>,
}

impl DbMetricSource {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn sum_sales_column(
        &self,
        seller_id: Uuid,
        period: Period,
        column: allocation_sale::Column,
    ) -> Result<Decimal, ServiceError> {
        let db = &*self.db;
        let mut query = AllocationSaleEntity::find()
            .select_only()
            .column_as(
                SimpleExpr::from(Func::sum(
                    Expr::col((AllocationSaleEntity, column)).cast_as(Alias::new("float8")),
                )),
                "total",
            )
            .filter(allocation_sale::Column::SellerId.eq(seller_id));
        if let Some(start) = period.window_start(chrono::Utc::now()) {
            query = query.filter(allocation_sale::Column::CreatedAt.gte(start));
        }
        let total: Option<f64> = query
            .into_tuple::<Option<f64>>()
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .flatten();
        Ok(total
            .and_then(|value| Decimal::try_from(value).ok())
            .unwrap_or(Decimal::ZERO))
    }

    async fn sum_quantity(&self, seller_id: Uuid, period: Period) -> Result<Decimal, ServiceError> {
        let db = &*self.db;
        let mut query = AllocationSaleEntity::find()
            .select_only()
            .column_as(
                Expr::col((AllocationSaleEntity, allocation_sale::Column::Quantity)).sum(),
                "total",
            )
            .filter(allocation_sale::Column::SellerId.eq(seller_id));
        if let Some(start) = period.window_start(chrono::Utc::now()) {
            query = query.filter(allocation_sale::Column::CreatedAt.gte(start));
        }
        let total: Option<i64> = query
            .into_tuple::<Option<i64>>()
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .flatten();
        Ok(Decimal::from(total.unwrap_or(0)))
    }

    async fn seller_column(
        &self,
        seller_id: Uuid,
        metric: MetricName,
    ) -> Result<Decimal, ServiceError> {
        let db = &*self.db;
        let seller = SellerEntity::find_by_id(seller_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::DataUnavailable(format!("seller profile {} not found", seller_id))
            })?;

        Ok(match metric {
            MetricName::ShopFollowers => Decimal::from(seller.followers),
            MetricName::ShopRating => seller.shop_rating,
            MetricName::CreditScore => Decimal::from(seller.credit_score),
            MetricName::TotalCustomers => Decimal::from(seller.total_customers),
            _ => {
                return Err(ServiceError::InternalError(format!(
                    "{} is not a seller-profile metric",
                    metric
                )))
            }
        })
    }
}

#[async_trait]
impl RealMetricSource for DbMetricSource {
    async fn compute(
        &self,
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    ) -> Result<Decimal, ServiceError> {
        match metric {
            MetricName::OrdersSold => self.sum_quantity(seller_id, period).await,
            MetricName::TotalSales => {
                self.sum_sales_column(seller_id, period, allocation_sale::Column::Revenue)
                    .await
            }
            MetricName::ProfitForecast => {
                self.sum_sales_column(seller_id, period, allocation_sale::Column::Profit)
                    .await
            }
            MetricName::Visitors => Err(ServiceError::DataUnavailable(
                "traffic analytics source is not connected".to_string(),
            )),
            MetricName::ShopFollowers
            | MetricName::ShopRating
            | MetricName::CreditScore
            | MetricName::TotalCustomers => self.seller_column(seller_id, metric).await,
        }
    }
}
