//! Metric override store.
//!
//! Durable admin-set override values keyed by (seller, metric, period).
//! All writes go through the unique-tuple upsert so concurrent edits to the
//! same tuple serialize into one row; the losing writer's insert becomes an
//! update instead of a duplicate-key failure.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::metric_override::{
    self, Entity as MetricOverrideEntity, MetricName, Period,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Structured override lookup used by the resolver: metric, then period.
pub type OverrideMap = HashMap<MetricName, HashMap<Period, metric_override::Model>>;

#[derive(Clone)]
pub struct MetricStore {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl MetricStore {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Upserts the override for one (seller, metric, period) tuple.
    ///
    /// First creation records `original_value`; later edits update only
    /// `override_value`, `period_specific_value` and `updated_at`, so the
    /// captured original survives any number of edits. The insert-or-update
    /// is a single statement keyed on the unique index, which is what
    /// linearizes concurrent writers on the tuple.
    #[instrument(skip(self))]
    pub async fn set_override(
        &self,
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
        override_value: Decimal,
        period_specific_value: Option<Decimal>,
        original_value: Decimal,
    ) -> Result<metric_override::Model, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let active = metric_override::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            metric_name: Set(metric.as_str().to_string()),
            period: Set(period.as_str().to_string()),
            override_value: Set(override_value),
            period_specific_value: Set(period_specific_value),
            original_value: Set(original_value),
            created_at: Set(now),
            updated_at: Set(now),
        };

        MetricOverrideEntity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    metric_override::Column::SellerId,
                    metric_override::Column::MetricName,
                    metric_override::Column::Period,
                ])
                .update_columns([
                    metric_override::Column::OverrideValue,
                    metric_override::Column::PeriodSpecificValue,
                    metric_override::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let stored = self
            .find_override(seller_id, metric, period)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "override for seller {} vanished after upsert",
                    seller_id
                ))
            })?;

        info!(
            seller_id = %seller_id,
            metric = %metric,
            period = %period,
            value = %override_value,
            "Override set"
        );

        self.event_sender
            .send(Event::OverrideSet {
                seller_id,
                metric,
                period,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(stored)
    }

    /// Looks up a single override row by its unique tuple.
    pub async fn find_override(
        &self,
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    ) -> Result<Option<metric_override::Model>, ServiceError> {
        let db = &*self.db;
        MetricOverrideEntity::find()
            .filter(metric_override::Column::SellerId.eq(seller_id))
            .filter(metric_override::Column::MetricName.eq(metric.as_str()))
            .filter(metric_override::Column::Period.eq(period.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// All override rows for a seller, newest first.
    #[instrument(skip(self))]
    pub async fn get_overrides(
        &self,
        seller_id: Uuid,
    ) -> Result<Vec<metric_override::Model>, ServiceError> {
        let db = &*self.db;
        MetricOverrideEntity::find()
            .filter(metric_override::Column::SellerId.eq(seller_id))
            .order_by_desc(metric_override::Column::UpdatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Per-metric/per-period map consumed by the resolver. Rows with a
    /// metric or period this build no longer recognizes are skipped rather
    /// than failing the whole read.
    pub async fn overrides_map(&self, seller_id: Uuid) -> Result<OverrideMap, ServiceError> {
        let rows = self.get_overrides(seller_id).await?;
        let mut map: OverrideMap = HashMap::new();
        for row in rows {
            let (Some(metric), Some(period)) = (
                MetricName::from_str(&row.metric_name),
                Period::from_str(&row.period),
            ) else {
                continue;
            };
            map.entry(metric).or_default().insert(period, row);
        }
        Ok(map)
    }

    /// Removes one override. Idempotent: clearing a tuple that has no
    /// override reports `false` instead of an error.
    #[instrument(skip(self))]
    pub async fn clear_override(
        &self,
        seller_id: Uuid,
        metric: MetricName,
        period: Period,
    ) -> Result<bool, ServiceError> {
        let db = &*self.db;
        let res = MetricOverrideEntity::delete_many()
            .filter(metric_override::Column::SellerId.eq(seller_id))
            .filter(metric_override::Column::MetricName.eq(metric.as_str()))
            .filter(metric_override::Column::Period.eq(period.as_str()))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if res.rows_affected > 0 {
            info!(seller_id = %seller_id, metric = %metric, period = %period, "Override cleared");
            self.event_sender
                .send(Event::OverrideCleared {
                    seller_id,
                    metric,
                    period,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(res.rows_affected > 0)
    }

    /// Removes every override a seller has. Idempotent.
    #[instrument(skip(self))]
    pub async fn clear_all_for_seller(&self, seller_id: Uuid) -> Result<u64, ServiceError> {
        let db = &*self.db;
        let res = MetricOverrideEntity::delete_many()
            .filter(metric_override::Column::SellerId.eq(seller_id))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if res.rows_affected > 0 {
            info!(seller_id = %seller_id, count = res.rows_affected, "Seller overrides cleared");
            self.event_sender
                .send(Event::OverridesCleared {
                    seller_ids: vec![seller_id],
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(res.rows_affected)
    }

    /// Global "clear all fake stats": removes every override in the store
    /// and reports which sellers were affected so their rooms get
    /// refreshed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<(u64, Vec<Uuid>), ServiceError> {
        let db = &*self.db;

        let mut seller_ids: Vec<Uuid> = MetricOverrideEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|row| row.seller_id)
            .collect();
        seller_ids.sort();
        seller_ids.dedup();

        let res = MetricOverrideEntity::delete_many()
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if res.rows_affected > 0 {
            info!(
                count = res.rows_affected,
                sellers = seller_ids.len(),
                "All overrides cleared"
            );
            self.event_sender
                .send(Event::OverridesCleared {
                    seller_ids: seller_ids.clone(),
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok((res.rows_affected, seller_ids))
    }
}
