//! Multi-row operation coordinator.
//!
//! Bulk distribution creation/deletion and bulk override clearing share one
//! execution shape: every item is attempted independently, failures are
//! collected instead of aborting the batch, and already-completed items are
//! never rolled back because of a later failure. The coordinator also
//! checks the process shutdown signal between items; each item's write is
//! itself atomic, so stopping between items is always safe.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::allocation::{AllocationLedger, NewDistribution};
use crate::services::metric_store::MetricStore;

/// Uniform result shape for every bulk entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchSummary {
    pub successful: u64,
    pub failed: u64,
    pub errors: Vec<BatchError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchError {
    /// The item that failed (product id, distribution id, ...).
    pub item: String,
    pub reason: String,
}

impl BatchSummary {
    fn record_ok(&mut self) {
        self.successful += 1;
    }

    fn record_err(&mut self, item: impl ToString, err: &ServiceError) {
        self.failed += 1;
        self.errors.push(BatchError {
            item: item.to_string(),
            reason: err.to_string(),
        });
    }

    fn record_cancelled(&mut self, item: impl ToString) {
        self.failed += 1;
        self.errors.push(BatchError {
            item: item.to_string(),
            reason: "cancelled by shutdown".to_string(),
        });
    }
}

#[derive(Clone)]
pub struct BulkOperationCoordinator {
    ledger: Arc<AllocationLedger>,
    store: Arc<MetricStore>,
    shutdown: watch::Receiver<bool>,
}

impl BulkOperationCoordinator {
    pub fn new(
        ledger: Arc<AllocationLedger>,
        store: Arc<MetricStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            store,
            shutdown,
        }
    }

    fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Distributes each product to the seller with the same allocation and
    /// markup. An already-distributed product is a per-item failure.
    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    pub async fn bulk_create_distributions(
        &self,
        seller_id: Uuid,
        product_ids: Vec<Uuid>,
        allocated_stock: i32,
        markup: Decimal,
        commission_rate: Decimal,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for product_id in product_ids {
            if self.shutting_down() {
                summary.record_cancelled(product_id);
                continue;
            }
            match self
                .ledger
                .create_distribution(NewDistribution {
                    seller_id,
                    product_id,
                    allocated_stock,
                    markup,
                    seller_price: None,
                    commission_rate,
                })
                .await
            {
                Ok(_) => summary.record_ok(),
                Err(e) => summary.record_err(product_id, &e),
            }
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            "Bulk distribution create finished"
        );
        summary
    }

    /// Deletes each distribution independently; a missing id or one with
    /// recorded sales is reported, not fatal to the batch.
    #[instrument(skip(self, distribution_ids), fields(count = distribution_ids.len()))]
    pub async fn bulk_delete_distributions(&self, distribution_ids: Vec<Uuid>) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for distribution_id in distribution_ids {
            if self.shutting_down() {
                summary.record_cancelled(distribution_id);
                continue;
            }
            match self.ledger.delete_distribution(distribution_id).await {
                Ok(()) => summary.record_ok(),
                Err(e) => summary.record_err(distribution_id, &e),
            }
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            "Bulk distribution delete finished"
        );
        summary
    }

    /// Clears overrides for one seller, or for every seller when no id is
    /// given ("clear all fake stats"). Counts removed rows per seller.
    #[instrument(skip(self))]
    pub async fn clear_overrides(&self, seller_id: Option<Uuid>) -> BatchSummary {
        let mut summary = BatchSummary::default();

        match seller_id {
            Some(seller_id) => match self.store.clear_all_for_seller(seller_id).await {
                Ok(count) => summary.successful = count,
                Err(e) => summary.record_err(seller_id, &e),
            },
            None => match self.store.clear_all().await {
                Ok((count, _sellers)) => summary.successful = count,
                Err(e) => summary.record_err("all", &e),
            },
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            "Override clear finished"
        );
        summary
    }
}
