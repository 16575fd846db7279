//! Distribution allocation ledger.
//!
//! Owns the `distributions` table and the append-only `allocation_sales`
//! ledger. Stock conservation (`0 <= sold_quantity <= allocated_stock`) is
//! enforced by guarded single-statement updates: the availability check
//! rides in the WHERE clause and the rows-affected count decides the
//! outcome, so concurrent sales can never overshoot the pool.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::allocation_sale;
use crate::entities::distribution::{self, DistributionStatus, Entity as DistributionEntity};
use crate::entities::product::Entity as ProductEntity;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Parameters for a single distribution creation.
#[derive(Debug, Clone)]
pub struct NewDistribution {
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub allocated_stock: i32,
    pub markup: Decimal,
    pub seller_price: Option<Decimal>,
    pub commission_rate: Decimal,
}

/// Seller-editable fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct DistributionUpdate {
    pub markup: Option<Decimal>,
    pub seller_price: Option<Option<Decimal>>,
    pub allocated_stock: Option<i32>,
    pub status: Option<DistributionStatus>,
    pub is_promoted: Option<bool>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Clone)]
pub struct AllocationLedger {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl AllocationLedger {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Distributes a shared catalog product into a seller's storefront.
    ///
    /// The allocation is checked against the product's current warehouse
    /// stock, independently per seller. A (seller, product) pair that is
    /// already distributed surfaces as `DuplicateDistribution` via the
    /// unique index, not as a second row.
    #[instrument(skip(self), fields(seller_id = %new.seller_id, product_id = %new.product_id))]
    pub async fn create_distribution(
        &self,
        new: NewDistribution,
    ) -> Result<distribution::Model, ServiceError> {
        if new.allocated_stock <= 0 {
            return Err(ServiceError::ValidationError(
                "allocated_stock must be positive".to_string(),
            ));
        }
        if new.markup < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "markup cannot be negative".to_string(),
            ));
        }
        if new.commission_rate < Decimal::ZERO || new.commission_rate >= Decimal::ONE {
            return Err(ServiceError::ValidationError(
                "commission_rate must be within [0, 1)".to_string(),
            ));
        }

        let db = &*self.db;
        let product = ProductEntity::find_by_id(new.product_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", new.product_id))
            })?;

        if new.allocated_stock > product.stock {
            return Err(ServiceError::InsufficientWarehouseStock {
                requested: new.allocated_stock,
                available: product.stock,
            });
        }

        let now = Utc::now();
        let base_price = new.seller_price.unwrap_or(product.price);
        let active = distribution::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(new.seller_id),
            product_id: Set(new.product_id),
            seller_price: Set(new.seller_price),
            markup: Set(new.markup),
            final_price: Set(base_price + new.markup),
            allocated_stock: Set(new.allocated_stock),
            sold_quantity: Set(0),
            available_stock: Set(new.allocated_stock),
            total_sales: Set(0),
            total_revenue: Set(Decimal::ZERO),
            total_profit: Set(Decimal::ZERO),
            status: Set(DistributionStatus::Active.as_str().to_string()),
            is_promoted: Set(false),
            commission_rate: Set(new.commission_rate),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = match active.insert(db).await {
            Ok(model) => model,
            Err(e) if ServiceError::is_unique_violation(&e) => {
                return Err(ServiceError::DuplicateDistribution(new.product_id));
            }
            Err(e) => return Err(ServiceError::DatabaseError(e)),
        };

        info!(
            distribution_id = %model.id,
            allocated = model.allocated_stock,
            "Distribution created"
        );

        self.event_sender
            .send(Event::DistributionCreated {
                seller_id: model.seller_id,
                distribution_id: model.id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(model)
    }

    /// Records a sale against a distribution.
    ///
    /// The availability check and the counter increments are one guarded
    /// UPDATE; a request racing past the available pool simply matches zero
    /// rows and fails with `InsufficientAvailableStock`. The sale ledger
    /// row is written in the same transaction so period aggregates and the
    /// distribution counters cannot drift apart.
    #[instrument(skip(self))]
    pub async fn record_sale(
        &self,
        distribution_id: Uuid,
        quantity: i32,
    ) -> Result<distribution::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "sale quantity must be positive".to_string(),
            ));
        }

        let db = &*self.db;
        let current = DistributionEntity::find_by_id(distribution_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Distribution {} not found", distribution_id))
            })?;

        // Pricing fields are stable under concurrent sales; only the stock
        // counters race, and those are guarded below.
        let qty = Decimal::from(quantity);
        let revenue = current.final_price * qty;
        let profit = current.markup * qty - revenue * current.commission_rate;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let res = DistributionEntity::update_many()
            .col_expr(
                distribution::Column::SoldQuantity,
                Expr::col(distribution::Column::SoldQuantity).add(quantity),
            )
            .col_expr(
                distribution::Column::AvailableStock,
                Expr::col(distribution::Column::AvailableStock).sub(quantity),
            )
            .col_expr(
                distribution::Column::TotalSales,
                Expr::col(distribution::Column::TotalSales).add(1),
            )
            .col_expr(
                distribution::Column::TotalRevenue,
                Expr::col(distribution::Column::TotalRevenue).add(Expr::val(revenue)),
            )
            .col_expr(
                distribution::Column::TotalProfit,
                Expr::col(distribution::Column::TotalProfit).add(Expr::val(profit)),
            )
            .col_expr(distribution::Column::UpdatedAt, Expr::value(now))
            .filter(distribution::Column::Id.eq(distribution_id))
            .filter(distribution::Column::AvailableStock.gte(quantity))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if res.rows_affected == 0 {
            txn.rollback().await.map_err(ServiceError::DatabaseError)?;
            let available = DistributionEntity::find_by_id(distribution_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .map(|d| d.available_stock)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Distribution {} not found", distribution_id))
                })?;
            return Err(ServiceError::InsufficientAvailableStock {
                requested: quantity,
                available,
            });
        }

        // Sold out exactly now: flip status in the same transaction.
        DistributionEntity::update_many()
            .col_expr(
                distribution::Column::Status,
                Expr::value(DistributionStatus::OutOfStock.as_str()),
            )
            .filter(distribution::Column::Id.eq(distribution_id))
            .filter(distribution::Column::AvailableStock.lte(0))
            .filter(distribution::Column::Status.eq(DistributionStatus::Active.as_str()))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let sale = allocation_sale::ActiveModel {
            id: Set(Uuid::new_v4()),
            distribution_id: Set(distribution_id),
            seller_id: Set(current.seller_id),
            product_id: Set(current.product_id),
            quantity: Set(quantity),
            revenue: Set(revenue),
            profit: Set(profit),
            created_at: Set(now),
        };
        sale.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        let updated = self.get_distribution(distribution_id).await?;

        info!(
            distribution_id = %distribution_id,
            quantity,
            available = updated.available_stock,
            "Sale recorded"
        );

        self.event_sender
            .send(Event::SaleRecorded {
                seller_id: updated.seller_id,
                distribution_id,
                quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Applies seller edits. Raising the allocation re-checks warehouse
    /// stock; the allocation can never be lowered below what has already
    /// been sold. Availability is recomputed in SQL from the live
    /// `sold_quantity`, so an edit racing a sale cannot resurrect stock.
    #[instrument(skip(self, update))]
    pub async fn update_distribution(
        &self,
        distribution_id: Uuid,
        update: DistributionUpdate,
    ) -> Result<distribution::Model, ServiceError> {
        let db = &*self.db;
        let current = DistributionEntity::find_by_id(distribution_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Distribution {} not found", distribution_id))
            })?;

        if let Some(rate) = update.commission_rate {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(ServiceError::ValidationError(
                    "commission_rate must be within [0, 1)".to_string(),
                ));
            }
        }
        if let Some(markup) = update.markup {
            if markup < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "markup cannot be negative".to_string(),
                ));
            }
        }

        let markup = update.markup.unwrap_or(current.markup);
        let seller_price = update.seller_price.unwrap_or(current.seller_price);
        let needs_price = update.markup.is_some() || update.seller_price.is_some();
        let final_price = if needs_price {
            let product = ProductEntity::find_by_id(current.product_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", current.product_id))
                })?;
            seller_price.unwrap_or(product.price) + markup
        } else {
            current.final_price
        };

        let mut stmt = DistributionEntity::update_many()
            .col_expr(distribution::Column::Markup, Expr::val(markup).into())
            .col_expr(
                distribution::Column::FinalPrice,
                Expr::val(final_price).into(),
            )
            .col_expr(distribution::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(distribution::Column::Id.eq(distribution_id));

        if update.seller_price.is_some() {
            stmt = stmt.col_expr(
                distribution::Column::SellerPrice,
                Expr::value(seller_price),
            );
        }
        if let Some(promoted) = update.is_promoted {
            stmt = stmt.col_expr(distribution::Column::IsPromoted, Expr::value(promoted));
        }
        if let Some(rate) = update.commission_rate {
            stmt = stmt.col_expr(distribution::Column::CommissionRate, Expr::val(rate).into());
        }
        if let Some(status) = update.status {
            stmt = stmt.col_expr(
                distribution::Column::Status,
                Expr::value(status.as_str()),
            );
        }

        if let Some(new_allocation) = update.allocated_stock {
            if new_allocation < current.sold_quantity {
                return Err(ServiceError::ValidationError(format!(
                    "allocated_stock {} cannot drop below sold quantity {}",
                    new_allocation, current.sold_quantity
                )));
            }
            if new_allocation > current.allocated_stock {
                let product = ProductEntity::find_by_id(current.product_id)
                    .one(db)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", current.product_id))
                    })?;
                if new_allocation > product.stock {
                    return Err(ServiceError::InsufficientWarehouseStock {
                        requested: new_allocation,
                        available: product.stock,
                    });
                }
            }
            stmt = stmt
                .col_expr(
                    distribution::Column::AllocatedStock,
                    Expr::value(new_allocation),
                )
                // available = new allocation - live sold count, computed in
                // SQL so a concurrent sale is not overwritten.
                .col_expr(
                    distribution::Column::AvailableStock,
                    Expr::val(new_allocation).sub(Expr::col(distribution::Column::SoldQuantity)),
                )
                // Guard: never allow the allocation below what has been
                // sold by the time this statement lands.
                .filter(distribution::Column::SoldQuantity.lte(new_allocation));
        }

        let res = stmt.exec(db).await.map_err(ServiceError::DatabaseError)?;
        if res.rows_affected == 0 {
            // Row gone, or a concurrent sale pushed sold_quantity past the
            // requested allocation.
            return match DistributionEntity::find_by_id(distribution_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
            {
                Some(row) => Err(ServiceError::Conflict(format!(
                    "allocation change lost to concurrent sales; sold quantity is now {}",
                    row.sold_quantity
                ))),
                None => Err(ServiceError::NotFound(format!(
                    "Distribution {} not found",
                    distribution_id
                ))),
            };
        }

        self.apply_stock_status_transitions(distribution_id).await?;

        let updated = self.get_distribution(distribution_id).await?;

        self.event_sender
            .send(Event::DistributionUpdated {
                seller_id: updated.seller_id,
                distribution_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Automatic status flips driven by availability: sold-out rows leave
    /// `active`, replenished rows leave `out_of_stock`.
    async fn apply_stock_status_transitions(
        &self,
        distribution_id: Uuid,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;

        DistributionEntity::update_many()
            .col_expr(
                distribution::Column::Status,
                Expr::value(DistributionStatus::OutOfStock.as_str()),
            )
            .filter(distribution::Column::Id.eq(distribution_id))
            .filter(distribution::Column::AvailableStock.lte(0))
            .filter(distribution::Column::Status.eq(DistributionStatus::Active.as_str()))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        DistributionEntity::update_many()
            .col_expr(
                distribution::Column::Status,
                Expr::value(DistributionStatus::Active.as_str()),
            )
            .filter(distribution::Column::Id.eq(distribution_id))
            .filter(distribution::Column::AvailableStock.gt(0))
            .filter(distribution::Column::Status.eq(DistributionStatus::OutOfStock.as_str()))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(())
    }

    /// Removes a distribution. Refused while `sold_quantity > 0` so sale
    /// history is never silently dropped; the guard rides in the DELETE's
    /// WHERE clause to stay correct under concurrent sales.
    #[instrument(skip(self))]
    pub async fn delete_distribution(&self, distribution_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let current = DistributionEntity::find_by_id(distribution_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Distribution {} not found", distribution_id))
            })?;

        let res = DistributionEntity::delete_many()
            .filter(distribution::Column::Id.eq(distribution_id))
            .filter(distribution::Column::SoldQuantity.eq(0))
            .exec(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if res.rows_affected == 0 {
            let sold = DistributionEntity::find_by_id(distribution_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .map(|d| d.sold_quantity);
            return match sold {
                Some(sold) => Err(ServiceError::Conflict(format!(
                    "distribution has {} recorded sales; reconcile before deleting",
                    sold
                ))),
                None => Err(ServiceError::NotFound(format!(
                    "Distribution {} not found",
                    distribution_id
                ))),
            };
        }

        info!(distribution_id = %distribution_id, "Distribution deleted");

        self.event_sender
            .send(Event::DistributionDeleted {
                seller_id: current.seller_id,
                distribution_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(())
    }

    /// Looks up the distribution for a (seller, product) pair, if any.
    pub async fn find_distribution(
        &self,
        seller_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<distribution::Model>, ServiceError> {
        let db = &*self.db;
        DistributionEntity::find()
            .filter(distribution::Column::SellerId.eq(seller_id))
            .filter(distribution::Column::ProductId.eq(product_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn get_distribution(
        &self,
        distribution_id: Uuid,
    ) -> Result<distribution::Model, ServiceError> {
        let db = &*self.db;
        DistributionEntity::find_by_id(distribution_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Distribution {} not found", distribution_id))
            })
    }

    /// Lists a seller's distributions with pagination.
    #[instrument(skip(self))]
    pub async fn list_for_seller(
        &self,
        seller_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<distribution::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 500 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 500".to_string(),
            ));
        }

        let db = &*self.db;
        let paginator = DistributionEntity::find()
            .filter(distribution::Column::SellerId.eq(seller_id))
            .order_by_desc(distribution::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(|e| {
            warn!(error = %e, "Failed to count distributions");
            ServiceError::InternalError(format!("Failed to count distributions: {}", e))
        })?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((items, total))
    }

    /// All of a seller's distributions, newest first. Used for room
    /// snapshots.
    pub async fn snapshot_for_seller(
        &self,
        seller_id: Uuid,
    ) -> Result<Vec<distribution::Model>, ServiceError> {
        let db = &*self.db;
        DistributionEntity::find()
            .filter(distribution::Column::SellerId.eq(seller_id))
            .order_by_desc(distribution::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
