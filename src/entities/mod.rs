//! SeaORM entity models.
//!
//! `metric_overrides` and `distributions` are exclusively owned by the
//! metric store and the allocation ledger respectively; `sellers` and
//! `products` are slim read models maintained by the account and catalog
//! subsystems, `allocation_sales` is the append-only sale ledger.

pub mod allocation_sale;
pub mod distribution;
pub mod metric_override;
pub mod product;
pub mod seller;
