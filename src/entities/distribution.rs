use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A seller's allocation of a shared catalog product into their own
/// storefront.
///
/// (seller_id, product_id) is unique. Stock conservation:
/// `0 <= sold_quantity <= allocated_stock` and
/// `available_stock = allocated_stock - sold_quantity`, maintained by the
/// allocation ledger's conditional updates only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "distributions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    /// Seller's own base price; falls back to the catalog price when absent.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub seller_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub markup: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub final_price: Decimal,
    pub allocated_stock: i32,
    pub sold_quantity: i32,
    pub available_stock: i32,
    /// Number of recorded sale events (the units sold live in
    /// `sold_quantity`).
    pub total_sales: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_revenue: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_profit: Decimal,
    pub status: String,
    pub is_promoted: bool,
    #[sea_orm(column_type = "Decimal(Some((5, 4)))")]
    pub commission_rate: Decimal,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::seller::Entity",
        from = "Column::SellerId",
        to = "super::seller::Column::Id",
        on_delete = "Cascade"
    )]
    Seller,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::allocation_sale::Entity")]
    Sales,
}

impl Related<super::seller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::allocation_sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Distribution lifecycle status. `OutOfStock` is entered and left
/// automatically as `available_stock` hits and leaves zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Active,
    Inactive,
    Suspended,
    OutOfStock,
}

impl DistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionStatus::Active => "active",
            DistributionStatus::Inactive => "inactive",
            DistributionStatus::Suspended => "suspended",
            DistributionStatus::OutOfStock => "out_of_stock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DistributionStatus::Active),
            "inactive" => Some(DistributionStatus::Inactive),
            "suspended" => Some(DistributionStatus::Suspended),
            "out_of_stock" => Some(DistributionStatus::OutOfStock),
            _ => None,
        }
    }
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
