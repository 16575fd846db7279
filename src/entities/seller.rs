use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Slim seller account read model. Account CRUD lives in the accounts
/// subsystem; this crate reads the static-metric columns and owns the
/// override cascade.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sellers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub shop_name: String,
    #[sea_orm(column_type = "Decimal(Some((4, 2)))")]
    pub shop_rating: Decimal,
    pub followers: i64,
    pub credit_score: i32,
    pub total_customers: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::metric_override::Entity")]
    MetricOverrides,
    #[sea_orm(has_many = "super::distribution::Entity")]
    Distributions,
}

impl Related<super::metric_override::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MetricOverrides.def()
    }
}

impl Related<super::distribution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Distributions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
