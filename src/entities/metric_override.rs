use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Admin-set override value for one (seller, metric, period) tuple.
///
/// The tuple is unique (enforced by `idx_metric_overrides_tuple`); a second
/// writer for the same tuple updates the first writer's row. `original_value`
/// is captured when the row is first created and never changes afterwards,
/// so reverting and auditing always have the pre-override value.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "metric_overrides")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    pub metric_name: String,
    pub period: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub override_value: Decimal,
    /// Value actually displayed for the period when it differs from
    /// `override_value` (legacy dual-value rows).
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub period_specific_value: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub original_value: Decimal,
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
}

impl Related<super::seller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The closed set of seller metrics an admin can override.
///
/// Stored as strings; every code path goes through this enum so an
/// unrecognized name is rejected before any write and the resolver can
/// match exhaustively.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    OrdersSold,
    TotalSales,
    ProfitForecast,
    Visitors,
    ShopFollowers,
    ShopRating,
    CreditScore,
    TotalCustomers,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::OrdersSold => "orders_sold",
            MetricName::TotalSales => "total_sales",
            MetricName::ProfitForecast => "profit_forecast",
            MetricName::Visitors => "visitors",
            MetricName::ShopFollowers => "shop_followers",
            MetricName::ShopRating => "shop_rating",
            MetricName::CreditScore => "credit_score",
            MetricName::TotalCustomers => "total_customers",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "orders_sold" => Some(MetricName::OrdersSold),
            "total_sales" => Some(MetricName::TotalSales),
            "profit_forecast" => Some(MetricName::ProfitForecast),
            "visitors" => Some(MetricName::Visitors),
            "shop_followers" => Some(MetricName::ShopFollowers),
            "shop_rating" => Some(MetricName::ShopRating),
            "credit_score" => Some(MetricName::CreditScore),
            "total_customers" => Some(MetricName::TotalCustomers),
            _ => None,
        }
    }

    /// Period-insensitive metrics: an override on `total` applies across
    /// all periods unless a period-specific override also exists.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            MetricName::ShopFollowers
                | MetricName::ShopRating
                | MetricName::CreditScore
                | MetricName::TotalCustomers
        )
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting time bucket. A missing period on write defaults to `Total`.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Today,
    #[serde(rename = "last7days")]
    Last7Days,
    #[serde(rename = "last30days")]
    Last30Days,
    #[default]
    Total,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Last7Days => "last7days",
            Period::Last30Days => "last30days",
            Period::Total => "total",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "today" => Some(Period::Today),
            "last7days" => Some(Period::Last7Days),
            "last30days" => Some(Period::Last30Days),
            "total" => Some(Period::Total),
            _ => None,
        }
    }

    /// Inclusive lower bound of the bucket, `None` for `Total`.
    /// `Today` means the current UTC calendar day.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc()),
            Period::Last7Days => Some(now - chrono::Duration::days(7)),
            Period::Last30Days => Some(now - chrono::Duration::days(30)),
            Period::Total => None,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
