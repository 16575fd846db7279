mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use sellerdesk_api::entities::metric_override::{
    self, Entity as MetricOverrideEntity, MetricName, Period,
};
use sellerdesk_api::services::allocation::NewDistribution;
use sellerdesk_api::services::metric_resolver::MetricSource;

use common::{seed_product, seed_seller, spawn_app};

/// The full override lifecycle: the real value shows, an override masks it
/// (with the real value still reported alongside), and clearing reverts to
/// real.
#[tokio::test]
async fn override_masks_and_revert_restores_real_value() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product = seed_product(db, 100, dec!(10)).await;
    let dist = app
        .state
        .ledger
        .create_distribution(NewDistribution {
            seller_id: seller,
            product_id: product,
            allocated_stock: 50,
            markup: dec!(2),
            seller_price: None,
            commission_rate: Decimal::ZERO,
        })
        .await
        .unwrap();
    app.state.ledger.record_sale(dist.id, 5).await.unwrap();

    // Real value: 5 units sold today.
    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    let orders = &resolved[&MetricName::OrdersSold];
    assert_eq!(orders.value, Some(dec!(5)));
    assert_eq!(orders.source, MetricSource::Real);
    assert_eq!(orders.real_value, Some(dec!(5)));

    // Admin masks it with 110.
    app.state
        .metric_store
        .set_override(
            seller,
            MetricName::OrdersSold,
            Period::Today,
            dec!(110),
            None,
            dec!(5),
        )
        .await
        .unwrap();

    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    let orders = &resolved[&MetricName::OrdersSold];
    assert_eq!(orders.value, Some(dec!(110)));
    assert_eq!(orders.source, MetricSource::Override);
    assert_eq!(orders.real_value, Some(dec!(5)), "real value still reported");

    // Clearing reverts to the real computation.
    let deleted = app
        .state
        .metric_store
        .clear_override(seller, MetricName::OrdersSold, Period::Today)
        .await
        .unwrap();
    assert!(deleted);

    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    let orders = &resolved[&MetricName::OrdersSold];
    assert_eq!(orders.value, Some(dec!(5)));
    assert_eq!(orders.source, MetricSource::Real);
}

/// Static metrics use the two-level fallback: a `total` override answers
/// every period until a period-specific override shadows it.
#[tokio::test]
async fn static_metric_fallback_order() {
    let app = spawn_app().await;
    let db = &*app.state.db;
    let seller = seed_seller(db).await;

    app.state
        .metric_store
        .set_override(
            seller,
            MetricName::ShopRating,
            Period::Total,
            dec!(4.9),
            None,
            dec!(4.5),
        )
        .await
        .unwrap();

    // total-only override answers "today" for a static metric.
    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    let rating = &resolved[&MetricName::ShopRating];
    assert_eq!(rating.value, Some(dec!(4.9)));
    assert_eq!(rating.source, MetricSource::Override);

    // A today-specific override wins over the total one.
    app.state
        .metric_store
        .set_override(
            seller,
            MetricName::ShopRating,
            Period::Today,
            dec!(3.2),
            None,
            dec!(4.5),
        )
        .await
        .unwrap();
    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    assert_eq!(resolved[&MetricName::ShopRating].value, Some(dec!(3.2)));

    // Dynamic metrics get no such fallback: a total-only override leaves
    // "today" on the real computation.
    app.state
        .metric_store
        .set_override(
            seller,
            MetricName::OrdersSold,
            Period::Total,
            dec!(900),
            None,
            Decimal::ZERO,
        )
        .await
        .unwrap();
    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    let orders = &resolved[&MetricName::OrdersSold];
    assert_eq!(orders.source, MetricSource::Real);
    assert_eq!(orders.value, Some(Decimal::ZERO));
}

/// Concurrent upserts on the same tuple collapse into one row, and the
/// original value captured at creation survives later edits.
#[tokio::test]
async fn concurrent_set_override_keeps_single_row() {
    let app = spawn_app().await;
    let db = &*app.state.db;
    let seller = seed_seller(db).await;

    let mut tasks = vec![];
    for i in 0..8 {
        let store = app.state.metric_store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .set_override(
                    seller,
                    MetricName::TotalSales,
                    Period::Last7Days,
                    Decimal::from(1000 + i),
                    None,
                    dec!(7),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().expect("upsert never surfaces a duplicate-key error");
    }

    let rows = MetricOverrideEntity::find()
        .filter(metric_override::Column::SellerId.eq(seller))
        .filter(metric_override::Column::MetricName.eq(MetricName::TotalSales.as_str()))
        .filter(metric_override::Column::Period.eq(Period::Last7Days.as_str()))
        .count(db)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    // A later edit with a different "original" cannot rewrite history.
    let edited = app
        .state
        .metric_store
        .set_override(
            seller,
            MetricName::TotalSales,
            Period::Last7Days,
            dec!(2000),
            None,
            dec!(9999),
        )
        .await
        .unwrap();
    assert_eq!(edited.override_value, dec!(2000));
    assert_eq!(edited.original_value, dec!(7), "original survives edits");
}

/// An unavailable real source degrades one metric, never the whole map.
#[tokio::test]
async fn unavailable_metric_degrades_alone() {
    let app = spawn_app().await;
    let db = &*app.state.db;
    let seller = seed_seller(db).await;

    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();

    // Visitors has no wired traffic source.
    let visitors = &resolved[&MetricName::Visitors];
    assert_eq!(visitors.source, MetricSource::Unavailable);
    assert_eq!(visitors.value, None);

    // Everything else still resolves.
    assert_eq!(resolved[&MetricName::OrdersSold].source, MetricSource::Real);
    assert_eq!(
        resolved[&MetricName::ShopFollowers].value,
        Some(dec!(250))
    );
    assert_eq!(resolved.len(), 8, "every recognized metric is present");

    // An override masks the unavailable metric like any other.
    app.state
        .metric_store
        .set_override(
            seller,
            MetricName::Visitors,
            Period::Today,
            dec!(5000),
            None,
            Decimal::ZERO,
        )
        .await
        .unwrap();
    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Today)
        .await
        .unwrap();
    let visitors = &resolved[&MetricName::Visitors];
    assert_eq!(visitors.value, Some(dec!(5000)));
    assert_eq!(visitors.source, MetricSource::Override);
    assert_eq!(visitors.real_value, None);
}

/// Clears are idempotent; the legacy period-specific value shadows the
/// override value when present.
#[tokio::test]
async fn clear_is_idempotent_and_period_value_shadows() {
    let app = spawn_app().await;
    let db = &*app.state.db;
    let seller = seed_seller(db).await;

    let deleted = app
        .state
        .metric_store
        .clear_override(seller, MetricName::CreditScore, Period::Total)
        .await
        .unwrap();
    assert!(!deleted, "clearing a missing override is not an error");

    app.state
        .metric_store
        .set_override(
            seller,
            MetricName::CreditScore,
            Period::Total,
            dec!(95),
            Some(dec!(88)),
            dec!(90),
        )
        .await
        .unwrap();
    let resolved = app
        .state
        .resolver
        .resolve(seller, Period::Total)
        .await
        .unwrap();
    assert_eq!(
        resolved[&MetricName::CreditScore].value,
        Some(dec!(88)),
        "period-specific value wins over override value"
    );

    // Seller-scoped clear removes everything and is idempotent.
    let removed = app
        .state
        .metric_store
        .clear_all_for_seller(seller)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let removed = app
        .state
        .metric_store
        .clear_all_for_seller(seller)
        .await
        .unwrap();
    assert_eq!(removed, 0);

    assert_matches!(
        app.state
            .metric_store
            .find_override(seller, MetricName::CreditScore, Period::Total)
            .await
            .unwrap(),
        None
    );
}
