mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use uuid::Uuid;

use sellerdesk_api::entities::distribution::Entity as DistributionEntity;
use sellerdesk_api::entities::metric_override::{MetricName, Period};
use sellerdesk_api::services::allocation::NewDistribution;

use common::{seed_product, seed_seller, spawn_app};

/// bulk_delete([a, missing, c]) removes a and c, reports the missing id,
/// and never aborts the batch.
#[tokio::test]
async fn bulk_delete_tolerates_partial_failure() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product_a = seed_product(db, 50, dec!(5)).await;
    let product_c = seed_product(db, 50, dec!(5)).await;

    let dist_a = app
        .state
        .ledger
        .create_distribution(NewDistribution {
            seller_id: seller,
            product_id: product_a,
            allocated_stock: 5,
            markup: Decimal::ZERO,
            seller_price: None,
            commission_rate: Decimal::ZERO,
        })
        .await
        .unwrap();
    let dist_c = app
        .state
        .ledger
        .create_distribution(NewDistribution {
            seller_id: seller,
            product_id: product_c,
            allocated_stock: 5,
            markup: Decimal::ZERO,
            seller_price: None,
            commission_rate: Decimal::ZERO,
        })
        .await
        .unwrap();

    let missing = Uuid::new_v4();
    let summary = app
        .state
        .bulk
        .bulk_delete_distributions(vec![dist_a.id, missing, dist_c.id])
        .await;

    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].item, missing.to_string());

    assert_eq!(DistributionEntity::find().count(db).await.unwrap(), 0);
}

/// Bulk create: an already-distributed product is a per-item failure, the
/// rest of the batch proceeds.
#[tokio::test]
async fn bulk_create_reports_duplicates_per_item() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product_a = seed_product(db, 50, dec!(5)).await;
    let product_b = seed_product(db, 50, dec!(5)).await;
    let product_c = seed_product(db, 50, dec!(5)).await;

    // Pre-distribute B so the bulk run trips over it.
    app.state
        .ledger
        .create_distribution(NewDistribution {
            seller_id: seller,
            product_id: product_b,
            allocated_stock: 5,
            markup: Decimal::ZERO,
            seller_price: None,
            commission_rate: Decimal::ZERO,
        })
        .await
        .unwrap();

    let summary = app
        .state
        .bulk
        .bulk_create_distributions(
            seller,
            vec![product_a, product_b, product_c],
            10,
            dec!(1.5),
            Decimal::ZERO,
        )
        .await;

    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].item, product_b.to_string());
    assert!(summary.errors[0].reason.contains("already distributed"));

    assert_eq!(DistributionEntity::find().count(db).await.unwrap(), 3);
}

/// Deleting a distribution with recorded sales is refused, single and bulk.
#[tokio::test]
async fn delete_with_sales_is_blocked() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product = seed_product(db, 50, dec!(10)).await;
    let dist = app
        .state
        .ledger
        .create_distribution(NewDistribution {
            seller_id: seller,
            product_id: product,
            allocated_stock: 10,
            markup: dec!(1),
            seller_price: None,
            commission_rate: Decimal::ZERO,
        })
        .await
        .unwrap();
    app.state.ledger.record_sale(dist.id, 2).await.unwrap();

    let err = app.state.ledger.delete_distribution(dist.id).await.unwrap_err();
    assert!(matches!(
        err,
        sellerdesk_api::errors::ServiceError::Conflict(_)
    ));

    let summary = app.state.bulk.bulk_delete_distributions(vec![dist.id]).await;
    assert_eq!(summary.successful, 0);
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].reason.contains("recorded sales"));

    // The row is untouched.
    let still_there = app.state.ledger.get_distribution(dist.id).await.unwrap();
    assert_eq!(still_there.sold_quantity, 2);
}

/// Clear-all reports the number of removed overrides, scoped or global.
#[tokio::test]
async fn clear_overrides_scoped_and_global() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller_a = seed_seller(db).await;
    let seller_b = seed_seller(db).await;

    for (seller, period) in [
        (seller_a, Period::Today),
        (seller_a, Period::Total),
        (seller_b, Period::Total),
    ] {
        app.state
            .metric_store
            .set_override(
                seller,
                MetricName::TotalSales,
                period,
                dec!(100),
                None,
                Decimal::ZERO,
            )
            .await
            .unwrap();
    }

    let summary = app.state.bulk.clear_overrides(Some(seller_a)).await;
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 0);

    let summary = app.state.bulk.clear_overrides(None).await;
    assert_eq!(summary.successful, 1, "only seller B's override remained");

    let summary = app.state.bulk.clear_overrides(None).await;
    assert_eq!(summary.successful, 0, "global clear is idempotent");
}

/// Flipping the shutdown signal cancels remaining batch items; already
/// processed items are not rolled back.
#[tokio::test]
async fn shutdown_cancels_remaining_batch_items() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product_a = seed_product(db, 50, dec!(5)).await;
    let product_b = seed_product(db, 50, dec!(5)).await;

    app.shutdown.send(true).expect("signal shutdown");

    let summary = app
        .state
        .bulk
        .bulk_create_distributions(
            seller,
            vec![product_a, product_b],
            5,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .await;

    assert_eq!(summary.successful, 0);
    assert_eq!(summary.failed, 2);
    assert!(summary
        .errors
        .iter()
        .all(|e| e.reason.contains("cancelled by shutdown")));

    assert_eq!(DistributionEntity::find().count(db).await.unwrap(), 0);
}
