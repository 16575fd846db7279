mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use sellerdesk_api::entities::distribution::{self, DistributionStatus, Entity as DistributionEntity};
use sellerdesk_api::errors::ServiceError;
use sellerdesk_api::services::allocation::NewDistribution;

use common::{seed_product, seed_seller, spawn_app};

fn new_distribution(
    seller_id: uuid::Uuid,
    product_id: uuid::Uuid,
    allocated_stock: i32,
) -> NewDistribution {
    NewDistribution {
        seller_id,
        product_id,
        allocated_stock,
        markup: dec!(2),
        seller_price: None,
        commission_rate: dec!(0.05),
    }
}

/// 20 concurrent one-unit sales against a pool of 10: exactly 10 succeed,
/// the rest fail with InsufficientAvailableStock, and the counters land
/// exactly on the pool boundary.
#[tokio::test]
async fn concurrent_sales_never_oversell_the_pool() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product = seed_product(db, 100, dec!(10)).await;
    let dist = app
        .state
        .ledger
        .create_distribution(new_distribution(seller, product, 10))
        .await
        .expect("create distribution");

    let mut tasks = vec![];
    for _ in 0..20 {
        let ledger = app.state.ledger.clone();
        let id = dist.id;
        tasks.push(tokio::spawn(async move {
            ledger.record_sale(id, 1).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            successes += 1;
        }
    }
    assert_eq!(
        successes, 10,
        "exactly the available quantity should sell; got {}",
        successes
    );

    let updated = app.state.ledger.get_distribution(dist.id).await.unwrap();
    assert_eq!(updated.sold_quantity, 10);
    assert_eq!(updated.available_stock, 0);
    assert_eq!(updated.allocated_stock, 10);
    assert_eq!(
        DistributionStatus::from_str(&updated.status),
        Some(DistributionStatus::OutOfStock)
    );
}

/// A rejected sale reports the availability at the instant of the attempt.
#[tokio::test]
async fn oversized_sale_is_rejected_with_availability() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product = seed_product(db, 50, dec!(10)).await;
    let dist = app
        .state
        .ledger
        .create_distribution(new_distribution(seller, product, 5))
        .await
        .unwrap();

    let err = app.state.ledger.record_sale(dist.id, 6).await.unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientAvailableStock {
            requested: 6,
            available: 5
        }
    );

    // Nothing moved.
    let unchanged = app.state.ledger.get_distribution(dist.id).await.unwrap();
    assert_eq!(unchanged.sold_quantity, 0);
    assert_eq!(unchanged.available_stock, 5);
}

/// Creating the same (seller, product) pair twice leaves exactly one row;
/// the second attempt reports DuplicateDistribution.
#[tokio::test]
async fn create_distribution_is_idempotent_per_pair() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product = seed_product(db, 30, dec!(8)).await;

    app.state
        .ledger
        .create_distribution(new_distribution(seller, product, 10))
        .await
        .expect("first create");

    let err = app
        .state
        .ledger
        .create_distribution(new_distribution(seller, product, 10))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DuplicateDistribution(id) if id == product);

    let rows = DistributionEntity::find()
        .filter(distribution::Column::SellerId.eq(seller))
        .filter(distribution::Column::ProductId.eq(product))
        .count(db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

/// Warehouse stock is checked per seller at allocation time, not as a
/// running total across sellers.
#[tokio::test]
async fn warehouse_check_is_independent_per_seller() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller_a = seed_seller(db).await;
    let seller_b = seed_seller(db).await;
    let product = seed_product(db, 20, dec!(10)).await;

    app.state
        .ledger
        .create_distribution(new_distribution(seller_a, product, 15))
        .await
        .expect("seller A allocates 15 of 20");
    app.state
        .ledger
        .create_distribution(new_distribution(seller_b, product, 10))
        .await
        .expect("seller B allocates 10 of 20 despite A's claim");

    // A single allocation above the warehouse pool is still refused.
    let seller_c = seed_seller(db).await;
    let err = app
        .state
        .ledger
        .create_distribution(new_distribution(seller_c, product, 21))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientWarehouseStock {
            requested: 21,
            available: 20
        }
    );
}

/// Raising the allocation re-checks warehouse stock; replenishing a
/// sold-out distribution reactivates it.
#[tokio::test]
async fn replenish_reactivates_sold_out_distribution() {
    let app = spawn_app().await;
    let db = &*app.state.db;

    let seller = seed_seller(db).await;
    let product = seed_product(db, 10, dec!(10)).await;
    let dist = app
        .state
        .ledger
        .create_distribution(new_distribution(seller, product, 3))
        .await
        .unwrap();

    app.state.ledger.record_sale(dist.id, 3).await.unwrap();
    let sold_out = app.state.ledger.get_distribution(dist.id).await.unwrap();
    assert_eq!(
        DistributionStatus::from_str(&sold_out.status),
        Some(DistributionStatus::OutOfStock)
    );

    let replenished = app
        .state
        .ledger
        .update_distribution(
            dist.id,
            sellerdesk_api::services::allocation::DistributionUpdate {
                allocated_stock: Some(8),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(replenished.allocated_stock, 8);
    assert_eq!(replenished.available_stock, 5);
    assert_eq!(
        DistributionStatus::from_str(&replenished.status),
        Some(DistributionStatus::Active)
    );

    // Beyond the warehouse pool is still refused on increase.
    let err = app
        .state
        .ledger
        .update_distribution(
            dist.id,
            sellerdesk_api::services::allocation::DistributionUpdate {
                allocated_stock: Some(11),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientWarehouseStock { .. });

    // Below what has already sold is refused too.
    let err = app
        .state
        .ledger
        .update_distribution(
            dist.id,
            sellerdesk_api::services::allocation::DistributionUpdate {
                allocated_stock: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

/// Sale financials: revenue uses the final price, profit is the markup take
/// net of commission, and the totals accumulate on the distribution row.
#[tokio::test]
async fn sale_financials_accumulate() {
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
            allocated_stock: 20,
            markup: dec!(2.5),
            seller_price: None,
            commission_rate: dec!(0.1),
        })
        .await
        .unwrap();
    assert_eq!(dist.final_price, dec!(12.5));

    let after = app.state.ledger.record_sale(dist.id, 4).await.unwrap();
    // revenue = 12.5 * 4 = 50; profit = 2.5 * 4 - 50 * 0.1 = 5
    assert_eq!(after.total_revenue, dec!(50));
    assert_eq!(after.total_profit, dec!(5));
    assert_eq!(after.total_sales, 1);
    assert_eq!(after.sold_quantity, 4);
}
