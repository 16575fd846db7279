//! Shared test harness: in-memory SQLite with the real migrator, the full
//! service stack, and seed helpers for the slim seller/product read models.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use tokio::sync::watch;
use uuid::Uuid;

use sellerdesk_api as api;
use sellerdesk_api::entities::{product, seller};

pub struct TestApp {
    pub state: api::AppState,
    /// Flipping this cancels bulk batches and the tick cooperatively.
    pub shutdown: watch::Sender<bool>,
}

pub async fn spawn_app() -> TestApp {
    let cfg = api::config::AppConfig::new(
        "sqlite::memory:".to_string(),
        "test_secret_key_for_testing_purposes_only_32chars".to_string(),
        "127.0.0.1".to_string(),
        18080,
        "test".to_string(),
    );

    let pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .expect("db connect");
    api::db::run_migrations(&pool).await.expect("migrations");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state, event_rx) = api::build_state(Arc::new(pool), cfg, shutdown_rx);

    // Drain domain events the way the binary does; with no subscribed
    // rooms the refreshes are no-ops.
    tokio::spawn(api::events::process_events(
        event_rx,
        state.publisher.clone(),
    ));

    TestApp {
        state,
        shutdown: shutdown_tx,
    }
}

pub async fn seed_seller(db: &DatabaseConnection) -> Uuid {
    let id = Uuid::new_v4();
    seller::ActiveModel {
        id: Set(id),
        shop_name: Set(format!("shop-{}", &id.to_string()[..8])),
        shop_rating: Set(Decimal::new(45, 1)), // 4.5
        followers: Set(250),
        credit_score: Set(90),
        total_customers: Set(40),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed seller");
    id
}

pub async fn seed_product(db: &DatabaseConnection, stock: i32, price: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(id),
        name: Set(format!("product-{}", &id.to_string()[..8])),
        price: Set(price),
        stock: Set(stock),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed product");
    id
}
