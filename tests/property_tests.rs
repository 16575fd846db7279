mod common;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use sellerdesk_api::entities::distribution::DistributionStatus;
use sellerdesk_api::entities::metric_override::Period;
use sellerdesk_api::services::allocation::NewDistribution;

use common::{seed_product, seed_seller, spawn_app};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Stock conservation under arbitrary sale sequences: whatever mix of
    /// in-bounds and oversized sales arrives, sold quantity tracks exactly
    /// the accepted sales and never exceeds the allocation.
    #[test]
    fn sold_quantity_never_exceeds_allocation(
        allocated in 1..15i32,
        quantities in proptest::collection::vec(1..6i32, 0..12),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
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
                    allocated_stock: allocated,
                    markup: dec!(1),
                    seller_price: None,
                    commission_rate: Decimal::ZERO,
                })
                .await
                .unwrap();

            let mut accepted_total = 0i32;
            for quantity in quantities {
                match app.state.ledger.record_sale(dist.id, quantity).await {
                    Ok(updated) => {
                        accepted_total += quantity;
                        prop_assert!(updated.sold_quantity <= updated.allocated_stock);
                        prop_assert!(updated.available_stock >= 0);
                        prop_assert_eq!(
                            updated.available_stock,
                            updated.allocated_stock - updated.sold_quantity
                        );
                    }
                    Err(_) => {
                        // Rejected sale must not have moved anything.
                        let row = app.state.ledger.get_distribution(dist.id).await.unwrap();
                        prop_assert_eq!(row.sold_quantity, accepted_total);
                    }
                }
            }

            let final_row = app.state.ledger.get_distribution(dist.id).await.unwrap();
            prop_assert_eq!(final_row.sold_quantity, accepted_total);
            prop_assert!(final_row.sold_quantity <= allocated);
            if final_row.available_stock == 0 {
                prop_assert_eq!(
                    DistributionStatus::from_str(&final_row.status),
                    Some(DistributionStatus::OutOfStock)
                );
            }
            Ok(())
        })?;
    }

    /// Period windows are properly nested: today starts after the 7-day
    /// window, which starts after the 30-day window.
    #[test]
    fn period_windows_are_nested(secs in 0i64..1_000_000_000) {
        let now = chrono::DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap();
        let today = Period::Today.window_start(now).unwrap();
        let last7 = Period::Last7Days.window_start(now).unwrap();
        let last30 = Period::Last30Days.window_start(now).unwrap();

        prop_assert!(last30 < last7);
        prop_assert!(last7 <= now);
        prop_assert!(today <= now);
        prop_assert!(last7 < today || now - today < chrono::Duration::days(7));
        prop_assert!(Period::Total.window_start(now).is_none());
    }
}
