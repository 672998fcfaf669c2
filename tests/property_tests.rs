use proptest::prelude::*;

use optistock_api::ml::encoder::CategoryEncoder;
use optistock_api::services::reorder::{assess_stock, StockStatus};

proptest! {
    /// A positive recommendation always restores stock to demand plus
    /// buffer; a zero recommendation only ever accompanies OK.
    #[test]
    fn recommendation_restores_the_target(
        stock in 0i64..10_000,
        demand in 0i64..10_000,
        buffer in 0i64..1_000,
    ) {
        let assessment = assess_stock(stock, demand, buffer);
        if assessment.recommended_order > 0 {
            prop_assert_eq!(stock + assessment.recommended_order, demand + buffer);
            prop_assert_ne!(assessment.status, StockStatus::Ok);
        } else {
            prop_assert_eq!(assessment.status, StockStatus::Ok);
        }
    }

    /// Status ordering is monotone in stock: more stock never worsens the
    /// assessment for the same demand and buffer.
    #[test]
    fn more_stock_never_worsens_status(
        stock in 0i64..10_000,
        demand in 0i64..10_000,
        buffer in 0i64..1_000,
    ) {
        fn rank(status: StockStatus) -> u8 {
            match status {
                StockStatus::Critical => 0,
                StockStatus::Low => 1,
                StockStatus::Ok => 2,
            }
        }
        let here = assess_stock(stock, demand, buffer);
        let richer = assess_stock(stock + 1, demand, buffer);
        prop_assert!(rank(richer.status) >= rank(here.status));
        prop_assert!(richer.recommended_order <= here.recommended_order);
    }

    /// Critical always means stock cannot cover demand on its own.
    #[test]
    fn critical_means_stock_below_demand(
        stock in 0i64..10_000,
        demand in 0i64..10_000,
        buffer in 0i64..1_000,
    ) {
        let assessment = assess_stock(stock, demand, buffer);
        match assessment.status {
            StockStatus::Critical => prop_assert!(stock < demand),
            StockStatus::Low => {
                prop_assert!(stock >= demand);
                prop_assert!(stock < demand + buffer);
            }
            StockStatus::Ok => prop_assert!(stock >= demand + buffer),
        }
    }

    /// Encoding is stable and dense: fitted categories map to distinct codes
    /// covering 0..n, regardless of input order or duplication.
    #[test]
    fn encoder_codes_are_dense_and_order_independent(
        mut labels in proptest::collection::vec("[a-z]{1,8}", 1..20)
    ) {
        let forward = CategoryEncoder::fit(labels.clone());
        labels.reverse();
        let backward = CategoryEncoder::fit(labels.clone());

        let mut codes: Vec<i64> = labels
            .iter()
            .map(|label| forward.encode(label) as i64)
            .collect();
        codes.sort_unstable();
        codes.dedup();
        prop_assert_eq!(codes.len(), forward.len());
        prop_assert_eq!(codes.first().copied(), Some(0));
        prop_assert_eq!(codes.last().copied(), Some(forward.len() as i64 - 1));

        for label in &labels {
            prop_assert_eq!(forward.encode(label), backward.encode(label));
        }
    }
}
