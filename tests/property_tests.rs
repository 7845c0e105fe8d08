use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use stockroom_api::entities::stock_location;
use stockroom_api::services::allocation::plan_allocation;

fn candidates(quantities: Vec<i64>) -> Vec<stock_location::Model> {
    let mut sorted = quantities;
    // The store hands allocation its candidates largest-first
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, quantity)| stock_location::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            warehouse_id: Uuid::nil(),
            rack_location: format!("R-{:03}", i),
            quantity,
            version: 1,
            updated_at: Utc::now(),
        })
        .collect()
}

proptest! {
    /// A successful plan takes exactly the requested amount, never more
    /// than a rack holds, and never dips into a rack it does not need.
    #[test]
    fn plan_covers_request_exactly(
        quantities in proptest::collection::vec(1i64..=200, 1..12),
        requested in 1i64..=500,
    ) {
        let candidates = candidates(quantities.clone());
        let available: i64 = quantities.iter().sum();

        match plan_allocation(&candidates, requested) {
            Ok(slices) => {
                prop_assert!(available >= requested);
                let taken: i64 = slices.iter().map(|s| s.take).sum();
                prop_assert_eq!(taken, requested);
                for slice in &slices {
                    prop_assert!(slice.take > 0);
                    prop_assert!(slice.take <= slice.location.quantity);
                }
                // Greedy over a descending list: every slice except the
                // last drains its rack completely
                for slice in slices.iter().take(slices.len().saturating_sub(1)) {
                    prop_assert_eq!(slice.take, slice.location.quantity);
                }
            }
            Err(shortfall) => {
                prop_assert!(available < requested);
                prop_assert_eq!(shortfall.available, available);
                prop_assert_eq!(shortfall.requested, requested);
                prop_assert_eq!(shortfall.missing(), requested - available);
            }
        }
    }

    /// The plan never touches more racks than any other cover could:
    /// greedy largest-first is minimal in rack count.
    #[test]
    fn plan_touches_minimal_number_of_racks(
        quantities in proptest::collection::vec(1i64..=200, 1..12),
        requested in 1i64..=500,
    ) {
        let candidates = candidates(quantities.clone());
        if let Ok(slices) = plan_allocation(&candidates, requested) {
            // Count how many of the largest racks are needed to cover the
            // request; no cover can use fewer racks than that
            let mut sorted = quantities;
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            let mut covered = 0;
            let mut minimal = 0;
            for quantity in sorted {
                if covered >= requested {
                    break;
                }
                covered += quantity;
                minimal += 1;
            }
            prop_assert_eq!(slices.len(), minimal);
        }
    }
}
