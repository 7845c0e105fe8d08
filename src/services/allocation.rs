//! Rack allocation for outbound movements.
//!
//! Candidates arrive ordered by descending quantity and are consumed
//! greedily: take as much as possible from the fullest rack first. That
//! keeps the number of racks a picker has to visit per order at a minimum.

use crate::entities::stock_location;

/// One planned deduction: take `take` units from `location`.
#[derive(Debug, Clone)]
pub struct AllocationSlice {
    pub location: stock_location::Model,
    pub take: i64,
}

/// How far short the candidates fell of the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: i64,
    pub available: i64,
}

impl Shortfall {
    pub fn missing(&self) -> i64 {
        self.requested - self.available
    }
}

/// Plans which racks to deduct from to satisfy `requested` units.
///
/// Pure planning; nothing is mutated here. Returns `Err(Shortfall)` when
/// the candidates cannot cover the request, in which case the caller must
/// abandon the whole document, not just this line.
pub fn plan_allocation(
    candidates: &[stock_location::Model],
    requested: i64,
) -> Result<Vec<AllocationSlice>, Shortfall> {
    let available: i64 = candidates.iter().map(|c| c.quantity).sum();
    if available < requested {
        return Err(Shortfall {
            requested,
            available,
        });
    }

    let mut slices = Vec::new();
    let mut remaining = requested;
    for candidate in candidates {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(candidate.quantity);
        if take == 0 {
            continue;
        }
        slices.push(AllocationSlice {
            location: candidate.clone(),
            take,
        });
        remaining -= take;
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn location(rack: &str, quantity: i64) -> stock_location::Model {
        stock_location::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            warehouse_id: Uuid::nil(),
            rack_location: rack.to_string(),
            quantity,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn drains_largest_rack_first() {
        let candidates = vec![location("A", 30), location("B", 10), location("C", 5)];
        let slices = plan_allocation(&candidates, 35).unwrap();

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].location.rack_location, "A");
        assert_eq!(slices[0].take, 30);
        assert_eq!(slices[1].location.rack_location, "B");
        assert_eq!(slices[1].take, 5);
    }

    #[test]
    fn exact_single_rack_fit_touches_one_rack() {
        let candidates = vec![location("A", 30), location("B", 10)];
        let slices = plan_allocation(&candidates, 30).unwrap();

        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].take, 30);
    }

    #[test]
    fn shortfall_reports_requested_and_available() {
        let candidates = vec![location("A", 30), location("B", 10), location("C", 5)];
        let err = plan_allocation(&candidates, 50).unwrap_err();

        assert_eq!(err.requested, 50);
        assert_eq!(err.available, 45);
        assert_eq!(err.missing(), 5);
    }

    #[test]
    fn empty_candidates_short_by_everything() {
        let err = plan_allocation(&[], 7).unwrap_err();
        assert_eq!(err.available, 0);
        assert_eq!(err.missing(), 7);
    }

    #[test]
    fn zero_request_takes_nothing() {
        let candidates = vec![location("A", 30)];
        let slices = plan_allocation(&candidates, 0).unwrap();
        assert!(slices.is_empty());
    }
}
