//! Ordinal arithmetic for sibling collections.
//!
//! Both store implementations call into this module so that "next order" and
//! reorder planning behave identically regardless of backend.

use std::collections::HashSet;

/// No ordinal is left after the current maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("order {0} is the largest possible; reorder before appending")]
pub struct OrderExhausted(pub i32);

/// The ordinal to give a newly appended sibling: one past the current
/// maximum, or 1 for an empty parent.
pub fn next_order<I>(orders: I) -> Result<i32, OrderExhausted>
where
    I: IntoIterator<Item = i32>,
{
    let max = orders.into_iter().max().unwrap_or(0);
    max.checked_add(1).ok_or(OrderExhausted(max))
}

/// Why a reorder request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    #[error("id {0} is listed more than once")]
    Repeated(i64),

    #[error("id {0} does not belong to this parent")]
    Foreign(i64),
}

/// Compute new ordinals for a reorder request.
///
/// `siblings` are `(id, current_order)` pairs for every child of the parent.
/// `requested` is the caller's order. Listed ids get `1..=n` in list order;
/// siblings left out of the list keep their previous relative order and are
/// placed after the listed ones. The result covers every sibling, ordered by
/// new ordinal.
pub fn plan_reorder(
    siblings: &[(i64, i32)],
    requested: &[i64],
) -> Result<Vec<(i64, i32)>, ReorderError> {
    let known: HashSet<i64> = siblings.iter().map(|(id, _)| *id).collect();
    let mut seen = HashSet::with_capacity(requested.len());
    for id in requested {
        if !known.contains(id) {
            return Err(ReorderError::Foreign(*id));
        }
        if !seen.insert(*id) {
            return Err(ReorderError::Repeated(*id));
        }
    }

    let mut rest: Vec<(i64, i32)> = siblings
        .iter()
        .filter(|(id, _)| !seen.contains(id))
        .copied()
        .collect();
    rest.sort_by_key(|(id, order)| (*order, *id));

    let plan = requested
        .iter()
        .copied()
        .chain(rest.into_iter().map(|(id, _)| id))
        .zip(1..)
        .collect();
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_order_starts_at_one() {
        assert_eq!(next_order(std::iter::empty()), Ok(1));
        assert_eq!(next_order([1, 2, 3]), Ok(4));
        assert_eq!(next_order([5, 2]), Ok(6));
    }

    #[test]
    fn next_order_refuses_to_wrap() {
        assert_eq!(next_order([3, i32::MAX]), Err(OrderExhausted(i32::MAX)));
        assert_eq!(next_order([i32::MAX - 1]), Ok(i32::MAX));
    }

    #[test]
    fn full_reorder() {
        let siblings = [(10, 1), (11, 2), (12, 3)];
        let plan = plan_reorder(&siblings, &[12, 10, 11]).unwrap();
        assert_eq!(plan, vec![(12, 1), (10, 2), (11, 3)]);
    }

    #[test]
    fn partial_reorder_keeps_rest_in_previous_order() {
        let siblings = [(10, 1), (11, 2), (12, 3), (13, 4)];
        let plan = plan_reorder(&siblings, &[13]).unwrap();
        assert_eq!(plan, vec![(13, 1), (10, 2), (11, 3), (12, 4)]);
    }

    #[test]
    fn gaps_are_closed() {
        let siblings = [(1, 2), (2, 7), (3, 40)];
        let plan = plan_reorder(&siblings, &[]).unwrap();
        assert_eq!(plan, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn foreign_id_rejected() {
        let siblings = [(1, 1), (2, 2)];
        assert_eq!(
            plan_reorder(&siblings, &[2, 99]),
            Err(ReorderError::Foreign(99))
        );
    }

    #[test]
    fn repeated_id_rejected() {
        let siblings = [(1, 1), (2, 2)];
        assert_eq!(
            plan_reorder(&siblings, &[1, 1]),
            Err(ReorderError::Repeated(1))
        );
    }
}
