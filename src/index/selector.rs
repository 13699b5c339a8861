//! Index selection strategies

use super::permutation::{EncodedPattern, IndexOrder};
use crate::rdf::Position;
use std::fmt;

/// Chooses which permutation answers a lookup
pub trait IndexSelector: fmt::Debug + Send + Sync {
    /// Pick one of `available` (never empty) for `pattern`
    fn select(&self, pattern: &EncodedPattern, available: &[IndexOrder]) -> IndexOrder;
}

/// Prefer the index whose key prefix covers the most bound positions,
/// favoring subject, then predicate, then object on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostSelectiveFirst;

fn preference(order: IndexOrder) -> u32 {
    let weight = |p: Position| match p {
        Position::Subject => 2,
        Position::Predicate => 1,
        Position::Object => 0,
    };
    let [a, b, c] = order.positions();
    weight(a) * 9 + weight(b) * 3 + weight(c)
}

impl IndexSelector for MostSelectiveFirst {
    fn select(&self, pattern: &EncodedPattern, available: &[IndexOrder]) -> IndexOrder {
        available
            .iter()
            .copied()
            .max_by_key(|order| (order.bound_prefix_len(pattern), preference(*order)))
            .unwrap_or(IndexOrder::Spo)
    }
}

/// Always answers from one fixed order when it is available
#[derive(Debug, Clone, Copy)]
pub struct FixedOrder(pub IndexOrder);

impl IndexSelector for FixedOrder {
    fn select(&self, pattern: &EncodedPattern, available: &[IndexOrder]) -> IndexOrder {
        if available.contains(&self.0) {
            self.0
        } else {
            MostSelectiveFirst.select(pattern, available)
        }
    }
}
