//! Manager for permutation indices
//!
//! Keeps every configured permutation in step with the triple store and
//! answers wildcard lookups through the index picked by the active
//! [`IndexSelector`].

use super::permutation::{EncodedPattern, IndexOrder, PermutationIndex};
use super::selector::{IndexSelector, MostSelectiveFirst};
use crate::rdf::EncodedTriple;
use tracing::debug;

/// Upper bound on the work done by a single cardinality estimate
pub const ESTIMATE_CAP: usize = 4096;

/// Manager for all permutation indices
#[derive(Debug)]
pub struct IndexManager {
    indices: Vec<PermutationIndex>,
    orders: Vec<IndexOrder>,
    selector: Box<dyn IndexSelector>,
}

impl IndexManager {
    /// Create a manager maintaining all six permutations
    pub fn new() -> Self {
        Self::with_orders(&IndexOrder::ALL)
    }

    /// Create a manager for the given permutations; SPO and POS are always kept
    pub fn with_orders(orders: &[IndexOrder]) -> Self {
        let mut wanted = vec![IndexOrder::Spo, IndexOrder::Pos];
        for order in orders {
            if !wanted.contains(order) {
                wanted.push(*order);
            }
        }
        wanted.sort();
        Self {
            indices: wanted.iter().map(|o| PermutationIndex::new(*o)).collect(),
            orders: wanted,
            selector: Box::new(MostSelectiveFirst),
        }
    }

    /// Replace the index selection strategy
    pub fn set_selector(&mut self, selector: Box<dyn IndexSelector>) {
        self.selector = selector;
    }

    /// Maintained permutations
    pub fn orders(&self) -> &[IndexOrder] {
        &self.orders
    }

    pub fn on_insert(&mut self, triple: &EncodedTriple) {
        for index in &mut self.indices {
            index.insert(triple);
        }
    }

    pub fn on_remove(&mut self, triple: &EncodedTriple) {
        for index in &mut self.indices {
            index.remove(triple);
        }
    }

    /// Drop and repopulate every permutation from the canonical triples
    pub fn rebuild_all<'a>(&mut self, triples: impl IntoIterator<Item = &'a EncodedTriple>) {
        for index in &mut self.indices {
            index.clear();
        }
        for triple in triples {
            self.on_insert(triple);
        }
        debug!(
            "Rebuilt {} indices over {} triples",
            self.indices.len(),
            self.len()
        );
    }

    /// Number of triples indexed
    pub fn len(&self) -> usize {
        self.indices.first().map_or(0, |i| i.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn choose(&self, pattern: &EncodedPattern) -> (&PermutationIndex, Vec<crate::rdf::TermId>) {
        let order = self.selector.select(pattern, &self.orders);
        let index = self
            .indices
            .iter()
            .find(|i| i.order() == order)
            .unwrap_or(&self.indices[0]);
        let prefix = index
            .order()
            .positions()
            .iter()
            .map_while(|p| pattern.get(*p))
            .collect();
        (index, prefix)
    }

    /// All indexed triples matching `pattern`, in the chosen index's key order
    pub fn lookup(&self, pattern: &EncodedPattern) -> Vec<EncodedTriple> {
        let (index, prefix) = self.choose(pattern);
        let covered = prefix.len() == pattern.bound_count();
        index
            .scan(&prefix)
            .filter(|t| covered || pattern.matches(t))
            .collect()
    }

    /// Cardinality hint for `pattern`, capped at [`ESTIMATE_CAP`]
    pub fn estimate(&self, pattern: &EncodedPattern) -> usize {
        let (index, prefix) = self.choose(pattern);
        if prefix.len() == pattern.bound_count() {
            index.count_prefix(&prefix, ESTIMATE_CAP)
        } else {
            index
                .scan(&prefix)
                .take(ESTIMATE_CAP)
                .filter(|t| pattern.matches(t))
                .count()
        }
    }
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FixedOrder;
    use crate::rdf::TermId;

    fn triple(s: u32, p: u32, o: u32) -> EncodedTriple {
        EncodedTriple::new(TermId(s), TermId(p), TermId(o))
    }

    fn sample() -> Vec<EncodedTriple> {
        vec![
            triple(1, 10, 2),
            triple(2, 10, 3),
            triple(1, 11, 3),
            triple(3, 10, 3),
        ]
    }

    #[test]
    fn test_spo_and_pos_always_present() {
        let manager = IndexManager::with_orders(&[IndexOrder::Osp]);
        assert_eq!(
            manager.orders(),
            &[IndexOrder::Spo, IndexOrder::Pos, IndexOrder::Osp]
        );
    }

    #[test]
    fn test_lookup_matches_scan_for_every_selector() {
        let triples = sample();
        let ids = [None, Some(TermId(1)), Some(TermId(3)), Some(TermId(10))];

        for fixed in IndexOrder::ALL {
            let mut manager = IndexManager::new();
            manager.set_selector(Box::new(FixedOrder(fixed)));
            manager.rebuild_all(&triples);

            for s in ids {
                for p in ids {
                    for o in ids {
                        let pattern = EncodedPattern::new(s, p, o);
                        let mut found = manager.lookup(&pattern);
                        found.sort();
                        let mut expected: Vec<_> =
                            triples.iter().copied().filter(|t| pattern.matches(t)).collect();
                        expected.sort();
                        assert_eq!(found, expected, "{} {:?}", fixed, pattern);
                    }
                }
            }
        }
    }

    #[test]
    fn test_remove_and_estimate() {
        let mut manager = IndexManager::new();
        for t in sample() {
            manager.on_insert(&t);
        }
        let by_predicate = EncodedPattern::new(None, Some(TermId(10)), None);
        assert_eq!(manager.estimate(&by_predicate), 3);

        manager.on_remove(&triple(2, 10, 3));
        assert_eq!(manager.estimate(&by_predicate), 2);
        assert_eq!(manager.len(), 3);
        assert!(manager
            .lookup(&EncodedPattern::new(Some(TermId(2)), None, None))
            .is_empty());
    }
}
