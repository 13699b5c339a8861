//! RDF triple store implementation
//!
//! This module provides an in-memory RDF store with permutation indexing.
//!
//! Terms are interned in a [`TermDictionary`]; the canonical set holds
//! encoded triples in a B-Tree so iteration order is deterministic for a
//! given history. Every add/remove is forwarded to the [`IndexManager`]
//! except during a bulk load, when the indices are left stale until
//! [`TripleStore::build_all_indexes`].

use super::dictionary::{EncodedTriple, TermDictionary, TermId};
use super::namespace::{PrefixLookup, PrefixResult, PrefixTable};
use super::types::{BlankNode, NamedNode, RdfTerm, Triple, TriplePattern};
use crate::index::{EncodedPattern, IndexManager, IndexOrder, IndexSelector};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// RDF triple store with permutation indices
#[derive(Debug, Default)]
pub struct TripleStore {
    /// Term ↔ id mapping
    dictionary: TermDictionary,

    /// All triples (primary storage)
    triples: BTreeSet<EncodedTriple>,

    /// Secondary indices
    indices: IndexManager,

    /// Prefix label → namespace IRI
    prefixes: PrefixTable,

    /// Indices are stale while true
    bulk_loading: bool,

    /// Counter for generated blank node labels
    blank_counter: u64,
}

impl TripleStore {
    /// Create a new empty store maintaining all six index permutations
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store maintaining the given permutations
    pub fn with_index_orders(orders: &[IndexOrder]) -> Self {
        Self {
            indices: IndexManager::with_orders(orders),
            ..Self::default()
        }
    }

    /// Insert a triple; false if it was already present
    pub fn add(&mut self, triple: &Triple) -> bool {
        let encoded = self.encode_triple(triple);
        self.add_encoded(encoded)
    }

    pub(crate) fn add_encoded(&mut self, encoded: EncodedTriple) -> bool {
        if !self.triples.insert(encoded) {
            return false;
        }
        if !self.bulk_loading {
            self.indices.on_insert(&encoded);
        }
        true
    }

    /// Remove a triple; false if it was not present
    pub fn remove(&mut self, triple: &Triple) -> bool {
        match self.lookup_triple(triple) {
            Some(encoded) => self.remove_encoded(&encoded),
            None => false,
        }
    }

    pub(crate) fn remove_encoded(&mut self, encoded: &EncodedTriple) -> bool {
        if !self.triples.remove(encoded) {
            return false;
        }
        if !self.bulk_loading {
            self.indices.on_remove(encoded);
        }
        true
    }

    /// Check if a triple is stored
    pub fn contains(&self, triple: &Triple) -> bool {
        self.lookup_triple(triple)
            .map_or(false, |encoded| self.triples.contains(&encoded))
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Iterate over all triples in a stable order
    pub fn iter(&self) -> impl Iterator<Item = Triple> + '_ {
        self.triples.iter().filter_map(|t| self.decode_triple(t))
    }

    pub(crate) fn encoded_triples(&self) -> impl Iterator<Item = &EncodedTriple> + '_ {
        self.triples.iter()
    }

    /// Register a namespace prefix (last write wins)
    pub fn register_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.register(prefix, iri);
    }

    /// Expand a prefix-qualified name with the registered prefixes
    pub fn resolve(&self, qname: &str) -> PrefixResult<NamedNode> {
        self.prefixes.resolve(qname)
    }

    pub fn prefixes(&self) -> &PrefixTable {
        &self.prefixes
    }

    /// Stop maintaining indices until [`TripleStore::build_all_indexes`]
    pub fn begin_bulk_load(&mut self) {
        debug!("Bulk load started with {} triples", self.triples.len());
        self.bulk_loading = true;
    }

    pub fn is_bulk_loading(&self) -> bool {
        self.bulk_loading
    }

    /// Rebuild every index from the canonical set and leave bulk mode
    pub fn build_all_indexes(&mut self) {
        self.indices.rebuild_all(self.triples.iter());
        self.bulk_loading = false;
        info!(
            "Built {} indices over {} triples",
            self.indices.orders().len(),
            self.triples.len()
        );
    }

    pub fn indices(&self) -> &IndexManager {
        &self.indices
    }

    /// Replace the index selection strategy
    pub fn set_index_selector(&mut self, selector: Box<dyn IndexSelector>) {
        self.indices.set_selector(selector);
    }

    /// Triples matching a pattern of concrete terms and wildcards
    pub fn lookup(&self, pattern: &TriplePattern) -> Vec<Triple> {
        let encode = |term: Option<RdfTerm>| -> Option<Option<TermId>> {
            match term {
                Some(term) => self.dictionary.lookup(&term).map(Some),
                None => Some(None),
            }
        };
        let encoded = (
            encode(pattern.subject.clone().map(RdfTerm::from)),
            encode(pattern.predicate.clone().map(RdfTerm::from)),
            encode(pattern.object.clone().map(RdfTerm::from)),
        );
        match encoded {
            (Some(s), Some(p), Some(o)) => self
                .lookup_encoded(&EncodedPattern::new(s, p, o))
                .iter()
                .filter_map(|t| self.decode_triple(t))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Encoded triples matching `pattern`; falls back to a scan of the
    /// canonical set while the indices are stale
    pub fn lookup_encoded(&self, pattern: &EncodedPattern) -> Vec<EncodedTriple> {
        if self.bulk_loading {
            return self.scan_encoded(pattern);
        }
        self.indices.lookup(pattern)
    }

    /// Full scan of the canonical set
    pub fn scan_encoded(&self, pattern: &EncodedPattern) -> Vec<EncodedTriple> {
        self.triples
            .iter()
            .filter(|t| pattern.matches(t))
            .copied()
            .collect()
    }

    /// Cardinality hint used by the planner
    pub fn estimate(&self, pattern: &EncodedPattern) -> usize {
        if self.bulk_loading {
            return self.triples.len();
        }
        self.indices.estimate(pattern)
    }

    pub fn term(&self, id: TermId) -> Option<&RdfTerm> {
        self.dictionary.decode(id)
    }

    pub fn term_id(&self, term: &RdfTerm) -> Option<TermId> {
        self.dictionary.lookup(term)
    }

    pub(crate) fn encode_term(&mut self, term: &RdfTerm) -> TermId {
        self.dictionary.encode(term)
    }

    pub(crate) fn encode_triple(&mut self, triple: &Triple) -> EncodedTriple {
        EncodedTriple::new(
            self.dictionary.encode(&triple.subject.clone().into()),
            self.dictionary.encode(&triple.predicate.clone().into()),
            self.dictionary.encode(&triple.object.clone().into()),
        )
    }

    fn lookup_triple(&self, triple: &Triple) -> Option<EncodedTriple> {
        Some(EncodedTriple::new(
            self.dictionary.lookup(&triple.subject.clone().into())?,
            self.dictionary.lookup(&triple.predicate.clone().into())?,
            self.dictionary.lookup(&triple.object.clone().into())?,
        ))
    }

    pub fn decode_triple(&self, encoded: &EncodedTriple) -> Option<Triple> {
        Triple::from_terms(
            self.term(encoded.subject)?.clone(),
            self.term(encoded.predicate)?.clone(),
            self.term(encoded.object)?.clone(),
        )
        .ok()
    }

    /// A blank node whose label has never been seen by this store
    pub fn fresh_blank_node(&mut self) -> BlankNode {
        loop {
            self.blank_counter += 1;
            let label = format!("genid{}", self.blank_counter);
            if let Ok(node) = BlankNode::new(&label) {
                if self.dictionary.lookup(&node.clone().into()).is_none() {
                    return node;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Literal, RdfPredicate};

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(&format!("http://example.org/{}", s)).unwrap()
    }

    fn knows(a: &str, b: &str) -> Triple {
        Triple::new(
            iri(a).into(),
            RdfPredicate::new("http://example.org/knows").unwrap(),
            iri(b).into(),
        )
    }

    #[test]
    fn test_insert_and_query() {
        let mut store = TripleStore::new();
        assert!(store.add(&knows("a", "b")));
        assert!(store.add(&knows("b", "c")));
        assert_eq!(store.len(), 2);

        let pattern = TriplePattern::new(Some(iri("a").into()), None, None);
        assert_eq!(store.lookup(&pattern), vec![knows("a", "b")]);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut store = TripleStore::new();
        assert!(store.add(&knows("a", "b")));
        assert!(!store.add(&knows("a", "b")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.indices().len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut store = TripleStore::new();
        store.add(&knows("a", "b"));
        assert!(store.remove(&knows("a", "b")));
        assert!(!store.remove(&knows("a", "b")));
        assert!(!store.contains(&knows("a", "b")));
        assert!(store.lookup(&TriplePattern::default()).is_empty());
    }

    #[test]
    fn test_lookup_unknown_term_is_empty() {
        let mut store = TripleStore::new();
        store.add(&knows("a", "b"));
        let pattern = TriplePattern::new(Some(iri("zzz").into()), None, None);
        assert!(store.lookup(&pattern).is_empty());
    }

    #[test]
    fn test_bulk_load() {
        let mut store = TripleStore::new();
        store.begin_bulk_load();
        store.add(&knows("a", "b"));
        assert!(!store.add(&knows("a", "b")));
        assert!(store.indices().is_empty());
        // stale indices are bypassed
        assert_eq!(store.lookup(&TriplePattern::default()).len(), 1);

        store.build_all_indexes();
        assert!(!store.is_bulk_loading());
        assert_eq!(store.indices().len(), 1);
    }

    #[test]
    fn test_iteration_order_is_stable() {
        let mut store = TripleStore::new();
        store.add(&knows("b", "c"));
        store.add(&knows("a", "b"));
        let first: Vec<_> = store.iter().collect();
        let second: Vec<_> = store.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first[0], knows("b", "c"));
    }

    #[test]
    fn test_fresh_blank_nodes_avoid_existing_labels() {
        let mut store = TripleStore::new();
        let taken = BlankNode::new("genid1").unwrap();
        store.add(&Triple::new(
            taken.clone().into(),
            RdfPredicate::new("http://example.org/p").unwrap(),
            Literal::new_simple_literal("x").into(),
        ));
        let fresh = store.fresh_blank_node();
        assert_ne!(fresh, taken);
        assert_ne!(store.fresh_blank_node(), fresh);
    }

    #[test]
    fn test_prefixes() {
        let mut store = TripleStore::new();
        store.register_prefix("ex", "http://example.org/");
        assert_eq!(store.resolve("ex:a").unwrap(), iri("a"));
        assert!(store.resolve("nope:a").is_err());
    }
}
