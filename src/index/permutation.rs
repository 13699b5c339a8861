//! B-Tree permutation index
//!
//! Each index stores every triple once, with its three ids rearranged into
//! the index order, so that any bound key prefix is a contiguous range.

use crate::rdf::{EncodedTriple, Position, TermId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the six orderings of (subject, predicate, object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrder {
    Spo,
    Sop,
    Pso,
    Pos,
    Osp,
    Ops,
}

impl IndexOrder {
    pub const ALL: [IndexOrder; 6] = [
        IndexOrder::Spo,
        IndexOrder::Sop,
        IndexOrder::Pso,
        IndexOrder::Pos,
        IndexOrder::Osp,
        IndexOrder::Ops,
    ];

    /// Positions in key order
    pub fn positions(self) -> [Position; 3] {
        use Position::*;
        match self {
            IndexOrder::Spo => [Subject, Predicate, Object],
            IndexOrder::Sop => [Subject, Object, Predicate],
            IndexOrder::Pso => [Predicate, Subject, Object],
            IndexOrder::Pos => [Predicate, Object, Subject],
            IndexOrder::Osp => [Object, Subject, Predicate],
            IndexOrder::Ops => [Object, Predicate, Subject],
        }
    }

    /// Rearrange a triple into this order's key
    pub fn key(self, triple: &EncodedTriple) -> [TermId; 3] {
        self.positions().map(|p| triple.get(p))
    }

    /// Inverse of [`IndexOrder::key`]
    pub fn triple(self, key: [TermId; 3]) -> EncodedTriple {
        let mut triple = EncodedTriple::new(TermId::MIN, TermId::MIN, TermId::MIN);
        for (position, id) in self.positions().into_iter().zip(key) {
            match position {
                Position::Subject => triple.subject = id,
                Position::Predicate => triple.predicate = id,
                Position::Object => triple.object = id,
            }
        }
        triple
    }

    /// Number of leading key positions bound in `pattern`
    pub fn bound_prefix_len(self, pattern: &EncodedPattern) -> usize {
        self.positions()
            .iter()
            .take_while(|p| pattern.get(**p).is_some())
            .count()
    }
}

impl fmt::Display for IndexOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexOrder::Spo => "SPO",
            IndexOrder::Sop => "SOP",
            IndexOrder::Pso => "PSO",
            IndexOrder::Pos => "POS",
            IndexOrder::Osp => "OSP",
            IndexOrder::Ops => "OPS",
        };
        f.write_str(name)
    }
}

/// Lookup pattern over interned ids (None = wildcard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EncodedPattern {
    pub subject: Option<TermId>,
    pub predicate: Option<TermId>,
    pub object: Option<TermId>,
}

impl EncodedPattern {
    pub fn new(subject: Option<TermId>, predicate: Option<TermId>, object: Option<TermId>) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn get(&self, position: Position) -> Option<TermId> {
        match position {
            Position::Subject => self.subject,
            Position::Predicate => self.predicate,
            Position::Object => self.object,
        }
    }

    pub fn bound_count(&self) -> usize {
        Position::ALL.iter().filter(|p| self.get(**p).is_some()).count()
    }

    pub fn matches(&self, triple: &EncodedTriple) -> bool {
        Position::ALL
            .iter()
            .all(|p| self.get(*p).map_or(true, |id| id == triple.get(*p)))
    }
}

/// Index over a single permutation
#[derive(Debug, Clone)]
pub struct PermutationIndex {
    order: IndexOrder,
    keys: BTreeSet<[TermId; 3]>,
}

impl PermutationIndex {
    pub fn new(order: IndexOrder) -> Self {
        Self {
            order,
            keys: BTreeSet::new(),
        }
    }

    pub fn order(&self) -> IndexOrder {
        self.order
    }

    pub fn insert(&mut self, triple: &EncodedTriple) {
        self.keys.insert(self.order.key(triple));
    }

    pub fn remove(&mut self, triple: &EncodedTriple) {
        self.keys.remove(&self.order.key(triple));
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Triples whose key starts with `prefix` (at most three ids)
    pub fn scan<'a>(&'a self, prefix: &[TermId]) -> impl Iterator<Item = EncodedTriple> + 'a {
        let mut low = [TermId::MIN; 3];
        let mut high = [TermId::MAX; 3];
        for (i, id) in prefix.iter().take(3).enumerate() {
            low[i] = *id;
            high[i] = *id;
        }
        let order = self.order;
        self.keys.range(low..=high).map(move |key| order.triple(*key))
    }

    /// Size of the prefix range, counting no further than `cap`
    pub fn count_prefix(&self, prefix: &[TermId], cap: usize) -> usize {
        self.scan(prefix).take(cap).count()
    }
}
