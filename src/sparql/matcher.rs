//! Single triple-pattern matching
//!
//! A [`PatternMatcher`] is a triple pattern compiled against the store's
//! dictionary. Given an input frame it substitutes the already-bound
//! variables, asks the index layer for candidates and yields one extended
//! frame per candidate that agrees with every binding, including variables
//! repeated inside the pattern.

use super::algebra::{PatternTerm, PatternTriple};
use super::bindings::{Bindings, VarId};
use crate::index::EncodedPattern;
use crate::rdf::{EncodedTriple, Position, TermId, TripleStore};
use std::collections::BTreeSet;

/// Each bound variable position is assumed to cut the candidate set by this
/// factor when the planner estimates a join step
const BOUND_VARIABLE_SELECTIVITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Constant(TermId),
    /// Constant that is not in the dictionary, so nothing can match
    Missing,
    Variable(VarId),
}

/// A triple pattern ready for evaluation
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    slots: [Slot; 3],
}

impl PatternMatcher {
    pub fn compile(pattern: &PatternTriple, store: &TripleStore) -> Self {
        let slot = |term: &PatternTerm| match term {
            PatternTerm::Variable(v) => Slot::Variable(*v),
            PatternTerm::Constant(c) => store.term_id(c).map_or(Slot::Missing, Slot::Constant),
        };
        Self {
            slots: [
                slot(&pattern.subject),
                slot(&pattern.predicate),
                slot(&pattern.object),
            ],
        }
    }

    /// False when a constant of the pattern is unknown to the store
    pub fn can_match(&self) -> bool {
        !self.slots.contains(&Slot::Missing)
    }

    pub fn variables(&self) -> BTreeSet<VarId> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::Variable(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Number of positions fixed by constants or by variables in `bound`
    pub fn bound_positions(&self, bound: &BTreeSet<VarId>) -> usize {
        self.slots
            .iter()
            .filter(|s| match s {
                Slot::Constant(_) | Slot::Missing => true,
                Slot::Variable(v) => bound.contains(v),
            })
            .count()
    }

    fn encoded_pattern(&self, frame: Option<&Bindings>) -> EncodedPattern {
        let id = |slot: Slot| match slot {
            Slot::Constant(id) => Some(id),
            Slot::Missing => None,
            Slot::Variable(v) => frame.and_then(|f| f.get(v)),
        };
        EncodedPattern::new(id(self.slots[0]), id(self.slots[1]), id(self.slots[2]))
    }

    /// Candidate-count estimate once the variables in `bound` have values
    pub fn estimate(&self, store: &TripleStore, bound: &BTreeSet<VarId>) -> usize {
        if !self.can_match() {
            return 0;
        }
        let base = store.estimate(&self.encoded_pattern(None));
        let bound_variables = self
            .variables()
            .iter()
            .filter(|v| bound.contains(v))
            .count() as u32;
        if base == 0 {
            return 0;
        }
        (base / BOUND_VARIABLE_SELECTIVITY.saturating_pow(bound_variables)).max(1)
    }

    /// Extensions of `frame` by the triples matching this pattern
    pub fn matches(&self, store: &TripleStore, frame: &Bindings) -> MatchIter {
        let candidates = if self.can_match() {
            store.lookup_encoded(&self.encoded_pattern(Some(frame)))
        } else {
            Vec::new()
        };
        MatchIter {
            slots: self.slots,
            frame: frame.clone(),
            candidates: candidates.into_iter(),
        }
    }
}

/// Lazy sequence of extended frames for one input frame
pub struct MatchIter {
    slots: [Slot; 3],
    frame: Bindings,
    candidates: std::vec::IntoIter<EncodedTriple>,
}

impl MatchIter {
    fn extend(&self, triple: &EncodedTriple) -> Option<Bindings> {
        let mut out = self.frame.clone();
        for (slot, position) in self.slots.iter().zip(Position::ALL) {
            let value = triple.get(position);
            match slot {
                Slot::Constant(id) if *id != value => return None,
                Slot::Variable(v) => match out.get(*v) {
                    Some(existing) if existing != value => return None,
                    Some(_) => {}
                    None => out.set(*v, value),
                },
                _ => {}
            }
        }
        Some(out)
    }
}

impl Iterator for MatchIter {
    type Item = Bindings;

    fn next(&mut self) -> Option<Bindings> {
        while let Some(triple) = self.candidates.next() {
            if let Some(extended) = self.extend(&triple) {
                return Some(extended);
            }
        }
        None
    }
}
