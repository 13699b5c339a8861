//! Term dictionary
//!
//! Interns every term stored in the triple store to a compact [`TermId`] so
//! that the canonical set and all index permutations hold fixed-size keys.
//! Ids are never reused; a term keeps its id after the last triple using it
//! is removed.

use super::types::{Position, RdfTerm};
use rustc_hash::FxHashMap;
use std::fmt;

/// Dense identifier of an interned term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub(crate) u32);

impl TermId {
    pub const MIN: TermId = TermId(0);
    pub const MAX: TermId = TermId(u32::MAX);

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A triple of interned term ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedTriple {
    pub subject: TermId,
    pub predicate: TermId,
    pub object: TermId,
}

impl EncodedTriple {
    pub fn new(subject: TermId, predicate: TermId, object: TermId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn get(&self, position: Position) -> TermId {
        match position {
            Position::Subject => self.subject,
            Position::Predicate => self.predicate,
            Position::Object => self.object,
        }
    }
}

/// Bidirectional term ↔ id mapping
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    terms: Vec<RdfTerm>,
    ids: FxHashMap<RdfTerm, TermId>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a term, returning its existing id when already known
    pub fn encode(&mut self, term: &RdfTerm) -> TermId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(term.clone());
        self.ids.insert(term.clone(), id);
        id
    }

    /// Id of a term without interning it
    pub fn lookup(&self, term: &RdfTerm) -> Option<TermId> {
        self.ids.get(term).copied()
    }

    pub fn decode(&self, id: TermId) -> Option<&RdfTerm> {
        self.terms.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
