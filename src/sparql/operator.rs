//! Physical operators for pattern evaluation (Volcano iterator model)
//!
//! A basic graph pattern compiles to a left-deep chain: a singleton source,
//! one [`PatternMatchOperator`] per triple pattern (nested-loop join) and
//! [`FilterOperator`]s placed where their variables become bound.

use super::algebra::Expression;
use super::bindings::{Bindings, FrameView};
use super::expression::{effective_boolean, evaluate};
use super::matcher::{MatchIter, PatternMatcher};
use super::SparqlResult;
use crate::rdf::TripleStore;
use tracing::trace;

/// Physical operator trait - all operators implement this
pub trait PhysicalOperator: Send {
    /// Get the next binding frame from this operator
    fn next(&mut self, store: &TripleStore) -> SparqlResult<Option<Bindings>>;

    /// Reset the operator to start from the beginning
    fn reset(&mut self);
}

/// Type alias for boxed operators
pub type OperatorBox = Box<dyn PhysicalOperator>;

/// Emits one empty frame; the source of every pipeline
pub struct SingletonOperator {
    width: usize,
    done: bool,
}

impl SingletonOperator {
    /// Create a new singleton operator for frames of `width` variables
    pub fn new(width: usize) -> Self {
        Self { width, done: false }
    }
}

impl PhysicalOperator for SingletonOperator {
    fn next(&mut self, _store: &TripleStore) -> SparqlResult<Option<Bindings>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(Bindings::new(self.width)))
    }

    fn reset(&mut self) {
        self.done = false;
    }
}

/// Extends each input frame with the matches of one triple pattern
pub struct PatternMatchOperator {
    input: OperatorBox,
    matcher: PatternMatcher,
    current: Option<MatchIter>,
}

impl PatternMatchOperator {
    /// Create a new pattern match operator
    pub fn new(input: OperatorBox, matcher: PatternMatcher) -> Self {
        Self {
            input,
            matcher,
            current: None,
        }
    }
}

impl PhysicalOperator for PatternMatchOperator {
    fn next(&mut self, store: &TripleStore) -> SparqlResult<Option<Bindings>> {
        loop {
            if let Some(extended) = self.current.as_mut().and_then(|iter| iter.next()) {
                return Ok(Some(extended));
            }
            match self.input.next(store)? {
                Some(frame) => self.current = Some(self.matcher.matches(store, &frame)),
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.current = None;
    }
}

/// Drops frames for which the predicate is false or fails to evaluate
pub struct FilterOperator {
    input: OperatorBox,
    predicate: Expression,
}

impl FilterOperator {
    /// Create a new filter operator
    pub fn new(input: OperatorBox, predicate: Expression) -> Self {
        Self { input, predicate }
    }
}

impl PhysicalOperator for FilterOperator {
    fn next(&mut self, store: &TripleStore) -> SparqlResult<Option<Bindings>> {
        while let Some(frame) = self.input.next(store)? {
            let view = FrameView {
                frame: &frame,
                store,
            };
            match evaluate(&self.predicate, &view).and_then(|v| effective_boolean(&v)) {
                Ok(true) => return Ok(Some(frame)),
                Ok(false) => {}
                Err(e) => trace!("filter error treated as false: {}", e),
            }
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Literal, NamedNode, RdfTerm, Triple};
    use crate::sparql::algebra::{BinaryOp, PatternTerm, PatternTriple};
    use crate::sparql::bindings::VarId;

    fn iri(s: &str) -> RdfTerm {
        NamedNode::new(&format!("http://example.org/{}", s))
            .unwrap()
            .into()
    }

    fn store() -> TripleStore {
        let mut store = TripleStore::new();
        for (person, age) in [("alice", 30), ("bob", 17), ("carol", 45)] {
            store.add(
                &Triple::from_terms(iri(person), iri("age"), Literal::integer(age).into()).unwrap(),
            );
        }
        store
    }

    fn age_pattern() -> PatternTriple {
        PatternTriple {
            subject: PatternTerm::Variable(VarId(0)),
            predicate: PatternTerm::Constant(iri("age")),
            object: PatternTerm::Variable(VarId(1)),
        }
    }

    fn drain(op: &mut OperatorBox, store: &TripleStore) -> Vec<Bindings> {
        let mut out = Vec::new();
        while let Some(frame) = op.next(store).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_singleton_emits_once() {
        let store = TripleStore::new();
        let mut op = SingletonOperator::new(2);
        assert!(op.next(&store).unwrap().is_some());
        assert!(op.next(&store).unwrap().is_none());
        op.reset();
        assert!(op.next(&store).unwrap().is_some());
    }

    #[test]
    fn test_pattern_match_and_filter() {
        let store = store();
        let matcher = PatternMatcher::compile(&age_pattern(), &store);
        let scan: OperatorBox = Box::new(PatternMatchOperator::new(
            Box::new(SingletonOperator::new(2)),
            matcher,
        ));
        let adult = Expression::Binary {
            left: Box::new(Expression::Variable(VarId(1))),
            op: BinaryOp::GreaterOrEqual,
            right: Box::new(Expression::Constant(Literal::integer(18).into())),
        };
        let mut op: OperatorBox = Box::new(FilterOperator::new(scan, adult));

        assert_eq!(drain(&mut op, &store).len(), 2);
        op.reset();
        assert_eq!(drain(&mut op, &store).len(), 2);
    }
}
