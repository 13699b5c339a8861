//! Naive forward chaining to a fixpoint

use super::{Rule, RuleError, RuleResult};
use crate::rdf::{Triple, TripleStore};
use indexmap::IndexSet;
use tracing::{debug, info, warn};

/// Iteration cap used when none is configured
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// Outcome of one inference run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InferenceReport {
    /// Triples added to the store
    pub derived: usize,
    /// Passes executed, including the final pass that derived nothing
    pub passes: usize,
    pub fixpoint_reached: bool,
}

impl InferenceReport {
    /// Turn a capped run into [`RuleError::FixpointNotReached`]
    pub fn into_result(self) -> RuleResult<Self> {
        if self.fixpoint_reached {
            Ok(self)
        } else {
            Err(RuleError::FixpointNotReached {
                passes: self.passes,
                derived: self.derived,
            })
        }
    }
}

/// Rule set plus iteration cap
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    max_iterations: usize,
}

impl RuleEngine {
    /// Create a new engine with the default iteration cap
    pub fn new() -> Self {
        Self::with_max_iterations(DEFAULT_MAX_ITERATIONS)
    }

    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            rules: Vec::new(),
            max_iterations,
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        debug!("Added rule {}", rule);
        self.rules.push(rule);
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Rule>) {
        for rule in rules {
            self.add_rule(rule);
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    /// Apply every rule until a pass adds nothing or the cap is reached
    ///
    /// Each pass reads the store as it was at the start of the pass; new
    /// triples are inserted after all rules have fired. Hitting the cap is
    /// reported through [`InferenceReport::fixpoint_reached`], not as an error.
    pub fn run(&self, store: &mut TripleStore) -> RuleResult<InferenceReport> {
        let mut report = InferenceReport::default();
        if self.rules.is_empty() {
            report.fixpoint_reached = true;
            return Ok(report);
        }

        while report.passes < self.max_iterations {
            report.passes += 1;

            let mut candidates: IndexSet<Triple> = IndexSet::new();
            for rule in &self.rules {
                for triple in rule.fire(store)? {
                    if !store.contains(&triple) {
                        candidates.insert(triple);
                    }
                }
            }

            let mut added = 0;
            for triple in &candidates {
                if store.add(triple) {
                    added += 1;
                }
            }
            debug!(pass = report.passes, derived = added, "rule pass finished");

            if added == 0 {
                report.fixpoint_reached = true;
                break;
            }
            report.derived += added;
        }

        if report.fixpoint_reached {
            info!(
                "Inference reached fixpoint: {} triples derived in {} passes",
                report.derived, report.passes
            );
        } else {
            warn!(
                "Inference stopped at the iteration cap ({}) with {} triples derived",
                self.max_iterations, report.derived
            );
        }
        Ok(report)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{NamedNode, PrefixTable, RdfTerm};

    fn prefixes() -> PrefixTable {
        let mut table = PrefixTable::new();
        table.register("ex", "http://example.org/");
        table
    }

    fn iri(s: &str) -> RdfTerm {
        NamedNode::new(&format!("http://example.org/{}", s))
            .unwrap()
            .into()
    }

    fn chain(length: usize) -> TripleStore {
        let mut store = TripleStore::new();
        for i in 0..length {
            store.add(
                &Triple::from_terms(iri(&format!("n{}", i)), iri("next"), iri(&format!("n{}", i + 1)))
                    .unwrap(),
            );
        }
        store
    }

    fn transitive(engine: &mut RuleEngine) {
        engine.add_rules(
            Rule::parse(
                "ex:next(?x, ?z) :- ex:next(?x, ?y), ex:next(?y, ?z).",
                &prefixes(),
            )
            .unwrap(),
        );
    }

    #[test]
    fn test_transitive_closure_reaches_fixpoint() {
        let mut store = chain(2);
        let mut engine = RuleEngine::new();
        transitive(&mut engine);

        let report = engine.run(&mut store).unwrap();
        assert_eq!(report.derived, 1);
        assert_eq!(report.passes, 2);
        assert!(report.fixpoint_reached);
        assert!(store.contains(&Triple::from_terms(iri("n0"), iri("next"), iri("n2")).unwrap()));

        let again = engine.run(&mut store).unwrap();
        assert_eq!(again.derived, 0);
        assert_eq!(again.passes, 1);
    }

    #[test]
    fn test_cap_is_reported() {
        let mut store = chain(16);
        let mut engine = RuleEngine::with_max_iterations(1);
        transitive(&mut engine);

        let report = engine.run(&mut store).unwrap();
        assert!(!report.fixpoint_reached);
        assert_eq!(report.passes, 1);
        assert!(report.derived > 0);
        assert!(matches!(
            report.into_result(),
            Err(RuleError::FixpointNotReached { passes: 1, .. })
        ));
    }

    #[test]
    fn test_full_closure_of_longer_chain() {
        let mut store = chain(5);
        let mut engine = RuleEngine::new();
        transitive(&mut engine);
        engine.run(&mut store).unwrap();
        // 6 nodes in a line: 5 + 4 + 3 + 2 + 1 pairs
        assert_eq!(store.len(), 15);
    }

    #[test]
    fn test_empty_engine_is_a_fixpoint() {
        let mut store = chain(2);
        let report = RuleEngine::new().run(&mut store).unwrap();
        assert!(report.fixpoint_reached);
        assert_eq!(report.passes, 0);
    }
}
