//! Forward-chaining rule engine
//!
//! Rules are written either Datalog-style
//!
//! ```text
//! ex:ancestor(?x, ?z) :- ex:parent(?x, ?y), ex:ancestor(?y, ?z).
//! ```
//!
//! or as a named CONSTRUCT:
//!
//! ```text
//! RULE :Adult :- CONSTRUCT { ?p a ex:Adult } WHERE { ?p ex:age ?a FILTER(?a >= 18) }
//! ```
//!
//! The engine evaluates every rule body against a snapshot of the store,
//! inserts the instantiated heads at the end of the pass and repeats until
//! a pass derives nothing or the iteration cap is reached. Rules are not
//! re-fired automatically when data changes; callers run the engine.

mod engine;
mod rdfs;
mod rule;

pub use engine::{InferenceReport, RuleEngine, DEFAULT_MAX_ITERATIONS};
pub use rdfs::InferenceRule;
pub use rule::Rule;

use crate::sparql::SparqlError;
use thiserror::Error;

/// Rule errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// The rule text could not be parsed
    #[error("Rule syntax error: {0}")]
    Syntax(SparqlError),

    /// A rule body or trailing query failed to evaluate
    #[error("Rule evaluation error: {0}")]
    Query(SparqlError),

    /// Head uses a variable the body never binds, or a blank node
    #[error("Unsafe rule {rule}: {reason}")]
    UnsafeRule { rule: String, reason: String },

    /// The iteration cap was hit while passes were still deriving triples
    #[error("Rule fixpoint not reached after {passes} passes ({derived} triples derived)")]
    FixpointNotReached { passes: usize, derived: usize },
}

pub type RuleResult<T> = Result<T, RuleError>;
