//! SPARQL query and update support
//!
//! This module implements the practical SPARQL subset the database accepts:
//! - SELECT / ASK / CONSTRUCT with FILTER, GROUP BY, aggregates, ORDER BY,
//!   DISTINCT, LIMIT and OFFSET
//! - INSERT DATA, DELETE DATA, DELETE WHERE and DELETE/INSERT ... WHERE
//! - the rule-definition syntax consumed by [`crate::rules`]
//!
//! Queries compile into a pipeline of Volcano-style operators driven over
//! the store's permutation indices.
//!
//! # Example
//!
//! ```rust
//! use samyama_rdf::rdf::TripleStore;
//! use samyama_rdf::sparql::{SparqlExecutor, SparqlResults};
//!
//! let mut store = TripleStore::new();
//! store.register_prefix("ex", "http://example.org/");
//!
//! samyama_rdf::sparql::UpdateExecutor::new(&mut store)
//!     .execute_str("INSERT DATA { ex:a ex:knows ex:b . ex:b ex:knows ex:c }")
//!     .unwrap();
//!
//! let results = SparqlExecutor::new(&store)
//!     .query_str("SELECT ?x ?y WHERE { ?x ex:knows ?y }")
//!     .unwrap();
//! assert_eq!(results.len(), 2);
//! ```

mod algebra;
mod bindings;
mod executor;
mod expression;
mod http;
mod matcher;
mod operator;
mod parser;
mod planner;
mod results;
mod update;

pub use algebra::{
    Aggregate, AggregateFunction, BinaryOp, Builtin, Expression, GroupPattern, OrderCondition,
    PatternTerm, PatternTriple, Projection, ProjectionItem, Query, QueryForm, RuleDefinition,
    RuleProgram, TemplateTerm, TemplateTriple, UnaryOp, UpdateOperation,
};
pub use bindings::{Bindings, FrameView, TermSource, VarId, VariableTable};
pub use executor::{instantiate_template, SparqlExecutor};
pub use expression::{compare_terms, effective_boolean, evaluate, Value};
pub use http::{HttpError, HttpRequest, HttpResponse, RequestHandler, SparqlHttpEndpoint};
pub use matcher::PatternMatcher;
pub use operator::{OperatorBox, PhysicalOperator};
pub use parser::SparqlParser;
pub use planner::{ExecutionPlan, QueryPlanner};
pub use results::{QuerySolution, ResultFormat, SparqlResults};
pub use update::{UpdateExecutor, UpdateSummary};

use crate::rdf::{PrefixError, RdfError};
use thiserror::Error;

/// SPARQL errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SparqlError {
    /// Malformed text, unbalanced punctuation or unknown keyword
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// A prefixed name uses an undeclared prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// A projected variable is never bound by the WHERE clause
    #[error("Unbound variable in projection: {0}")]
    UnboundVariableInProjection(String),

    /// A template without WHERE clause contains variables
    #[error("Unground template: {0} has no binding")]
    UngroundTemplate(String),

    /// Operand types do not fit the operator
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Recognised but unsupported construct
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid RDF term
    #[error(transparent)]
    Term(#[from] RdfError),
}

impl From<PrefixError> for SparqlError {
    fn from(err: PrefixError) -> Self {
        match err {
            PrefixError::UnknownPrefix(prefix) => SparqlError::UnknownPrefix(prefix),
            PrefixError::InvalidQName(qname) => {
                SparqlError::Syntax(format!("invalid qualified name {}", qname))
            }
            PrefixError::Term(e) => SparqlError::Term(e),
        }
    }
}

pub type SparqlResult<T> = Result<T, SparqlError>;
