//! Samyama RDF
//!
//! An embeddable, single-threaded, in-memory RDF triple store with a SPARQL
//! subset for queries and updates and a forward-chaining rule engine.
//!
//! # Architecture
//!
//! - [`rdf`]: terms, the term dictionary, the triple store, prefixes and the
//!   Turtle / N3 / RDF/XML adapters
//! - [`index`]: the six B-Tree permutation indices and index selection
//! - [`sparql`]: parser, planner, Volcano-style operators, result encodings,
//!   the update engine and request dispatch
//! - [`rules`]: rule checking and naive fixpoint inference, plus RDFS
//! - [`SparqlDatabase`]: the facade tying them together
//!
//! ## Example Usage
//!
//! ```rust
//! use samyama_rdf::SparqlDatabase;
//!
//! let mut db = SparqlDatabase::new();
//! db.parse_turtle(
//!     "@prefix ex: <http://example.org/> .
//!      ex:a ex:knows ex:b .
//!      ex:b ex:knows ex:c .",
//! )
//! .unwrap();
//!
//! db.process_rule_definition("ex:knows(?x, ?z) :- ex:knows(?x, ?y), ex:knows(?y, ?z).")
//!     .unwrap();
//!
//! let rows = db
//!     .execute_sparql_query_as_table("SELECT ?who WHERE { ex:a ex:knows ?who } ORDER BY ?who")
//!     .unwrap();
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[1]["who"], "http://example.org/c");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod database;
pub mod index;
pub mod rdf;
pub mod rules;
pub mod sparql;

// Re-export main types for convenience
pub use config::{ConfigError, DatabaseConfig};

pub use database::{DatabaseError, DatabaseResult, RuleOutcome, SparqlDatabase};

pub use rdf::{
    BlankNode, Literal, NamedNode, PrefixTable, RdfFormat, RdfObject, RdfPredicate, RdfSubject,
    RdfTerm, Triple, TriplePattern, TripleStore,
};

pub use rules::{InferenceReport, InferenceRule, Rule, RuleEngine, RuleError};

pub use sparql::{
    QuerySolution, ResultFormat, SparqlError, SparqlExecutor, SparqlParser, SparqlResult,
    SparqlResults, UpdateExecutor, UpdateSummary,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
