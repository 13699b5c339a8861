//! RDF (Resource Description Framework) data model and storage
//!
//! This module implements the triple store functionality:
//! - RDF terms and triples backed by oxrdf
//! - A term dictionary interning terms to compact ids
//! - The triple store with its prefix table and permutation indices
//! - Serialization formats (Turtle, N3 subset, RDF/XML)
//!
//! # Example
//!
//! ```rust
//! use samyama_rdf::rdf::{TripleStore, Triple, NamedNode, Literal, RdfPredicate, TriplePattern};
//!
//! let mut store = TripleStore::new();
//!
//! let subject = NamedNode::new("http://example.org/alice").unwrap();
//! let predicate = RdfPredicate::new("http://xmlns.com/foaf/0.1/name").unwrap();
//! let object = Literal::new_simple_literal("Alice");
//!
//! let triple = Triple::new(subject.clone().into(), predicate, object.into());
//! assert!(store.add(&triple));
//!
//! let results = store.lookup(&TriplePattern::new(Some(subject.into()), None, None));
//! assert_eq!(results.len(), 1);
//! ```

mod dictionary;
mod namespace;
mod serialization;
mod store;
mod types;

pub use types::{
    escape_literal, BlankNode, Literal, NamedNode, Position, RdfError, RdfObject, RdfPredicate,
    RdfResult, RdfSubject, RdfTerm, Triple, TriplePattern, RDF_NS, RDF_TYPE, XSD_BOOLEAN,
    XSD_DECIMAL, XSD_DOUBLE, XSD_INTEGER, XSD_NS, XSD_STRING,
};

pub use dictionary::{EncodedTriple, TermDictionary, TermId};

pub use store::TripleStore;

pub use namespace::{
    parse_term, PrefixError, PrefixLookup, PrefixResult, PrefixScope, PrefixTable,
    COMMON_PREFIXES,
};

pub use serialization::{
    ParseError, ParseResult, ParsedDocument, RdfFormat, RdfParser, RdfSerializer,
    SerializeError, SerializeResult,
};
