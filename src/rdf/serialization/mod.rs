//! RDF serialization formats
//!
//! Supports:
//! - Turtle (TTL) and the Turtle-compatible subset of N3
//! - RDF/XML (standards reader and writer)
//! - "Simple" RDF/XML, a lenient `rdf:Description` reader
//!
//! Parsers never touch the store directly. They produce a
//! [`ParsedDocument`] that is loaded in one step, so a document either
//! contributes all of its triples and prefixes or nothing.

mod rdfxml;
mod rio;
mod simple_xml;
mod turtle;

pub use rdfxml::{RdfXmlParserWrapper, RdfXmlSerializerWrapper};
pub use simple_xml::SimpleRdfXmlParser;
pub use turtle::{TurtleParserWrapper, TurtleSerializerWrapper};

use super::namespace::PrefixTable;
use super::store::TripleStore;
use super::types::{BlankNode, RdfObject, RdfSubject, Triple};
use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// RDF serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    /// Turtle format (.ttl)
    Turtle,
    /// Notation3 (.n3), Turtle-compatible subset
    N3,
    /// RDF/XML format (.rdf, .xml)
    RdfXml,
    /// Lenient RDF/XML reader
    SimpleRdfXml,
}

impl RdfFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ttl" | "turtle" | "nt" => Some(RdfFormat::Turtle),
            "n3" => Some(RdfFormat::N3),
            "rdf" | "xml" | "owl" => Some(RdfFormat::RdfXml),
            _ => None,
        }
    }
}

/// Parse errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unsupported format
    #[error("Unsupported format: {0:?}")]
    UnsupportedFormat(RdfFormat),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Serialization errors
#[derive(Error, Debug)]
pub enum SerializeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0:?}")]
    UnsupportedFormat(RdfFormat),
}

pub type SerializeResult<T> = Result<T, SerializeError>;

/// Triples and prefix declarations read from one document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub triples: Vec<Triple>,
    pub prefixes: Vec<(String, String)>,
}

impl ParsedDocument {
    /// Add everything to `store` as one bulk load.
    ///
    /// Blank node labels are scoped to the document: each label is replaced
    /// by a label the store has never seen, shared by every occurrence in
    /// this document. Returns the number of triples that were new.
    pub fn load_into(self, store: &mut TripleStore) -> usize {
        for (prefix, iri) in &self.prefixes {
            store.register_prefix(prefix.clone(), iri.clone());
        }

        let mut relabeled: FxHashMap<String, BlankNode> = FxHashMap::default();
        let mut fresh = |store: &mut TripleStore, node: &BlankNode| -> BlankNode {
            relabeled
                .entry(node.as_str().to_string())
                .or_insert_with(|| store.fresh_blank_node())
                .clone()
        };

        let total = self.triples.len();
        store.begin_bulk_load();
        let mut added = 0;
        for mut triple in self.triples {
            if let RdfSubject::BlankNode(b) = &triple.subject {
                triple.subject = RdfSubject::BlankNode(fresh(store, b));
            }
            if let RdfObject::BlankNode(b) = &triple.object {
                triple.object = RdfObject::BlankNode(fresh(store, b));
            }
            if store.add(&triple) {
                added += 1;
            }
        }
        store.build_all_indexes();
        info!("Loaded {} triples ({} new)", total, added);
        added
    }
}

/// RDF parser
pub struct RdfParser;

impl RdfParser {
    /// Parse a document; `prefixes` resolves qualified names the document
    /// uses without declaring
    pub fn parse(input: &str, format: RdfFormat, prefixes: &PrefixTable) -> ParseResult<ParsedDocument> {
        match format {
            RdfFormat::Turtle | RdfFormat::N3 => TurtleParserWrapper::parse(input),
            RdfFormat::RdfXml => RdfXmlParserWrapper::parse(input),
            RdfFormat::SimpleRdfXml => SimpleRdfXmlParser::parse(input, prefixes),
        }
    }

    /// Parse RDF data from a file
    pub fn parse_file(path: &Path, format: RdfFormat, prefixes: &PrefixTable) -> ParseResult<ParsedDocument> {
        let input = std::fs::read_to_string(path)?;
        Self::parse(&input, format, prefixes)
    }
}

/// RDF serializer
pub struct RdfSerializer;

impl RdfSerializer {
    /// Serialize the store contents
    pub fn serialize_store(store: &TripleStore, format: RdfFormat) -> SerializeResult<String> {
        let triples: Vec<Triple> = store.iter().collect();
        Self::serialize_triples(&triples, format, store.prefixes())
    }

    /// Serialize a detached set of triples, e.g. a CONSTRUCT result
    pub fn serialize_triples(
        triples: &[Triple],
        format: RdfFormat,
        prefixes: &PrefixTable,
    ) -> SerializeResult<String> {
        match format {
            RdfFormat::Turtle => TurtleSerializerWrapper::serialize(triples, prefixes),
            RdfFormat::RdfXml => RdfXmlSerializerWrapper::serialize(triples),
            other => Err(SerializeError::UnsupportedFormat(other)),
        }
    }
}
