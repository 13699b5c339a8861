//! RDF/XML format implementation

use super::rio::{convert_triple, with_rio_triple};
use super::{ParseError, ParseResult, ParsedDocument, SerializeError, SerializeResult};
use crate::rdf::Triple;
use regex::Regex;
use rio_api::formatter::TriplesFormatter;
use rio_api::parser::TriplesParser;
use rio_xml::{RdfXmlFormatter, RdfXmlParser};
use std::io::{BufReader, Cursor};
use std::sync::LazyLock;

static XMLNS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"xmlns:([A-Za-z_][\w.-]*)\s*=\s*["']([^"']*)["']"#)
        .expect("namespace declaration pattern is valid")
});

/// `xmlns:prefix="iri"` declarations found anywhere in the document
pub(crate) fn declared_namespaces(input: &str) -> Vec<(String, String)> {
    XMLNS_DECL
        .captures_iter(input)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// RDF/XML parser
pub struct RdfXmlParserWrapper;

impl RdfXmlParserWrapper {
    pub fn parse(input: &str) -> ParseResult<ParsedDocument> {
        let mut reader = BufReader::new(Cursor::new(input));
        let mut parser = RdfXmlParser::new(&mut reader, None);

        let mut triples = Vec::new();
        let mut converted: Result<(), ParseError> = Ok(());

        let res: Result<(), rio_xml::RdfXmlError> = parser.parse_all(&mut |t| {
            match convert_triple(t) {
                Ok(triple) => triples.push(triple),
                Err(e) if converted.is_ok() => converted = Err(e),
                Err(_) => {}
            }
            Ok(())
        });

        res.map_err(|e| ParseError::Parse(e.to_string()))?;
        converted?;

        Ok(ParsedDocument {
            triples,
            prefixes: declared_namespaces(input),
        })
    }
}

/// RDF/XML serializer
pub struct RdfXmlSerializerWrapper;

impl RdfXmlSerializerWrapper {
    /// Writes one `rdf:Description` per subject run. A predicate whose IRI has
    /// no XML-name suffix (e.g. `http://example.org/1`) becomes a `prop:`
    /// element bound through `xmlns:prop` to the full IRI, which parses back
    /// to the same predicate.
    pub fn serialize(triples: &[Triple]) -> SerializeResult<String> {
        let mut output = Vec::new();
        let mut formatter = RdfXmlFormatter::with_indentation(&mut output, 2)?;
        for triple in triples {
            with_rio_triple(triple, |t| formatter.format(t))?;
        }
        formatter.finish()?;

        String::from_utf8(output).map_err(|e| SerializeError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Literal, NamedNode};

    const DOC: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:ex="http://example.org/">
  <rdf:Description rdf:about="http://example.org/a">
    <ex:knows rdf:resource="http://example.org/b"/>
    <ex:name xml:lang="en">Alice</ex:name>
  </rdf:Description>
</rdf:RDF>"#;

    #[test]
    fn test_parse_rdf_xml() {
        let doc = RdfXmlParserWrapper::parse(DOC).unwrap();
        assert_eq!(doc.triples.len(), 2);
        assert!(doc
            .prefixes
            .contains(&("ex".to_string(), "http://example.org/".to_string())));
        assert!(doc.triples.iter().any(|t| t.object.to_string() == "\"Alice\"@en"));
    }

    #[test]
    fn test_round_trip() {
        let doc = RdfXmlParserWrapper::parse(DOC).unwrap();
        let xml = RdfXmlSerializerWrapper::serialize(&doc.triples).unwrap();
        let mut again = RdfXmlParserWrapper::parse(&xml).unwrap().triples;
        let mut original = doc.triples;
        again.sort_by_key(|t| t.to_string());
        original.sort_by_key(|t| t.to_string());
        assert_eq!(again, original);
    }

    #[test]
    fn test_round_trip_predicate_without_local_name() {
        let triple = Triple::from_terms(
            NamedNode::new("http://example.org/a").unwrap().into(),
            NamedNode::new("http://example.org/1").unwrap().into(),
            Literal::new_simple_literal("one").into(),
        )
        .unwrap();
        let xml = RdfXmlSerializerWrapper::serialize(std::slice::from_ref(&triple)).unwrap();
        assert!(xml.contains("<prop:"));
        assert!(xml.contains(r#"xmlns:prop="http://example.org/1""#));

        let again = RdfXmlParserWrapper::parse(&xml).unwrap().triples;
        assert_eq!(again, vec![triple]);
    }

    #[test]
    fn test_malformed_rdf_xml() {
        assert!(RdfXmlParserWrapper::parse("<rdf:RDF><oops").is_err());
    }
}
