//! Turtle format implementation
//!
//! N3 documents go through the same reader; only the Turtle-compatible
//! subset of N3 (no formulae, no `=>`) is accepted.

use super::rio::{convert_triple, with_rio_triple};
use super::{ParseError, ParseResult, ParsedDocument, SerializeError, SerializeResult};
use crate::rdf::{PrefixTable, Triple};
use regex::Regex;
use rio_api::formatter::TriplesFormatter;
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleFormatter, TurtleParser};
use std::io::{BufReader, Cursor};
use std::sync::LazyLock;

static PREFIX_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:@prefix|PREFIX)\s+([A-Za-z][\w.-]*)?:\s*<([^>]*)>")
        .expect("prefix declaration pattern is valid")
});

/// Prefix declarations in a Turtle/N3 document, in document order
pub(crate) fn declared_prefixes(input: &str) -> Vec<(String, String)> {
    PREFIX_DECL
        .captures_iter(input)
        .map(|c| {
            let prefix = c.get(1).map_or("", |m| m.as_str()).to_string();
            (prefix, c[2].to_string())
        })
        .collect()
}

/// Turtle parser
pub struct TurtleParserWrapper;

impl TurtleParserWrapper {
    /// Parse a Turtle string into triples and its prefix declarations
    pub fn parse(input: &str) -> ParseResult<ParsedDocument> {
        let cursor = Cursor::new(input);
        let mut reader = BufReader::new(cursor);
        let mut parser = TurtleParser::new(&mut reader, None);

        let mut triples = Vec::new();
        let mut converted: Result<(), ParseError> = Ok(());

        let res: Result<(), rio_turtle::TurtleError> = parser.parse_all(&mut |t| {
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
            prefixes: declared_prefixes(input),
        })
    }
}

/// Turtle serializer
pub struct TurtleSerializerWrapper;

impl TurtleSerializerWrapper {
    /// Serialize triples to a Turtle string, headed by `@prefix` lines
    pub fn serialize(triples: &[Triple], prefixes: &PrefixTable) -> SerializeResult<String> {
        let mut output = Vec::new();
        for (prefix, iri) in prefixes.iter() {
            output.extend_from_slice(format!("@prefix {}: <{}> .\n", prefix, iri).as_bytes());
        }

        let mut formatter = TurtleFormatter::new(&mut output);
        for triple in triples {
            with_rio_triple(triple, |t| formatter.format(t))
                .map_err(|e| SerializeError::Serialize(e.to_string()))?;
        }
        formatter
            .finish()
            .map_err(|e| SerializeError::Serialize(e.to_string()))?;

        String::from_utf8(output).map_err(|e| SerializeError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turtle_roundtrip() {
        let input = r#"<http://example.org/a> <http://example.org/b> "c" ."#;
        let doc = TurtleParserWrapper::parse(input).unwrap();
        assert_eq!(doc.triples.len(), 1);
        let output = TurtleSerializerWrapper::serialize(&doc.triples, &PrefixTable::new()).unwrap();
        assert!(output.contains("http://example.org/a"));
        let again = TurtleParserWrapper::parse(&output).unwrap();
        assert_eq!(again.triples, doc.triples);
    }

    #[test]
    fn test_prefixes_are_collected() {
        let input = "@prefix ex: <http://example.org/> .\nPREFIX foaf: <http://xmlns.com/foaf/0.1/>\nex:a foaf:knows ex:b .";
        let doc = TurtleParserWrapper::parse(input).unwrap();
        assert_eq!(
            doc.prefixes,
            vec![
                ("ex".to_string(), "http://example.org/".to_string()),
                ("foaf".to_string(), "http://xmlns.com/foaf/0.1/".to_string()),
            ]
        );
        assert_eq!(doc.triples[0].object.to_string(), "<http://example.org/b>");
    }

    #[test]
    fn test_malformed_turtle() {
        assert!(TurtleParserWrapper::parse("<http://example.org/a> <http://example.org/b> .").is_err());
        assert!(TurtleParserWrapper::parse("ex:a ex:b ex:c .").is_err());
    }
}
