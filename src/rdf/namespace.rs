//! RDF namespace and prefix management
//!
//! The prefix table maps labels to namespace IRIs (last write wins) and is
//! consulted whenever a prefix-qualified name has to be turned into an
//! absolute IRI. Query-local declarations are layered on top with
//! [`PrefixScope`] without touching the persistent table.

use super::types::{
    BlankNode, Literal, NamedNode, Position, RdfError, RdfTerm, RDF_TYPE, XSD_BOOLEAN,
    XSD_DECIMAL, XSD_DOUBLE, XSD_INTEGER,
};
use indexmap::IndexMap;
use thiserror::Error;

/// Prefix errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Text that is neither an IRI nor a prefix-qualified name
    #[error("Invalid qualified name: {0}")]
    InvalidQName(String),

    /// The resolved term is not valid
    #[error(transparent)]
    Term(#[from] RdfError),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

/// Well-known prefixes preloaded by [`PrefixTable::with_common_prefixes`]
pub const COMMON_PREFIXES: [(&str, &str); 7] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
];

/// Something that can look a prefix label up
pub trait PrefixLookup {
    /// Namespace IRI registered for `prefix`
    fn namespace(&self, prefix: &str) -> Option<&str>;

    /// Expand a prefix-qualified name (`prefix:local`) to an absolute IRI
    fn resolve(&self, qname: &str) -> PrefixResult<NamedNode> {
        let (prefix, local) = qname
            .split_once(':')
            .ok_or_else(|| PrefixError::InvalidQName(qname.to_string()))?;
        let namespace = self
            .namespace(prefix)
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))?;
        Ok(NamedNode::new(&format!("{}{}", namespace, local))?)
    }
}

/// Prefix table (label → namespace IRI)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefixTable {
    prefixes: IndexMap<String, String>,
}

impl PrefixTable {
    /// Create an empty prefix table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a prefix table holding the common RDF/RDFS/OWL prefixes
    pub fn with_common_prefixes() -> Self {
        let mut table = Self::new();
        for (prefix, iri) in COMMON_PREFIXES {
            table.register(prefix, iri);
        }
        table
    }

    /// Register a prefix, replacing any earlier namespace for the label
    pub fn register(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    /// Get IRI for a prefix
    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.namespace(prefix)
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Compact an IRI using the longest matching namespace
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, ns)| !ns.is_empty() && iri.starts_with(ns.as_str()))
            .max_by_key(|(_, ns)| ns.len())
            .and_then(|(prefix, ns)| {
                let local = &iri[ns.len()..];
                is_local_name(local).then(|| format!("{}:{}", prefix, local))
            })
    }

    /// Iterate over registered prefixes in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Layer query-local declarations over this table
    pub fn scoped<'a>(&'a self, local: &'a [(String, String)]) -> PrefixScope<'a> {
        PrefixScope { base: self, local }
    }
}

impl PrefixLookup for PrefixTable {
    fn namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }
}

/// Query-local prefix declarations shadowing a persistent table
#[derive(Debug, Clone, Copy)]
pub struct PrefixScope<'a> {
    base: &'a PrefixTable,
    local: &'a [(String, String)],
}

impl PrefixLookup for PrefixScope<'_> {
    fn namespace(&self, prefix: &str) -> Option<&str> {
        self.local
            .iter()
            .rev()
            .find(|(label, _)| label == prefix)
            .map(|(_, iri)| iri.as_str())
            .or_else(|| self.base.namespace(prefix))
    }
}

fn is_local_name(local: &str) -> bool {
    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn looks_like_qname(text: &str) -> bool {
    match text.split_once(':') {
        Some((prefix, local)) => {
            prefix
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
                && !local.starts_with("//")
                && !local.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Parse the textual form of a single term as accepted by
/// `add_triple_parts`: `<iri>`, `prefix:local`, `_:label`, quoted literals
/// with optional `@lang` or `^^datatype`, bare numbers and booleans, and bare
/// absolute IRIs. In object position any other bare text becomes a plain
/// literal.
pub fn parse_term(text: &str, position: Position, prefixes: &impl PrefixLookup) -> PrefixResult<RdfTerm> {
    let text = text.trim();

    if let Some(iri) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(NamedNode::new(iri)?.into());
    }
    if let Some(label) = text.strip_prefix("_:") {
        return Ok(BlankNode::new(label)?.into());
    }
    if position == Position::Predicate && text == "a" {
        return Ok(NamedNode::new(RDF_TYPE)?.into());
    }
    if text.starts_with('"') {
        return parse_quoted_literal(text, prefixes).map(RdfTerm::from);
    }
    if position == Position::Object {
        if let Some(literal) = bare_typed_literal(text) {
            return Ok(literal.into());
        }
    }
    if text.contains("://") && !text.chars().any(char::is_whitespace) {
        return Ok(NamedNode::new(text)?.into());
    }
    if looks_like_qname(text) {
        return Ok(prefixes.resolve(text)?.into());
    }
    match position {
        Position::Object => Ok(Literal::new_simple_literal(text).into()),
        _ => Err(PrefixError::InvalidQName(text.to_string())),
    }
}

fn bare_typed_literal(text: &str) -> Option<Literal> {
    let datatype = if text == "true" || text == "false" {
        XSD_BOOLEAN
    } else if text.parse::<i64>().is_ok() {
        XSD_INTEGER
    } else if text.contains(|c: char| c == 'e' || c == 'E') && text.parse::<f64>().is_ok() {
        XSD_DOUBLE
    } else if text.contains('.')
        && text
            .trim_start_matches(|c: char| c == '+' || c == '-')
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
        && text.parse::<f64>().is_ok()
    {
        XSD_DECIMAL
    } else {
        return None;
    };
    NamedNode::new(datatype)
        .ok()
        .map(|dt| Literal::new_typed_literal(text, dt))
}

fn parse_quoted_literal(text: &str, prefixes: &impl PrefixLookup) -> PrefixResult<Literal> {
    let invalid = || PrefixError::Term(RdfError::InvalidLiteral(text.to_string()));

    let body = &text[1..];
    let mut value = String::new();
    let mut chars = body.char_indices();
    let mut end = None;
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                end = Some(i);
                break;
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, other)) => value.push(other),
                None => return Err(invalid()),
            },
            other => value.push(other),
        }
    }
    let end = end.ok_or_else(invalid)?;
    let suffix = &body[end + 1..];

    if suffix.is_empty() {
        Ok(Literal::new_simple_literal(value))
    } else if let Some(lang) = suffix.strip_prefix('@') {
        Ok(Literal::new_language_tagged_literal(value, lang)?)
    } else if let Some(datatype) = suffix.strip_prefix("^^") {
        let datatype = match datatype.strip_prefix('<').and_then(|d| d.strip_suffix('>')) {
            Some(iri) => NamedNode::new(iri)?,
            None => prefixes.resolve(datatype)?,
        };
        Ok(Literal::new_typed_literal(value, datatype))
    } else {
        Err(invalid())
    }
}
