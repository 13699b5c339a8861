//! Lenient RDF/XML reader
//!
//! Reads the common "flat" shape of RDF/XML: node elements (`rdf:Description`
//! or typed nodes) directly under `rdf:RDF`, each holding property elements
//! with either `rdf:resource`, `rdf:nodeID` or text content. Qualified names
//! resolve through the document's `xmlns` declarations first, then through
//! the store's prefix table, so documents that forget to declare a
//! registered prefix still load.

use super::{ParseError, ParseResult, ParsedDocument};
use crate::rdf::{
    BlankNode, Literal, NamedNode, PrefixLookup, PrefixTable, RdfError, RdfObject, RdfPredicate,
    RdfSubject, RdfTerm, Triple, RDF_NS,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const XML_LANG: &str = "xml:lang";

#[derive(Debug)]
enum Frame {
    /// `rdf:RDF` or any other wrapper
    Root,
    Node(RdfSubject),
    Property {
        subject: RdfSubject,
        predicate: RdfPredicate,
        language: Option<String>,
        datatype: Option<NamedNode>,
        text: String,
        has_object: bool,
    },
}

struct Element {
    name: String,
    attributes: Vec<(String, String)>,
}

/// Lenient RDF/XML parser built on quick-xml
pub struct SimpleRdfXmlParser<'a> {
    prefixes: &'a PrefixTable,
    namespaces: Vec<(String, String)>,
    stack: Vec<Frame>,
    triples: Vec<Triple>,
    anonymous: usize,
}

impl<'a> SimpleRdfXmlParser<'a> {
    pub fn parse(input: &str, prefixes: &'a PrefixTable) -> ParseResult<ParsedDocument> {
        let mut parser = SimpleRdfXmlParser {
            prefixes,
            namespaces: Vec::new(),
            stack: Vec::new(),
            triples: Vec::new(),
            anonymous: 0,
        };

        let mut reader = Reader::from_str(input);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let element = parser.element(e)?;
                    parser.open(element)?;
                }
                Ok(Event::Empty(ref e)) => {
                    let element = parser.element(e)?;
                    parser.open(element)?;
                    parser.close()?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(xml_error)?;
                    parser.text(&text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    parser.text(&text);
                }
                Ok(Event::End(_)) => parser.close()?,
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ParseError::Parse(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !parser.stack.is_empty() {
            return Err(ParseError::Parse("unexpected end of document".to_string()));
        }

        Ok(ParsedDocument {
            triples: parser.triples,
            prefixes: parser.namespaces,
        })
    }

    fn element(&mut self, e: &BytesStart<'_>) -> ParseResult<Element> {
        let name = std::str::from_utf8(e.name().as_ref())
            .map_err(|e| ParseError::Parse(e.to_string()))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| ParseError::Parse(e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| ParseError::Parse(e.to_string()))?
                .to_string();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();

            if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.push((prefix.to_string(), value));
            } else if key == "xmlns" {
                self.namespaces.push((String::new(), value));
            } else {
                attributes.push((key, value));
            }
        }
        Ok(Element { name, attributes })
    }

    fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, iri)| iri.as_str())
            .or_else(|| self.prefixes.namespace(prefix))
    }

    /// Expand `prefix:local` (or an unprefixed name in the default namespace)
    fn expand(&self, qname: &str) -> ParseResult<String> {
        let (prefix, local) = qname.split_once(':').unwrap_or(("", qname));
        self.namespace(prefix)
            .map(|ns| format!("{}{}", ns, local))
            .ok_or_else(|| ParseError::Parse(format!("Unknown prefix: {}", prefix)))
    }

    fn is_rdf(&self, qname: &str, local: &str) -> bool {
        self.expand(qname)
            .map_or(false, |iri| iri.strip_prefix(RDF_NS) == Some(local))
    }

    fn attribute<'e>(&self, element: &'e Element, local: &str) -> Option<&'e str> {
        element
            .attributes
            .iter()
            .find(|(k, _)| self.is_rdf(k, local))
            .map(|(_, v)| v.as_str())
    }

    fn open(&mut self, element: Element) -> ParseResult<()> {
        let frame = match self.stack.last() {
            None if self.is_rdf(&element.name, "RDF") => Frame::Root,
            None | Some(Frame::Root) => self.node(&element)?,
            Some(Frame::Node(subject)) => {
                let subject = subject.clone();
                self.property(subject, &element)?
            }
            Some(Frame::Property {
                subject, predicate, ..
            }) => {
                let (subject, predicate) = (subject.clone(), predicate.clone());
                let frame = self.node(&element)?;
                if let Frame::Node(object) = &frame {
                    self.triples.push(Triple::new(
                        subject,
                        predicate,
                        RdfTerm::from(object.clone()).into(),
                    ));
                }
                if let Some(Frame::Property { has_object, .. }) = self.stack.last_mut() {
                    *has_object = true;
                }
                frame
            }
        };
        self.stack.push(frame);
        Ok(())
    }

    fn node(&mut self, element: &Element) -> ParseResult<Frame> {
        let subject: RdfSubject = if let Some(about) = self.attribute(element, "about") {
            NamedNode::new(about).map_err(invalid)?.into()
        } else if let Some(id) = self.attribute(element, "nodeID") {
            BlankNode::new(id).map_err(invalid)?.into()
        } else {
            self.anonymous += 1;
            BlankNode::new(&format!("anon{}", self.anonymous))
                .map_err(invalid)?
                .into()
        };

        if !self.is_rdf(&element.name, "Description") {
            let class = NamedNode::new(&self.expand(&element.name)?).map_err(invalid)?;
            self.triples.push(Triple::new(
                subject.clone(),
                RdfPredicate::new(&format!("{}type", RDF_NS)).map_err(invalid)?,
                class.into(),
            ));
        }

        for (key, value) in &element.attributes {
            if key.starts_with("xml:") || self.is_rdf_attribute(key) {
                continue;
            }
            let predicate = RdfPredicate::new(&self.expand(key)?).map_err(invalid)?;
            self.triples.push(Triple::new(
                subject.clone(),
                predicate,
                Literal::new_simple_literal(value.clone()).into(),
            ));
        }

        Ok(Frame::Node(subject))
    }

    fn is_rdf_attribute(&self, key: &str) -> bool {
        self.expand(key)
            .map_or(false, |iri| iri.starts_with(RDF_NS))
    }

    fn property(&mut self, subject: RdfSubject, element: &Element) -> ParseResult<Frame> {
        let predicate = RdfPredicate::new(&self.expand(&element.name)?).map_err(invalid)?;

        let object: Option<RdfObject> = if let Some(resource) = self.attribute(element, "resource") {
            Some(NamedNode::new(resource).map_err(invalid)?.into())
        } else if let Some(id) = self.attribute(element, "nodeID") {
            Some(BlankNode::new(id).map_err(invalid)?.into())
        } else {
            None
        };

        let has_object = object.is_some();
        if let Some(object) = object {
            self.triples
                .push(Triple::new(subject.clone(), predicate.clone(), object));
        }

        let language = element
            .attributes
            .iter()
            .find(|(k, _)| k == XML_LANG)
            .map(|(_, v)| v.clone());
        let datatype = match self.attribute(element, "datatype") {
            Some(dt) => Some(NamedNode::new(dt).map_err(invalid)?),
            None => None,
        };

        Ok(Frame::Property {
            subject,
            predicate,
            language,
            datatype,
            text: String::new(),
            has_object,
        })
    }

    fn text(&mut self, text: &str) {
        if let Some(Frame::Property { text: buffer, .. }) = self.stack.last_mut() {
            buffer.push_str(text);
        }
    }

    fn close(&mut self) -> ParseResult<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| ParseError::Parse("unbalanced closing tag".to_string()))?;

        if let Frame::Property {
            subject,
            predicate,
            language,
            datatype,
            text,
            has_object: false,
        } = frame
        {
            let literal = match (language, datatype) {
                (Some(lang), _) => Literal::new_language_tagged_literal(text, lang).map_err(invalid)?,
                (None, Some(dt)) => Literal::new_typed_literal(text, dt),
                (None, None) => Literal::new_simple_literal(text),
            };
            self.triples.push(Triple::new(subject, predicate, literal.into()));
        }
        Ok(())
    }
}

fn invalid(e: RdfError) -> ParseError {
    ParseError::Parse(e.to_string())
}

fn xml_error(e: quick_xml::Error) -> ParseError {
    ParseError::Parse(e.to_string())
}
