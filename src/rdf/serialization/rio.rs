//! Conversions between rio_api model values and crate types

use super::ParseError;
use crate::rdf::{BlankNode, Literal, NamedNode, RdfObject, RdfPredicate, RdfSubject, Triple, XSD_STRING};
use rio_api::model;

fn invalid(e: impl std::fmt::Display) -> ParseError {
    ParseError::Parse(e.to_string())
}

pub(super) fn convert_triple(t: model::Triple<'_>) -> Result<Triple, ParseError> {
    Ok(Triple::new(
        convert_subject(t.subject)?,
        convert_predicate(t.predicate)?,
        convert_object(t.object)?,
    ))
}

fn convert_subject(s: model::Subject<'_>) -> Result<RdfSubject, ParseError> {
    match s {
        model::Subject::NamedNode(n) => Ok(RdfSubject::NamedNode(NamedNode::new(n.iri).map_err(invalid)?)),
        model::Subject::BlankNode(b) => Ok(RdfSubject::BlankNode(BlankNode::new(b.id).map_err(invalid)?)),
        #[allow(unreachable_patterns)]
        _ => Err(ParseError::Parse("Unsupported subject type".to_string())),
    }
}

fn convert_predicate(p: model::NamedNode<'_>) -> Result<RdfPredicate, ParseError> {
    RdfPredicate::new(p.iri).map_err(invalid)
}

fn convert_object(o: model::Term<'_>) -> Result<RdfObject, ParseError> {
    match o {
        model::Term::NamedNode(n) => Ok(RdfObject::NamedNode(NamedNode::new(n.iri).map_err(invalid)?)),
        model::Term::BlankNode(b) => Ok(RdfObject::BlankNode(BlankNode::new(b.id).map_err(invalid)?)),
        model::Term::Literal(model::Literal::Simple { value }) => {
            Ok(RdfObject::Literal(Literal::new_simple_literal(value)))
        }
        model::Term::Literal(model::Literal::LanguageTaggedString { value, language }) => Ok(
            RdfObject::Literal(Literal::new_language_tagged_literal(value, language).map_err(invalid)?),
        ),
        model::Term::Literal(model::Literal::Typed { value, datatype }) => {
            let dt = NamedNode::new(datatype.iri).map_err(invalid)?;
            Ok(RdfObject::Literal(Literal::new_typed_literal(value, dt)))
        }
        #[allow(unreachable_patterns)]
        _ => Err(ParseError::Parse("Unsupported object type".to_string())),
    }
}

/// Borrow a triple as a rio_api triple for the duration of `f`
pub(super) fn with_rio_triple<R>(triple: &Triple, f: impl FnOnce(&model::Triple<'_>) -> R) -> R {
    let subject = match &triple.subject {
        RdfSubject::NamedNode(n) => model::Subject::NamedNode(model::NamedNode { iri: n.as_str() }),
        RdfSubject::BlankNode(b) => model::Subject::BlankNode(model::BlankNode { id: b.as_str() }),
    };
    let predicate = model::NamedNode {
        iri: triple.predicate.as_str(),
    };
    let object = match &triple.object {
        RdfObject::NamedNode(n) => model::Term::NamedNode(model::NamedNode { iri: n.as_str() }),
        RdfObject::BlankNode(b) => model::Term::BlankNode(model::BlankNode { id: b.as_str() }),
        RdfObject::Literal(l) => model::Term::Literal(match l.language() {
            Some(language) => model::Literal::LanguageTaggedString {
                value: l.value(),
                language,
            },
            None if l.datatype() == XSD_STRING => model::Literal::Simple { value: l.value() },
            None => model::Literal::Typed {
                value: l.value(),
                datatype: model::NamedNode { iri: l.datatype() },
            },
        }),
    };
    f(&model::Triple {
        subject,
        predicate,
        object,
    })
}
