//! A checked inference rule

use super::{RuleError, RuleResult};
use crate::rdf::{Literal, PrefixTable, RdfTerm, Triple, TripleStore};
use crate::sparql::{
    instantiate_template, GroupPattern, RuleDefinition, SparqlExecutor, SparqlParser,
    TemplateTriple, VariableTable,
};
use std::fmt;

/// A rule whose head only uses variables bound by its body
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    variables: VariableTable,
    head: Vec<TemplateTriple>,
    body: GroupPattern,
}

impl Rule {
    /// Check a parsed definition; `fallback_name` is used when it has none
    pub fn from_definition(definition: RuleDefinition, fallback_name: &str) -> RuleResult<Self> {
        let name = definition
            .name
            .unwrap_or_else(|| fallback_name.to_string());
        let unsafe_rule = |reason: String| RuleError::UnsafeRule {
            rule: name.clone(),
            reason,
        };

        if definition.head.is_empty() {
            return Err(unsafe_rule("empty head".to_string()));
        }
        if definition.head.iter().any(TemplateTriple::has_blank_nodes) {
            return Err(unsafe_rule("blank node in head".to_string()));
        }
        let bound = definition.body.bound_variables();
        for triple in &definition.head {
            if let Some(var) = triple.variables().find(|v| !bound.contains(v)) {
                return Err(unsafe_rule(format!(
                    "?{} does not occur in the body",
                    definition.variables.name(var)
                )));
            }
        }

        Ok(Self {
            name,
            variables: definition.variables,
            head: definition.head,
            body: definition.body,
        })
    }

    /// Parse rule text (without a trailing query)
    pub fn parse(text: &str, prefixes: &PrefixTable) -> RuleResult<Vec<Rule>> {
        let program = SparqlParser::parse_rules(text, prefixes).map_err(RuleError::Syntax)?;
        program
            .rules
            .into_iter()
            .enumerate()
            .map(|(i, definition)| Rule::from_definition(definition, &format!("rule{}", i + 1)))
            .collect()
    }

    /// Same rule under another name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> &[TemplateTriple] {
        &self.head
    }

    pub fn body(&self) -> &GroupPattern {
        &self.body
    }

    /// Every head instantiation over the current store contents
    pub fn fire(&self, store: &TripleStore) -> RuleResult<Vec<Triple>> {
        let rows = SparqlExecutor::new(store)
            .rows(&self.body, self.variables.len())
            .map_err(RuleError::Query)?;
        // Heads are blank-free, so the blank-node callback never runs.
        let mut no_blank = |label: &str| -> RdfTerm { Literal::new_simple_literal(label).into() };
        let mut derived = Vec::new();
        for row in &rows {
            for template in &self.head {
                if let Some(triple) = instantiate_template(template, row.as_slice(), &mut no_blank) {
                    derived.push(triple);
                }
            }
        }
        Ok(derived)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} head triples, {} body patterns)",
            self.name,
            self.head.len(),
            self.body.patterns.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::NamedNode;

    fn prefixes() -> PrefixTable {
        let mut table = PrefixTable::new();
        table.register("ex", "http://example.org/");
        table
    }

    fn iri(s: &str) -> RdfTerm {
        NamedNode::new(&format!("http://example.org/{}", s))
            .unwrap()
            .into()
    }

    #[test]
    fn test_parse_datalog_rule() {
        let rules = Rule::parse(
            "ex:knows(?x, ?z) :- ex:knows(?x, ?y), ex:knows(?y, ?z).",
            &prefixes(),
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name(), "rule1");
        assert_eq!(rules[0].head().len(), 1);
        assert_eq!(rules[0].body().patterns.len(), 2);
    }

    #[test]
    fn test_parse_construct_rule() {
        let rules = Rule::parse(
            "RULE :Adult :- CONSTRUCT { ?p a ex:Adult } WHERE { ?p ex:age ?a FILTER(?a >= 18) }",
            &prefixes(),
        )
        .unwrap();
        assert_eq!(rules[0].name(), ":Adult");
        assert_eq!(rules[0].body().filters.len(), 1);
    }

    #[test]
    fn test_head_variable_must_be_bound() {
        let err = Rule::parse("ex:p(?x, ?w) :- ex:q(?x, ?y).", &prefixes()).unwrap_err();
        assert!(matches!(err, RuleError::UnsafeRule { .. }));
    }

    #[test]
    fn test_fire_instantiates_head() {
        let mut store = TripleStore::new();
        for (s, o) in [("a", "b"), ("b", "c")] {
            store.add(&Triple::from_terms(iri(s), iri("knows"), iri(o)).unwrap());
        }
        let rules = Rule::parse(
            "ex:knows(?x, ?z) :- ex:knows(?x, ?y), ex:knows(?y, ?z).",
            &prefixes(),
        )
        .unwrap();
        let derived = rules[0].fire(&store).unwrap();
        assert_eq!(
            derived,
            vec![Triple::from_terms(iri("a"), iri("knows"), iri("c")).unwrap()]
        );
    }
}
