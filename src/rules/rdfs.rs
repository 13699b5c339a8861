//! RDFS entailment as ordinary rules
//!
//! Each entailment is a Datalog rule over the `rdf:` and `rdfs:` vocabulary,
//! so it runs through the same engine as user rules.

use super::{Rule, RuleError, RuleResult};
use crate::rdf::{PrefixTable, RDF_NS};
use crate::sparql::SparqlError;

const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// RDFS inference rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceRule {
    /// rdfs:subClassOf transitivity
    SubClassOfTransitive,

    /// rdfs:subPropertyOf transitivity
    SubPropertyOfTransitive,

    /// (P subPropertyOf Q) ∧ (X P Y) → (X Q Y)
    PropertyInheritance,

    /// rdfs:domain inference
    DomainInference,

    /// rdfs:range inference
    RangeInference,

    /// rdf:type inheritance via rdfs:subClassOf
    TypeInheritance,
}

impl InferenceRule {
    pub const ALL: [InferenceRule; 6] = [
        InferenceRule::SubClassOfTransitive,
        InferenceRule::SubPropertyOfTransitive,
        InferenceRule::PropertyInheritance,
        InferenceRule::DomainInference,
        InferenceRule::RangeInference,
        InferenceRule::TypeInheritance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InferenceRule::SubClassOfTransitive => "rdfs11",
            InferenceRule::SubPropertyOfTransitive => "rdfs5",
            InferenceRule::PropertyInheritance => "rdfs7",
            InferenceRule::DomainInference => "rdfs2",
            InferenceRule::RangeInference => "rdfs3",
            InferenceRule::TypeInheritance => "rdfs9",
        }
    }

    /// Datalog text of the rule
    pub fn text(self) -> &'static str {
        match self {
            InferenceRule::SubClassOfTransitive => {
                "rdfs:subClassOf(?a, ?c) :- rdfs:subClassOf(?a, ?b), rdfs:subClassOf(?b, ?c)."
            }
            InferenceRule::SubPropertyOfTransitive => {
                "rdfs:subPropertyOf(?p, ?r) :- rdfs:subPropertyOf(?p, ?q), rdfs:subPropertyOf(?q, ?r)."
            }
            InferenceRule::PropertyInheritance => {
                "?q(?x, ?y) :- rdfs:subPropertyOf(?p, ?q), ?p(?x, ?y)."
            }
            InferenceRule::DomainInference => "rdf:type(?x, ?c) :- rdfs:domain(?p, ?c), ?p(?x, ?y).",
            InferenceRule::RangeInference => "rdf:type(?y, ?c) :- rdfs:range(?p, ?c), ?p(?x, ?y).",
            InferenceRule::TypeInheritance => {
                "rdf:type(?x, ?b) :- rdf:type(?x, ?a), rdfs:subClassOf(?a, ?b)."
            }
        }
    }

    /// Compile into an engine rule
    pub fn to_rule(self) -> RuleResult<Rule> {
        let mut prefixes = PrefixTable::new();
        prefixes.register("rdf", RDF_NS);
        prefixes.register("rdfs", RDFS_NS);
        Rule::parse(self.text(), &prefixes)?
            .into_iter()
            .next()
            .map(|rule| rule.renamed(self.name()))
            .ok_or_else(|| RuleError::Syntax(SparqlError::Syntax("empty rule text".to_string())))
    }

    /// Compile a selection of entailment rules
    pub fn compile(selection: &[InferenceRule]) -> RuleResult<Vec<Rule>> {
        selection.iter().map(|r| r.to_rule()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{NamedNode, RdfTerm, Triple, TripleStore, RDF_TYPE};
    use crate::rules::RuleEngine;

    fn iri(s: &str) -> RdfTerm {
        NamedNode::new(s).unwrap().into()
    }

    fn ex(s: &str) -> RdfTerm {
        iri(&format!("http://example.org/{}", s))
    }

    fn rdfs(s: &str) -> RdfTerm {
        iri(&format!("{}{}", RDFS_NS, s))
    }

    #[test]
    fn test_all_rules_compile() {
        let rules = InferenceRule::compile(&InferenceRule::ALL).unwrap();
        assert_eq!(rules.len(), 6);
        assert_eq!(rules[0].name(), "rdfs11");
    }

    #[test]
    fn test_rdfs_materialization() {
        let mut store = TripleStore::new();
        let facts = [
            (ex("Student"), rdfs("subClassOf"), ex("Person")),
            (ex("Person"), rdfs("subClassOf"), ex("Agent")),
            (ex("teaches"), rdfs("domain"), ex("Teacher")),
            (ex("teaches"), rdfs("range"), ex("Course")),
            (ex("lectures"), rdfs("subPropertyOf"), ex("teaches")),
            (ex("ann"), iri(RDF_TYPE), ex("Student")),
            (ex("bob"), ex("lectures"), ex("math")),
        ];
        for (s, p, o) in facts {
            store.add(&Triple::from_terms(s, p, o).unwrap());
        }

        let mut engine = RuleEngine::new();
        engine.add_rules(InferenceRule::compile(&InferenceRule::ALL).unwrap());
        let report = engine.run(&mut store).unwrap();
        assert!(report.fixpoint_reached);

        let holds = |s: RdfTerm, p: RdfTerm, o: RdfTerm| store.contains(&Triple::from_terms(s, p, o).unwrap());
        assert!(holds(ex("Student"), rdfs("subClassOf"), ex("Agent")));
        assert!(holds(ex("ann"), iri(RDF_TYPE), ex("Agent")));
        assert!(holds(ex("bob"), ex("teaches"), ex("math")));
        assert!(holds(ex("bob"), iri(RDF_TYPE), ex("Teacher")));
        assert!(holds(ex("math"), iri(RDF_TYPE), ex("Course")));
    }
}
