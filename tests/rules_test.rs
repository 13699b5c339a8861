use samyama_rdf::rdf::TripleStore;
use samyama_rdf::{
    DatabaseConfig, DatabaseError, InferenceRule, Rule, RuleEngine, RuleError, SparqlDatabase,
    SparqlResults,
};

const TRANSITIVE: &str = "ex:knows(?x, ?z) :- ex:knows(?x, ?y), ex:knows(?y, ?z).";

fn chain(db: &mut SparqlDatabase, length: usize) {
    db.store_mut().register_prefix("ex", "http://example.org/");
    for i in 0..length {
        db.add_triple_parts(&format!("ex:n{}", i), "ex:knows", &format!("ex:n{}", i + 1))
            .unwrap();
    }
}

#[test]
fn test_transitive_rule_reaches_fixpoint() {
    let mut db = SparqlDatabase::new();
    chain(&mut db, 2);

    let outcome = db.process_rule_definition(TRANSITIVE).unwrap();
    assert_eq!(outcome.rules_added, 1);
    assert_eq!(outcome.report.derived, 1);
    assert!(outcome.report.fixpoint_reached);
    assert!(outcome.results.is_none());
    assert_eq!(
        db.evaluate_query("ASK { ex:n0 ex:knows ex:n2 }").unwrap(),
        SparqlResults::Boolean(true)
    );

    let again = db.infer().unwrap();
    assert_eq!(again.derived, 0);
    assert_eq!(again.passes, 1);
}

#[test]
fn test_rule_program_with_trailing_query() {
    let mut db = SparqlDatabase::new();
    chain(&mut db, 4);
    let outcome = db
        .process_rule_definition(&format!(
            "{} SELECT ?y WHERE {{ ex:n0 ex:knows ?y }} ORDER BY ?y",
            TRANSITIVE
        ))
        .unwrap();
    assert_eq!(outcome.report.derived, 6);
    let results = outcome.results.unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results.to_table()[3]["y"], "http://example.org/n4");
}

#[test]
fn test_construct_rule_with_filter() {
    let mut db = SparqlDatabase::new();
    db.parse_turtle(
        "@prefix ex: <http://example.org/> .
         ex:ann ex:age 34 . ex:ben ex:age 12 . ex:cal ex:age \"18\" .",
    )
    .unwrap();
    db.process_rule_definition(
        "RULE ex:adult :- CONSTRUCT { ?p a ex:Adult } WHERE { ?p ex:age ?a FILTER(?a >= 18) }",
    )
    .unwrap();
    let rows = db
        .execute_sparql_query_as_table("SELECT ?p WHERE { ?p a ex:Adult } ORDER BY ?p")
        .unwrap();
    let adults: Vec<&str> = rows.iter().map(|r| r["p"].as_str()).collect();
    assert_eq!(adults, vec!["http://example.org/ann", "http://example.org/cal"]);
    assert_eq!(db.rules().rules()[0].name(), "ex:adult");
}

#[test]
fn test_rdfs_entailment() {
    let mut db = SparqlDatabase::new();
    db.parse_turtle(
        "@prefix ex: <http://example.org/> .
         @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
         ex:Student rdfs:subClassOf ex:Person .
         ex:Person rdfs:subClassOf ex:Agent .
         ex:advisor rdfs:subPropertyOf ex:knows .
         ex:knows rdfs:domain ex:Person ; rdfs:range ex:Person .
         ex:sam a ex:Student ; ex:advisor ex:pat .",
    )
    .unwrap();
    assert_eq!(db.install_rdfs_rules().unwrap(), InferenceRule::ALL.len());
    let report = db.infer().unwrap();
    assert!(report.fixpoint_reached);

    let ask = |db: &SparqlDatabase, q: &str| db.evaluate_query(q).unwrap() == SparqlResults::Boolean(true);
    assert!(ask(&db, "ASK { ex:Student rdfs:subClassOf ex:Agent }"));
    assert!(ask(&db, "ASK { ex:sam ex:knows ex:pat }"));
    assert!(ask(&db, "ASK { ex:pat a ex:Person }"));
    assert!(ask(&db, "ASK { ex:pat a ex:Agent }"));
    assert!(ask(&db, "ASK { ex:sam a ex:Agent }"));
}

#[test]
fn test_iteration_cap_is_reported() {
    let config = DatabaseConfig {
        max_rule_iterations: 1,
        ..DatabaseConfig::default()
    };
    let mut db = SparqlDatabase::with_config(config);
    chain(&mut db, 3);
    let outcome = db.process_rule_definition(TRANSITIVE).unwrap();
    assert!(!outcome.report.fixpoint_reached);
    assert_eq!(outcome.report.passes, 1);
    assert_eq!(outcome.report.derived, 2);
    assert!(matches!(
        outcome.report.into_result(),
        Err(RuleError::FixpointNotReached { passes: 1, derived: 2 })
    ));
}

#[test]
fn test_rejected_rules() {
    let mut db = SparqlDatabase::new();
    db.store_mut().register_prefix("ex", "http://example.org/");
    assert!(matches!(
        db.process_rule_definition("ex:p(?x, ?w) :- ex:q(?x, ?y)."),
        Err(DatabaseError::Rule(RuleError::UnsafeRule { .. }))
    ));
    assert!(matches!(
        db.process_rule_definition("ex:p(?x, ?y) :- ex:q(?x, ?y"),
        Err(DatabaseError::Rule(RuleError::Syntax(_)))
    ));
    assert!(db.rules().is_empty());
}

#[test]
fn test_engine_on_plain_store() {
    let mut store = TripleStore::new();
    let mut prefixes = store.prefixes().clone();
    prefixes.register("ex", "http://example.org/");
    let rules = Rule::parse(
        "ex:sibling(?b, ?a) :- ex:sibling(?a, ?b).",
        &prefixes,
    )
    .unwrap();
    let mut engine = RuleEngine::new();
    engine.add_rules(rules);

    store.register_prefix("ex", "http://example.org/");
    samyama_rdf::sparql::UpdateExecutor::new(&mut store)
        .execute_str("INSERT DATA { ex:x ex:sibling ex:y }")
        .unwrap();
    let report = engine.run(&mut store).unwrap();
    assert_eq!(report.derived, 1);
    assert_eq!(report.passes, 2);
    assert_eq!(store.len(), 2);
}
