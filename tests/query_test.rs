use samyama_rdf::{DatabaseError, SparqlDatabase, SparqlError, SparqlResults};

fn social() -> SparqlDatabase {
    let mut db = SparqlDatabase::new();
    db.parse_turtle(
        r#"@prefix ex: <http://example.org/> .
           ex:a ex:knows ex:b ; ex:name "Alice"@en ; ex:age "30" .
           ex:b ex:knows ex:c ; ex:name "Bob" ; ex:age "9" .
           ex:c ex:name "Carol" ; ex:age 41 ; a ex:Person ."#,
    )
    .unwrap();
    db
}

#[test]
fn test_two_hop_rows() {
    let db = social();
    let rows = db
        .execute_sparql_query_as_table("SELECT ?x ?y WHERE { ?x ex:knows ?y } ORDER BY ?x")
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["x"], "http://example.org/a");
    assert_eq!(rows[0]["y"], "http://example.org/b");
    assert_eq!(rows[1]["x"], "http://example.org/b");
    assert_eq!(rows[1]["y"], "http://example.org/c");

    let chain = db
        .execute_sparql_query_as_table("SELECT ?z WHERE { ex:a ex:knows ?y . ?y ex:knows ?z }")
        .unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0]["z"], "http://example.org/c");
}

#[test]
fn test_syntax_error_leaves_store_untouched() {
    let mut db = social();
    let before = db.store().len();
    let err = db.evaluate_query("SELECT ?x WHERE { ?x ex:knows }").unwrap_err();
    assert!(matches!(err, DatabaseError::Sparql(SparqlError::Syntax(_))));
    assert!(db.execute_update("INSERT DATA { ex:z ex:knows ex:y ").is_err());
    assert_eq!(db.store().len(), before);
    assert!(db.handle_query("SELEKT").starts_with("Error:"));
}

#[test]
fn test_unknown_prefix_and_unbound_projection() {
    let db = social();
    assert!(matches!(
        db.evaluate_query("SELECT ?x WHERE { ?x nope:knows ?y }"),
        Err(DatabaseError::Sparql(SparqlError::UnknownPrefix(_)))
    ));
    assert!(matches!(
        db.evaluate_query("SELECT ?w WHERE { ?x ex:knows ?y }"),
        Err(DatabaseError::Sparql(SparqlError::UnboundVariableInProjection(_)))
    ));
}

#[test]
fn test_query_prefix_shadows_registered_prefix() {
    let mut db = social();
    db.add_triple_parts("<http://other.org/a>", "<http://other.org/knows>", "<http://other.org/b>")
        .unwrap();
    let rows = db
        .execute_sparql_query_as_table(
            "PREFIX ex: <http://other.org/> SELECT ?y WHERE { ex:a ex:knows ?y }",
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["y"], "http://other.org/b");

    // the shadowing declaration is not persisted
    let rows = db
        .execute_sparql_query_as_table("SELECT ?y WHERE { ex:a ex:knows ?y }")
        .unwrap();
    assert_eq!(rows[0]["y"], "http://example.org/b");
}

#[test]
fn test_filters_and_builtins() {
    let db = social();
    let rows = db
        .execute_sparql_query_as_table(
            "SELECT ?n WHERE { ?p ex:name ?n FILTER(LANG(?n) = \"en\") }",
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"], "Alice");

    let rows = db
        .execute_sparql_query_as_table(
            "SELECT ?n WHERE { ?p ex:name ?n FILTER(REGEX(?n, \"^[BC]\")) } ORDER BY ?n",
        )
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r["n"].as_str()).collect();
    assert_eq!(names, vec!["Bob", "Carol"]);

    let rows = db
        .execute_sparql_query_as_table(
            "SELECT ?p WHERE { ?p ex:name ?n FILTER(CONTAINS(UCASE(?n), \"CAR\") && isIRI(?p)) }",
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["p"], "http://example.org/c");
}

#[test]
fn test_untyped_numbers_compare_numerically() {
    let db = social();
    let rows = db
        .execute_sparql_query_as_table(
            "SELECT ?p WHERE { ?p ex:age ?age FILTER(?age > 10) } ORDER BY ?p",
        )
        .unwrap();
    let people: Vec<&str> = rows.iter().map(|r| r["p"].as_str()).collect();
    assert_eq!(people, vec!["http://example.org/a", "http://example.org/c"]);

    let rows = db
        .execute_sparql_query_as_table("SELECT ?age WHERE { ?p ex:age ?age } ORDER BY DESC(?age)")
        .unwrap();
    let ages: Vec<&str> = rows.iter().map(|r| r["age"].as_str()).collect();
    assert_eq!(ages, vec!["41", "30", "9"]);
}

#[test]
fn test_ask_and_construct() {
    let db = social();
    assert_eq!(
        db.evaluate_query("ASK { ex:a ex:knows ex:b }").unwrap(),
        SparqlResults::Boolean(true)
    );
    assert_eq!(
        db.evaluate_query("ASK { ex:c ex:knows ?x }").unwrap(),
        SparqlResults::Boolean(false)
    );

    let graph = db
        .evaluate_query("CONSTRUCT { ?y ex:knownBy ?x } WHERE { ?x ex:knows ?y }")
        .unwrap();
    let rows = graph.to_table();
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|r| r["predicate"] == "http://example.org/knownBy"));
}

#[test]
fn test_group_by_with_aggregates() {
    let mut db = SparqlDatabase::new();
    db.parse_turtle(
        "@prefix ex: <http://example.org/> .
         ex:s1 ex:dept ex:sales ; ex:salary 10 .
         ex:s2 ex:dept ex:sales ; ex:salary 20 .
         ex:e1 ex:dept ex:eng ; ex:salary 50 .",
    )
    .unwrap();
    let rows = db
        .execute_sparql_query_as_table(
            "SELECT ?d (COUNT(?s) AS ?n) (SUM(?pay) AS ?total) WHERE { ?s ex:dept ?d ; ex:salary ?pay } GROUP BY ?d ORDER BY ?d",
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["d"], "http://example.org/eng");
    assert_eq!(rows[0]["n"], "1");
    assert_eq!(rows[0]["total"], "50");
    assert_eq!(rows[1]["d"], "http://example.org/sales");
    assert_eq!(rows[1]["n"], "2");
    assert_eq!(rows[1]["total"], "30");

    let rows = db
        .execute_sparql_query_as_table("SELECT (COUNT(*) AS ?n) WHERE { ?s ex:missing ?o }")
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"], "0");
}

#[test]
fn test_distinct_limit_offset() {
    let db = social();
    let rows = db
        .execute_sparql_query_as_table("SELECT DISTINCT ?p WHERE { ?s ?p ?o } ORDER BY ?p")
        .unwrap();
    assert_eq!(rows.len(), 4);

    let rows = db
        .execute_sparql_query_as_table(
            "SELECT DISTINCT ?p WHERE { ?s ?p ?o } ORDER BY ?p LIMIT 2 OFFSET 1",
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["p"], "http://example.org/knows");
    assert_eq!(rows[1]["p"], "http://example.org/name");
}
