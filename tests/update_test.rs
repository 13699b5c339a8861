use samyama_rdf::{SparqlDatabase, UpdateSummary};

fn empty() -> SparqlDatabase {
    let mut db = SparqlDatabase::new();
    db.store_mut().register_prefix("ex", "http://example.org/");
    db
}

fn social() -> SparqlDatabase {
    let mut db = empty();
    db.execute_update(
        "PREFIX ex: <http://example.org/>
         INSERT DATA { ex:a ex:knows ex:b . ex:a ex:knows ex:c . ex:b ex:knows ex:c }",
    )
    .unwrap();
    db
}

fn knows(db: &SparqlDatabase) -> Vec<String> {
    db.execute_sparql_query_as_table("SELECT ?x ?y WHERE { ?x ex:knows ?y } ORDER BY ?x ?y")
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r["x"].trim_start_matches("http://example.org/"), r["y"].trim_start_matches("http://example.org/")))
        .collect()
}

#[test]
fn test_delete_with_bound_object_removes_exactly_one_triple() {
    let mut db = social();
    let summary = db
        .execute_update("DELETE { ex:a ex:knows ?o } WHERE { ex:a ex:knows ?o . FILTER(?o = ex:b) }")
        .unwrap();
    assert_eq!(summary, UpdateSummary { inserted: 0, deleted: 1 });
    assert_eq!(knows(&db), vec!["a c", "b c"]);
}

#[test]
fn test_insert_where_sees_pre_update_state() {
    let mut db = social();
    db.execute_update("DELETE { ?x ex:knows ?y } INSERT { ?y ex:knows ?x } WHERE { ?x ex:knows ?y }")
        .unwrap();
    assert_eq!(knows(&db), vec!["b a", "c a", "c b"]);
}

#[test]
fn test_update_sequence_applies_in_order() {
    let mut db = empty();
    let summary = db
        .execute_update(
            "INSERT DATA { ex:a ex:knows ex:b } ;
             INSERT { ?y ex:knows ?x } WHERE { ?x ex:knows ?y } ;
             DELETE WHERE { ex:a ex:knows ?z }",
        )
        .unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.deleted, 1);
    assert_eq!(knows(&db), vec!["b a"]);
}

#[test]
fn test_failed_update_changes_nothing() {
    let mut db = social();
    let before = knows(&db);
    assert!(db
        .execute_update("INSERT DATA { ex:d ex:knows ex:e } ; DELETE WHERE { ex:a ex:knows }")
        .is_err());
    assert!(db.execute_update("INSERT DATA { ex:d ex:knows ?x }").is_err());
    assert_eq!(knows(&db), before);
    assert!(db.handle_update("DELETE DATA {").starts_with("Error:"));
}

#[test]
fn test_handle_update_reports_counts() {
    let mut db = social();
    assert_eq!(
        db.handle_update("DELETE DATA { ex:b ex:knows ex:c }"),
        "Update OK: 0 inserted, 1 deleted"
    );
    assert_eq!(
        db.handle_update("DELETE DATA { ex:b ex:knows ex:c }"),
        "Update OK: 0 inserted, 0 deleted"
    );
}

#[test]
fn test_triple_parts() {
    let mut db = empty();
    assert!(db.add_triple_parts("ex:alice", "foaf:name", "\"Alice\"@en").unwrap());
    assert!(!db.add_triple_parts("ex:alice", "foaf:name", "\"Alice\"@en").unwrap());
    assert!(db.add_triple_parts("ex:alice", "a", "foaf:Person").unwrap());
    assert_eq!(db.store().len(), 2);
    assert!(db.add_triple_parts("\"lit\"", "ex:p", "ex:o").is_err());
    assert!(db.delete_triple_parts("ex:alice", "a", "foaf:Person").unwrap());
    assert_eq!(db.store().len(), 1);
}
