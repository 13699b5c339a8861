use samyama_rdf::sparql::HttpRequest;
use samyama_rdf::{DatabaseConfig, ResultFormat, SparqlDatabase};

fn database(format: ResultFormat) -> SparqlDatabase {
    let mut config = DatabaseConfig {
        result_format: format,
        ..DatabaseConfig::default()
    };
    config
        .prefixes
        .insert("ex".to_string(), "http://example.org/".to_string());
    let mut db = SparqlDatabase::with_config(config);
    db.execute_update("INSERT DATA { ex:a ex:knows ex:b }").unwrap();
    db
}

#[test]
fn test_get_query_returns_json() {
    let mut db = database(ResultFormat::Json);
    let response = db.handle_http_request(&HttpRequest::get("SELECT ?o WHERE { ex:a ex:knows ?o }"));
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: application/sparql-results+json"));
    assert!(response.contains("\"value\": \"http://example.org/b\""));
}

#[test]
fn test_post_update_then_query() {
    let mut db = database(ResultFormat::Csv);
    let response = db.handle_http_request(&HttpRequest::post(
        "application/sparql-update",
        "INSERT DATA { ex:b ex:knows ex:c }",
    ));
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("Update OK: 1 inserted, 0 deleted"));
    assert_eq!(db.store().len(), 2);

    let response = db.handle_http_request(&HttpRequest::post(
        "application/x-www-form-urlencoded",
        "query=SELECT+%3Fx+WHERE+%7B+%3Fx+ex%3Aknows+ex%3Ac+%7D",
    ));
    assert!(response.contains("Content-Type: text/csv"));
    assert!(response.contains("http://example.org/b"));
}

#[test]
fn test_bad_requests() {
    let mut db = database(ResultFormat::Text);
    let response = db.handle_http_request("DELETE /sparql HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 405"));

    let response = db.handle_http_request(&HttpRequest::post("text/plain", "SELECT * WHERE { ?s ?p ?o }"));
    assert!(response.starts_with("HTTP/1.1 415"));

    let response = db.handle_http_request("GET /sparql HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400"));

    let response = db.handle_http_request(&HttpRequest::get("SELECT ?x WHERE {"));
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.contains("Syntax error"));
    assert_eq!(db.store().len(), 1);
}
