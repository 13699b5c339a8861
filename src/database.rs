//! The embeddable database facade
//!
//! [`SparqlDatabase`] owns one triple store, its prefix table and a rule
//! engine, and exposes the operations an embedding application needs:
//! loading documents, adding and deleting triples from text, SPARQL queries
//! and updates, rules and request dispatch.
//!
//! `handle_*` methods never fail; errors are rendered into the returned text.
//! Everything else returns a [`DatabaseResult`].

use crate::config::{ConfigError, DatabaseConfig};
use crate::rdf::{
    parse_term, ParseError, Position, PrefixError, RdfError, RdfFormat, RdfParser,
    RdfSerializer, SerializeError, Triple, TripleStore, COMMON_PREFIXES,
};
use crate::rules::{InferenceReport, InferenceRule, Rule, RuleEngine, RuleError};
use crate::sparql::{
    RequestHandler, SparqlError, SparqlExecutor, SparqlHttpEndpoint, SparqlParser,
    SparqlResults, UpdateExecutor, UpdateSummary,
};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Sparql(#[from] SparqlError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Prefix(#[from] PrefixError),

    #[error(transparent)]
    Term(#[from] RdfError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// What a rule definition did
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Rules added by the definition
    pub rules_added: usize,
    /// The inference run that followed
    pub report: InferenceReport,
    /// Result of the trailing query, if the definition had one
    pub results: Option<SparqlResults>,
}

/// In-memory RDF database
pub struct SparqlDatabase {
    store: TripleStore,
    rules: RuleEngine,
    config: DatabaseConfig,
}

impl SparqlDatabase {
    /// Create a new database with the default configuration
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    /// Create a new database from a configuration
    pub fn with_config(config: DatabaseConfig) -> Self {
        let mut store = TripleStore::with_index_orders(&config.index_orders);
        if config.default_prefixes {
            for (prefix, iri) in COMMON_PREFIXES {
                store.register_prefix(prefix, iri);
            }
        }
        for (prefix, iri) in &config.prefixes {
            store.register_prefix(prefix.clone(), iri.clone());
        }
        info!(
            "Created database ({} indices, {} prefixes)",
            store.indices().orders().len(),
            store.prefixes().len()
        );
        Self {
            store,
            rules: RuleEngine::with_max_iterations(config.max_rule_iterations),
            config,
        }
    }

    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TripleStore {
        &mut self.store
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Triples from text
    // ------------------------------------------------------------------

    fn triple_from_parts(&self, subject: &str, predicate: &str, object: &str) -> DatabaseResult<Triple> {
        let prefixes = self.store.prefixes();
        let s = parse_term(subject, Position::Subject, prefixes)?;
        let p = parse_term(predicate, Position::Predicate, prefixes)?;
        let o = parse_term(object, Position::Object, prefixes)?;
        Ok(Triple::from_terms(s, p, o)?)
    }

    /// Add a triple written as three terms, e.g. `ex:alice`, `foaf:name`,
    /// `"Alice"@en`. Returns false if it was already present.
    pub fn add_triple_parts(&mut self, subject: &str, predicate: &str, object: &str) -> DatabaseResult<bool> {
        let triple = self.triple_from_parts(subject, predicate, object)?;
        Ok(self.store.add(&triple))
    }

    /// Delete a triple written as three terms. Returns false if it was absent.
    pub fn delete_triple_parts(&mut self, subject: &str, predicate: &str, object: &str) -> DatabaseResult<bool> {
        let triple = self.triple_from_parts(subject, predicate, object)?;
        Ok(self.store.remove(&triple))
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Load a document in any supported format; returns the number of new
    /// triples. Nothing is added when the document fails to parse.
    pub fn load_document(&mut self, document: &str, format: RdfFormat) -> DatabaseResult<usize> {
        let parsed = RdfParser::parse(document, format, self.store.prefixes())?;
        Ok(parsed.load_into(&mut self.store))
    }

    /// Load a Turtle document; returns the number of new triples
    pub fn parse_turtle(&mut self, document: &str) -> DatabaseResult<usize> {
        self.load_document(document, RdfFormat::Turtle)
    }

    /// Load the Turtle-compatible subset of N3
    pub fn parse_n3(&mut self, document: &str) -> DatabaseResult<usize> {
        self.load_document(document, RdfFormat::N3)
    }

    /// Load an RDF/XML document
    pub fn parse_rdf(&mut self, document: &str) -> DatabaseResult<usize> {
        self.load_document(document, RdfFormat::RdfXml)
    }

    /// Load an RDF/XML document with the lenient `rdf:Description` reader
    pub fn parse_rdf_simple(&mut self, document: &str) -> DatabaseResult<usize> {
        self.load_document(document, RdfFormat::SimpleRdfXml)
    }

    pub fn generate_rdf_xml(&self) -> DatabaseResult<String> {
        Ok(RdfSerializer::serialize_store(&self.store, RdfFormat::RdfXml)?)
    }

    pub fn generate_turtle(&self) -> DatabaseResult<String> {
        Ok(RdfSerializer::serialize_store(&self.store, RdfFormat::Turtle)?)
    }

    /// Finish a bulk load started on the store
    pub fn build_all_indexes(&mut self) {
        self.store.build_all_indexes();
    }

    /// Log every stored triple
    pub fn debug_print_triples(&self) {
        for triple in self.store.iter() {
            info!(
                "Stored Triple -> Subject: {}, Predicate: {}, Object: {}",
                triple.subject, triple.predicate, triple.object
            );
        }
    }

    // ------------------------------------------------------------------
    // Queries and updates
    // ------------------------------------------------------------------

    /// Persist the PREFIX declarations at the start of `query`; returns how
    /// many were registered
    pub fn register_prefixes_from_query(&mut self, query: &str) -> DatabaseResult<usize> {
        let prefixes = SparqlParser::parse_prologue(query)?;
        for (prefix, iri) in &prefixes {
            debug!("Registering prefix {}: <{}>", prefix, iri);
            self.store.register_prefix(prefix.clone(), iri.clone());
        }
        Ok(prefixes.len())
    }

    /// Run a query and return its structured results
    pub fn evaluate_query(&self, query: &str) -> DatabaseResult<SparqlResults> {
        Ok(SparqlExecutor::new(&self.store).query_str(query)?)
    }

    /// Run a query and render it in the configured result format
    pub fn execute_sparql_query(&self, query: &str) -> DatabaseResult<String> {
        let results = self.evaluate_query(query)?;
        Ok(results.serialize(self.config.result_format, self.store.prefixes())?)
    }

    /// Run a query and return rows as ordered maps of variable to term text
    pub fn execute_sparql_query_as_table(&self, query: &str) -> DatabaseResult<Vec<IndexMap<String, String>>> {
        Ok(self.evaluate_query(query)?.to_table())
    }

    /// Apply an update request atomically
    pub fn execute_update(&mut self, update: &str) -> DatabaseResult<UpdateSummary> {
        Ok(UpdateExecutor::new(&mut self.store).execute_str(update)?)
    }

    /// Query entry point that renders errors as text
    pub fn handle_query(&self, query: &str) -> String {
        self.execute_sparql_query(query)
            .unwrap_or_else(|e| format!("Error: {}", e))
    }

    /// Update entry point that renders errors as text
    pub fn handle_update(&mut self, update: &str) -> String {
        match self.execute_update(update) {
            Ok(summary) => format!("Update OK: {}", summary),
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Classify and answer a raw HTTP request; returns the framed response
    pub fn handle_http_request(&mut self, request: &str) -> String {
        let endpoint = SparqlHttpEndpoint::with_format(self.config.result_format);
        endpoint.handle(request, self).to_string()
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// Store the rules of `definition`, run the whole rule set to a fixpoint
    /// and answer the trailing query, if any
    pub fn process_rule_definition(&mut self, definition: &str) -> DatabaseResult<RuleOutcome> {
        let program = SparqlParser::parse_rules(definition, self.store.prefixes())
            .map_err(RuleError::Syntax)?;
        let offset = self.rules.len();
        let rules = program
            .rules
            .into_iter()
            .enumerate()
            .map(|(i, d)| Rule::from_definition(d, &format!("rule{}", offset + i + 1)))
            .collect::<Result<Vec<_>, _>>()?;
        let rules_added = rules.len();
        self.rules.add_rules(rules);

        let report = self.infer()?;
        let results = match program.query {
            Some(query) => Some(
                SparqlExecutor::new(&self.store)
                    .execute(&query)
                    .map_err(RuleError::Query)?,
            ),
            None => None,
        };
        Ok(RuleOutcome {
            rules_added,
            report,
            results,
        })
    }

    /// Add the RDFS entailment rules to the rule set
    pub fn install_rdfs_rules(&mut self) -> DatabaseResult<usize> {
        let rules = InferenceRule::compile(&InferenceRule::ALL)?;
        let count = rules.len();
        self.rules.add_rules(rules);
        Ok(count)
    }

    /// Run the stored rules to a fixpoint or the iteration cap
    pub fn infer(&mut self) -> DatabaseResult<InferenceReport> {
        Ok(self.rules.run(&mut self.store)?)
    }
}

impl Default for SparqlDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler for SparqlDatabase {
    fn query(&mut self, query: &str) -> Result<String, String> {
        self.execute_sparql_query(query).map_err(|e| e.to_string())
    }

    fn update(&mut self, update: &str) -> Result<String, String> {
        self.execute_update(update)
            .map(|summary| format!("Update OK: {}", summary))
            .map_err(|e| e.to_string())
    }
}
