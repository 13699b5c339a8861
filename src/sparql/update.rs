//! SPARQL Update execution
//!
//! Each operation evaluates its WHERE clause against the store as it was
//! before the operation, instantiates the DELETE and INSERT templates once
//! per solution, then applies every deletion followed by every insertion.
//! Parsing happens before any operation runs, so a malformed request leaves
//! the store untouched.

use super::algebra::{TemplateTriple, UpdateOperation};
use super::executor::{instantiate_template, Row, SparqlExecutor};
use super::parser::SparqlParser;
use super::SparqlResult;
use crate::rdf::{RdfTerm, Triple, TripleStore};
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::{debug, info};

/// Number of triples actually removed and added by an update request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub inserted: usize,
    pub deleted: usize,
}

impl UpdateSummary {
    fn merge(&mut self, other: UpdateSummary) {
        self.inserted += other.inserted;
        self.deleted += other.deleted;
    }
}

impl fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} inserted, {} deleted", self.inserted, self.deleted)
    }
}

/// Update executor holding the store mutably for the duration of a request
pub struct UpdateExecutor<'a> {
    store: &'a mut TripleStore,
}

impl<'a> UpdateExecutor<'a> {
    /// Create a new update executor
    pub fn new(store: &'a mut TripleStore) -> Self {
        Self { store }
    }

    /// Parse and apply an update request
    pub fn execute_str(&mut self, update: &str) -> SparqlResult<UpdateSummary> {
        let operations = SparqlParser::parse_update(update, self.store.prefixes())?;
        self.execute(&operations)
    }

    /// Apply parsed operations in order
    pub fn execute(&mut self, operations: &[UpdateOperation]) -> SparqlResult<UpdateSummary> {
        let mut summary = UpdateSummary::default();
        for operation in operations {
            summary.merge(self.apply(operation)?);
        }
        info!(
            operations = operations.len(),
            inserted = summary.inserted,
            deleted = summary.deleted,
            "update applied"
        );
        Ok(summary)
    }

    fn apply(&mut self, operation: &UpdateOperation) -> SparqlResult<UpdateSummary> {
        let width = operation.variables.len();
        let rows: Vec<Row> = match &operation.pattern {
            Some(pattern) => SparqlExecutor::new(self.store).rows(pattern, width)?,
            None => vec![vec![None; width]],
        };
        debug!("update matched {} solutions", rows.len());

        let mut deletions = Vec::new();
        let mut insertions = Vec::new();
        for row in &rows {
            deletions.extend(self.instantiate(&operation.delete, row));
            insertions.extend(self.instantiate(&operation.insert, row));
        }

        let mut summary = UpdateSummary::default();
        for triple in &deletions {
            if self.store.remove(triple) {
                summary.deleted += 1;
            }
        }
        for triple in &insertions {
            if self.store.add(triple) {
                summary.inserted += 1;
            }
        }
        Ok(summary)
    }

    /// Instantiate templates for one solution; template blank nodes become
    /// fresh store blank nodes shared within the solution
    fn instantiate(&mut self, templates: &[TemplateTriple], row: &Row) -> Vec<Triple> {
        let store = &mut *self.store;
        let mut labels: FxHashMap<String, RdfTerm> = FxHashMap::default();
        let mut blank = |label: &str| -> RdfTerm {
            labels
                .entry(label.to_string())
                .or_insert_with(|| store.fresh_blank_node().into())
                .clone()
        };
        templates
            .iter()
            .filter_map(|t| instantiate_template(t, row.as_slice(), &mut blank))
            .collect()
    }
}
