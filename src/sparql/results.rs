//! SPARQL query results and their textual encodings
//!
//! Supported encodings:
//! - `text`: a human-readable table with IRIs compacted through the prefix table
//! - `json`: SPARQL 1.1 Query Results JSON
//! - `xml`: SPARQL Query Results XML (RDF/XML for CONSTRUCT results)
//! - `csv` / `tsv`: SPARQL 1.1 CSV and TSV results

use crate::rdf::{
    PrefixTable, RdfFormat, RdfSerializer, RdfTerm, SerializeError, SerializeResult, Triple,
    XSD_STRING,
};
use comfy_table::{ContentArrangement, Table};
use indexmap::IndexMap;
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

/// SPARQL result format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// Aligned text table
    #[default]
    Text,
    /// JSON results
    Json,
    /// XML results
    Xml,
    /// CSV results
    Csv,
    /// TSV results
    Tsv,
}

impl FromStr for ResultFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "table" => Ok(ResultFormat::Text),
            "json" => Ok(ResultFormat::Json),
            "xml" => Ok(ResultFormat::Xml),
            "csv" => Ok(ResultFormat::Csv),
            "tsv" => Ok(ResultFormat::Tsv),
            other => Err(format!("unknown result format '{}'", other)),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultFormat::Text => "text",
            ResultFormat::Json => "json",
            ResultFormat::Xml => "xml",
            ResultFormat::Csv => "csv",
            ResultFormat::Tsv => "tsv",
        };
        f.write_str(name)
    }
}

/// Query solution (variable bindings)
///
/// Unbound variables are absent from the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySolution {
    /// Variable name → RDF term bindings, in projection order
    pub bindings: IndexMap<String, RdfTerm>,
}

impl QuerySolution {
    /// Create a new query solution
    pub fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// Get a binding
    pub fn get(&self, variable: &str) -> Option<&RdfTerm> {
        self.bindings.get(variable)
    }

    /// Add a binding
    pub fn bind(&mut self, variable: String, term: RdfTerm) {
        self.bindings.insert(variable, term);
    }
}

impl Default for QuerySolution {
    fn default() -> Self {
        Self::new()
    }
}

/// SPARQL query results
#[derive(Debug, Clone, PartialEq)]
pub enum SparqlResults {
    /// Bindings from SELECT query
    Bindings {
        /// Variables
        variables: Vec<String>,
        /// Solutions
        solutions: Vec<QuerySolution>,
    },

    /// Boolean result from ASK query
    Boolean(bool),

    /// Graph from CONSTRUCT query
    Graph(Vec<Triple>),
}

impl SparqlResults {
    /// Create empty bindings result
    pub fn empty() -> Self {
        SparqlResults::Bindings {
            variables: Vec::new(),
            solutions: Vec::new(),
        }
    }

    /// Number of solutions, or triples for a graph result. An ASK result
    /// counts as one row.
    pub fn len(&self) -> usize {
        match self {
            SparqlResults::Bindings { solutions, .. } => solutions.len(),
            SparqlResults::Boolean(_) => 1,
            SparqlResults::Graph(triples) => triples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Solutions of a SELECT result
    pub fn solutions(&self) -> &[QuerySolution] {
        match self {
            SparqlResults::Bindings { solutions, .. } => solutions,
            _ => &[],
        }
    }

    /// Rows as ordered maps from column name to plain term text
    ///
    /// SELECT rows omit unbound variables, ASK yields one `result` column
    /// and CONSTRUCT yields `subject`/`predicate`/`object` columns.
    pub fn to_table(&self) -> Vec<IndexMap<String, String>> {
        match self {
            SparqlResults::Bindings { variables, solutions } => solutions
                .iter()
                .map(|solution| {
                    variables
                        .iter()
                        .filter_map(|v| {
                            solution
                                .get(v)
                                .map(|term| (v.clone(), term.to_plain_string()))
                        })
                        .collect()
                })
                .collect(),
            SparqlResults::Boolean(value) => {
                let mut row = IndexMap::new();
                row.insert("result".to_string(), value.to_string());
                vec![row]
            }
            SparqlResults::Graph(triples) => triples
                .iter()
                .map(|t| {
                    let mut row = IndexMap::new();
                    row.insert("subject".to_string(), RdfTerm::from(t.subject.clone()).to_plain_string());
                    row.insert("predicate".to_string(), t.predicate.as_str().to_string());
                    row.insert("object".to_string(), RdfTerm::from(t.object.clone()).to_plain_string());
                    row
                })
                .collect(),
        }
    }

    /// Serialize results to string
    pub fn serialize(&self, format: ResultFormat, prefixes: &PrefixTable) -> SerializeResult<String> {
        match format {
            ResultFormat::Text => Ok(self.to_text(prefixes)),
            ResultFormat::Json => serde_json::to_string_pretty(&self.to_json())
                .map_err(|e| SerializeError::Serialize(e.to_string())),
            ResultFormat::Xml => self.to_xml(prefixes),
            ResultFormat::Csv => Ok(self.to_delimited(',')),
            ResultFormat::Tsv => Ok(self.to_delimited('\t')),
        }
    }

    fn to_text(&self, prefixes: &PrefixTable) -> String {
        match self {
            SparqlResults::Bindings { variables, solutions } => {
                if variables.is_empty() {
                    return format!("(no columns)\n{} row(s)", solutions.len());
                }
                let mut table = Table::new();
                table.set_content_arrangement(ContentArrangement::Dynamic);
                table.set_header(variables.iter().map(|v| format!("?{}", v)));
                for solution in solutions {
                    let cells: Vec<String> = variables
                        .iter()
                        .map(|v| solution.get(v).map(|t| compact_term(t, prefixes)).unwrap_or_default())
                        .collect();
                    table.add_row(cells);
                }
                format!("{}\n{} row(s)", table, solutions.len())
            }
            SparqlResults::Boolean(value) => value.to_string(),
            SparqlResults::Graph(triples) => triples
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            SparqlResults::Bindings { variables, solutions } => {
                let bindings: Vec<JsonValue> = solutions
                    .iter()
                    .map(|solution| {
                        let mut row = Map::new();
                        for (name, term) in &solution.bindings {
                            row.insert(name.clone(), term_to_json(term));
                        }
                        JsonValue::Object(row)
                    })
                    .collect();
                json!({
                    "head": { "vars": variables },
                    "results": { "bindings": bindings },
                })
            }
            SparqlResults::Boolean(value) => json!({ "head": {}, "boolean": value }),
            SparqlResults::Graph(triples) => JsonValue::Array(
                triples
                    .iter()
                    .map(|t| {
                        json!({
                            "subject": term_to_json(&RdfTerm::from(t.subject.clone())),
                            "predicate": term_to_json(&RdfTerm::from(t.predicate.clone())),
                            "object": term_to_json(&RdfTerm::from(t.object.clone())),
                        })
                    })
                    .collect(),
            ),
        }
    }

    fn to_xml(&self, prefixes: &PrefixTable) -> SerializeResult<String> {
        let mut out = String::from(
            "<?xml version=\"1.0\"?>\n<sparql xmlns=\"http://www.w3.org/2005/sparql-results#\">\n",
        );
        match self {
            SparqlResults::Bindings { variables, solutions } => {
                out.push_str("  <head>\n");
                for v in variables {
                    out.push_str(&format!("    <variable name=\"{}\"/>\n", escape(v.as_str())));
                }
                out.push_str("  </head>\n  <results>\n");
                for solution in solutions {
                    out.push_str("    <result>\n");
                    for (name, term) in &solution.bindings {
                        out.push_str(&format!(
                            "      <binding name=\"{}\">{}</binding>\n",
                            escape(name.as_str()),
                            term_to_xml(term)
                        ));
                    }
                    out.push_str("    </result>\n");
                }
                out.push_str("  </results>\n");
            }
            SparqlResults::Boolean(value) => {
                out.push_str(&format!("  <head/>\n  <boolean>{}</boolean>\n", value));
            }
            SparqlResults::Graph(triples) => {
                return RdfSerializer::serialize_triples(triples, RdfFormat::RdfXml, prefixes);
            }
        }
        out.push_str("</sparql>\n");
        Ok(out)
    }

    fn to_delimited(&self, separator: char) -> String {
        let tsv = separator == '\t';
        let cell = |term: Option<&RdfTerm>| match term {
            None => String::new(),
            Some(t) if tsv => t.to_string(),
            Some(t) => csv_field(&t.to_plain_string()),
        };

        let mut lines = Vec::new();
        match self {
            SparqlResults::Bindings { variables, solutions } => {
                let header: Vec<String> = variables
                    .iter()
                    .map(|v| if tsv { format!("?{}", v) } else { v.clone() })
                    .collect();
                lines.push(header.join(&separator.to_string()));
                for solution in solutions {
                    let row: Vec<String> = variables.iter().map(|v| cell(solution.get(v))).collect();
                    lines.push(row.join(&separator.to_string()));
                }
            }
            SparqlResults::Boolean(value) => {
                lines.push("result".to_string());
                lines.push(value.to_string());
            }
            SparqlResults::Graph(triples) => {
                lines.push(["subject", "predicate", "object"].join(&separator.to_string()));
                for t in triples {
                    let terms: [RdfTerm; 3] = [
                        t.subject.clone().into(),
                        t.predicate.clone().into(),
                        t.object.clone().into(),
                    ];
                    let row: Vec<String> = terms.iter().map(|term| cell(Some(term))).collect();
                    lines.push(row.join(&separator.to_string()));
                }
            }
        }
        lines.join("\n")
    }
}

/// Render a term for display, compacting IRIs when a prefix matches
pub fn compact_term(term: &RdfTerm, prefixes: &PrefixTable) -> String {
    match term {
        RdfTerm::NamedNode(n) => prefixes
            .compact(n.as_str())
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

fn term_to_json(term: &RdfTerm) -> JsonValue {
    match term {
        RdfTerm::NamedNode(n) => json!({ "type": "uri", "value": n.as_str() }),
        RdfTerm::BlankNode(b) => json!({ "type": "bnode", "value": b.as_str() }),
        RdfTerm::Literal(l) => {
            let mut object = Map::new();
            object.insert("type".into(), json!("literal"));
            object.insert("value".into(), json!(l.value()));
            if let Some(lang) = l.language() {
                object.insert("xml:lang".into(), json!(lang));
            } else if l.datatype() != XSD_STRING {
                object.insert("datatype".into(), json!(l.datatype()));
            }
            JsonValue::Object(object)
        }
    }
}

fn term_to_xml(term: &RdfTerm) -> String {
    match term {
        RdfTerm::NamedNode(n) => format!("<uri>{}</uri>", escape(n.as_str())),
        RdfTerm::BlankNode(b) => format!("<bnode>{}</bnode>", escape(b.as_str())),
        RdfTerm::Literal(l) => {
            let value = escape(l.value());
            if let Some(lang) = l.language() {
                format!("<literal xml:lang=\"{}\">{}</literal>", escape(lang), value)
            } else if l.datatype() != XSD_STRING {
                format!("<literal datatype=\"{}\">{}</literal>", escape(l.datatype()), value)
            } else {
                format!("<literal>{}</literal>", value)
            }
        }
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
