//! Query execution
//!
//! Pattern evaluation runs through the operator pipeline built by the
//! [`QueryPlanner`]. Everything after the join (grouping, aggregates,
//! projection expressions, ordering, DISTINCT and slicing) works on decoded
//! rows indexed by `VarId`.

use super::algebra::{
    Aggregate, AggregateFunction, GroupPattern, OrderCondition, Projection, ProjectionItem,
    Query, QueryForm, TemplateTerm, TemplateTriple,
};
use super::bindings::{Bindings, TermSource, VarId};
use super::expression::{compare_terms, evaluate, integer_term, numeric_term, Value};
use super::parser::SparqlParser;
use super::planner::QueryPlanner;
use super::results::{QuerySolution, SparqlResults};
use super::SparqlResult;
use crate::rdf::{BlankNode, Literal, RdfTerm, Triple, TripleStore};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use tracing::debug;

/// A decoded solution, one slot per variable of the query
pub(crate) type Row = Vec<Option<RdfTerm>>;

/// Query executor over a borrowed store
pub struct SparqlExecutor<'a> {
    store: &'a TripleStore,
    planner: QueryPlanner,
}

impl<'a> SparqlExecutor<'a> {
    /// Create a new executor
    pub fn new(store: &'a TripleStore) -> Self {
        Self {
            store,
            planner: QueryPlanner::new(),
        }
    }

    /// Parse and run a query against the store's prefix table
    pub fn query_str(&self, query: &str) -> SparqlResult<SparqlResults> {
        let query = SparqlParser::parse_query(query, self.store.prefixes())?;
        self.execute(&query)
    }

    /// Run a parsed query
    pub fn execute(&self, query: &Query) -> SparqlResult<SparqlResults> {
        let width = query.variables.len();
        match &query.form {
            QueryForm::Ask => {
                let mut plan = self.planner.plan(&query.pattern, width, self.store);
                let found = plan.root.next(self.store)?.is_some();
                Ok(SparqlResults::Boolean(found))
            }
            QueryForm::Construct { template } => {
                let mut rows = self.rows(&query.pattern, width)?;
                sort_rows(&mut rows, &query.order_by);
                let rows = slice(rows, query.offset, query.limit);
                Ok(SparqlResults::Graph(construct(template, &rows)))
            }
            QueryForm::Select {
                projection,
                distinct,
            } => self.select(query, projection, *distinct),
        }
    }

    /// All binding frames of `pattern`, in discovery order
    pub fn solutions(&self, pattern: &GroupPattern, width: usize) -> SparqlResult<Vec<Bindings>> {
        let mut plan = self.planner.plan(pattern, width, self.store);
        let mut out = Vec::new();
        while let Some(frame) = plan.root.next(self.store)? {
            out.push(frame);
        }
        debug!("pattern produced {} solutions", out.len());
        Ok(out)
    }

    /// Solutions decoded to terms, one slot per variable
    pub(crate) fn rows(&self, pattern: &GroupPattern, width: usize) -> SparqlResult<Vec<Row>> {
        Ok(self
            .solutions(pattern, width)?
            .iter()
            .map(|frame| {
                (0..width)
                    .map(|i| {
                        frame
                            .get(VarId(i))
                            .and_then(|id| self.store.term(id))
                            .cloned()
                    })
                    .collect()
            })
            .collect())
    }

    fn select(
        &self,
        query: &Query,
        projection: &Projection,
        distinct: bool,
    ) -> SparqlResult<SparqlResults> {
        let width = query.variables.len();
        let mut rows = self.rows(&query.pattern, width)?;

        if query.is_aggregated() {
            rows = group(rows, &query.group_keys(), &query.aggregates, width);
        }

        if let Projection::Items(items) = projection {
            for row in rows.iter_mut() {
                for item in items {
                    if let ProjectionItem::Expression { expression, alias } = item {
                        if let Ok(value) = evaluate(expression, row.as_slice()) {
                            row[alias.index()] = Some(value.into_term());
                        }
                    }
                }
            }
        }

        sort_rows(&mut rows, &query.order_by);

        let columns = query.projected_variables(projection);
        let mut projected: Vec<Row> = rows
            .into_iter()
            .map(|row| columns.iter().map(|v| row[v.index()].clone()).collect())
            .collect();

        if distinct {
            let mut seen = FxHashSet::default();
            projected.retain(|row| seen.insert(row.clone()));
        }

        let projected = slice(projected, query.offset, query.limit);
        let variables = query.output_columns();
        let solutions = projected
            .into_iter()
            .map(|row| {
                let mut solution = QuerySolution::new();
                for (name, term) in variables.iter().zip(row) {
                    if let Some(term) = term {
                        solution.bind(name.clone(), term);
                    }
                }
                solution
            })
            .collect();

        Ok(SparqlResults::Bindings {
            variables,
            solutions,
        })
    }
}

fn slice<T>(rows: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let rows = rows.into_iter().skip(offset);
    match limit {
        Some(limit) => rows.take(limit).collect(),
        None => rows.collect(),
    }
}

/// Stable sort on the evaluated order keys; an expression that fails sorts
/// as unbound
fn sort_rows(rows: &mut Vec<Row>, order_by: &[OrderCondition]) {
    if order_by.is_empty() {
        return;
    }
    let mut keyed: Vec<(Vec<Option<RdfTerm>>, Row)> = rows
        .drain(..)
        .map(|row| {
            let keys = order_by
                .iter()
                .map(|c| evaluate(&c.expression, row.as_slice()).ok().map(Value::into_term))
                .collect();
            (keys, row)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        for (condition, (x, y)) in order_by.iter().zip(a.iter().zip(b.iter())) {
            let ordering = compare_terms(x.as_ref(), y.as_ref());
            let ordering = if condition.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    rows.extend(keyed.into_iter().map(|(_, row)| row));
}

/// Collapse rows into one row per group key, with aggregate targets filled in
fn group(rows: Vec<Row>, keys: &[VarId], aggregates: &[Aggregate], width: usize) -> Vec<Row> {
    let mut groups: IndexMap<Vec<Option<RdfTerm>>, Vec<Row>> = IndexMap::new();
    for row in rows {
        let key = keys.iter().map(|k| row[k.index()].clone()).collect();
        groups.entry(key).or_default().push(row);
    }
    // An aggregate over no solutions still yields one row, e.g. COUNT = 0.
    if groups.is_empty() && keys.is_empty() {
        groups.insert(Vec::new(), Vec::new());
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out: Row = vec![None; width];
            for (var, value) in keys.iter().zip(key) {
                out[var.index()] = value;
            }
            for aggregate in aggregates {
                out[aggregate.target.index()] = compute_aggregate(aggregate, &members);
            }
            out
        })
        .collect()
}

fn compute_aggregate(aggregate: &Aggregate, members: &[Row]) -> Option<RdfTerm> {
    let Some(argument) = &aggregate.argument else {
        // COUNT(*)
        let count = if aggregate.distinct {
            members.iter().collect::<FxHashSet<_>>().len()
        } else {
            members.len()
        };
        return Some(Literal::integer(count as i64).into());
    };

    let mut values: Vec<RdfTerm> = members
        .iter()
        .filter_map(|row| evaluate(argument, row.as_slice()).ok().map(Value::into_term))
        .collect();
    if aggregate.distinct {
        let mut seen = FxHashSet::default();
        values.retain(|v| seen.insert(v.clone()));
    }

    match aggregate.function {
        AggregateFunction::Count => Some(Literal::integer(values.len() as i64).into()),
        AggregateFunction::Sum => sum(&values).map(Value::into_term),
        AggregateFunction::Avg => {
            if values.is_empty() {
                return Some(Literal::integer(0).into());
            }
            let total = sum(&values)?;
            let total = match total {
                Value::Integer(i) => i as f64,
                Value::Decimal(d) => d,
                _ => return None,
            };
            Some(Value::Decimal(total / values.len() as f64).into_term())
        }
        AggregateFunction::Min => values
            .into_iter()
            .min_by(|a, b| compare_terms(Some(a), Some(b))),
        AggregateFunction::Max => values
            .into_iter()
            .max_by(|a, b| compare_terms(Some(a), Some(b))),
        AggregateFunction::Sample => values.into_iter().next(),
    }
}

/// Integer sum when every value is an integer, decimal otherwise; `None`
/// when a value is not numeric
fn sum(values: &[RdfTerm]) -> Option<Value> {
    if let Some(integers) = values.iter().map(integer_term).collect::<Option<Vec<i64>>>() {
        let mut total: i64 = 0;
        for value in integers {
            total = total.checked_add(value)?;
        }
        return Some(Value::Integer(total));
    }
    let mut total = 0.0;
    for value in values {
        total += numeric_term(value)?;
    }
    Some(Value::Decimal(total))
}

fn construct(template: &[TemplateTriple], rows: &[Row]) -> Vec<Triple> {
    let mut triples = IndexSet::new();
    let mut counter = 0usize;
    for row in rows {
        let mut labels: FxHashMap<String, RdfTerm> = FxHashMap::default();
        let mut blank = |label: &str| -> RdfTerm {
            labels
                .entry(label.to_string())
                .or_insert_with(|| {
                    counter += 1;
                    match BlankNode::new(&format!("c{}", counter)) {
                        Ok(node) => node.into(),
                        Err(_) => Literal::new_simple_literal(label).into(),
                    }
                })
                .clone()
        };
        for triple in template {
            if let Some(t) = instantiate_template(triple, row.as_slice(), &mut blank) {
                triples.insert(t);
            }
        }
    }
    triples.into_iter().collect()
}

/// Instantiate one template triple under a solution
///
/// `blank` maps a template blank-node label to the term used for this
/// solution. Returns `None` when a variable is unbound or the result is
/// not a well-formed triple (e.g. a literal in subject position).
pub fn instantiate_template<S: TermSource + ?Sized>(
    triple: &TemplateTriple,
    source: &S,
    blank: &mut dyn FnMut(&str) -> RdfTerm,
) -> Option<Triple> {
    let mut term = |t: &TemplateTerm| -> Option<RdfTerm> {
        match t {
            TemplateTerm::Variable(v) => source.term(*v),
            TemplateTerm::Constant(c) => Some(c.clone()),
            TemplateTerm::BlankNode(label) => Some(blank(label)),
        }
    };
    let subject = term(&triple.subject)?;
    let predicate = term(&triple.predicate)?;
    let object = term(&triple.object)?;
    Triple::from_terms(subject, predicate, object).ok()
}
