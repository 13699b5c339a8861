//! Compiled forms of queries, updates and rules
//!
//! The parser lowers text straight into these structures; prefixed names are
//! already resolved and every variable is a [`VarId`] in the owning
//! [`VariableTable`].

use super::bindings::{VarId, VariableTable};
use crate::rdf::RdfTerm;
use std::collections::BTreeSet;

/// One position of a WHERE pattern
#[derive(Debug, Clone, PartialEq)]
pub enum PatternTerm {
    Variable(VarId),
    Constant(RdfTerm),
}

impl PatternTerm {
    pub fn as_variable(&self) -> Option<VarId> {
        match self {
            PatternTerm::Variable(v) => Some(*v),
            PatternTerm::Constant(_) => None,
        }
    }
}

impl From<RdfTerm> for PatternTerm {
    fn from(term: RdfTerm) -> Self {
        PatternTerm::Constant(term)
    }
}

/// A triple pattern with variables
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTriple {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl PatternTriple {
    pub fn terms(&self) -> [&PatternTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Variables of this pattern, each once
    pub fn variables(&self) -> BTreeSet<VarId> {
        self.terms()
            .iter()
            .filter_map(|t| t.as_variable())
            .collect()
    }
}

/// One position of a CONSTRUCT / INSERT / DELETE / rule-head template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateTerm {
    Variable(VarId),
    Constant(RdfTerm),
    /// Template blank node; a fresh node is minted per instantiation
    BlankNode(String),
}

impl From<RdfTerm> for TemplateTerm {
    fn from(term: RdfTerm) -> Self {
        TemplateTerm::Constant(term)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateTriple {
    pub subject: TemplateTerm,
    pub predicate: TemplateTerm,
    pub object: TemplateTerm,
}

impl TemplateTriple {
    pub fn terms(&self) -> [&TemplateTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms().into_iter().filter_map(|t| match t {
            TemplateTerm::Variable(v) => Some(*v),
            _ => None,
        })
    }

    pub fn has_blank_nodes(&self) -> bool {
        self.terms()
            .iter()
            .any(|t| matches!(t, TemplateTerm::BlankNode(_)))
    }
}

impl From<PatternTriple> for TemplateTriple {
    fn from(pattern: PatternTriple) -> Self {
        let convert = |term: PatternTerm| match term {
            PatternTerm::Variable(v) => TemplateTerm::Variable(v),
            PatternTerm::Constant(c) => TemplateTerm::Constant(c),
        };
        Self {
            subject: convert(pattern.subject),
            predicate: convert(pattern.predicate),
            object: convert(pattern.object),
        }
    }
}

/// Basic graph pattern plus its filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupPattern {
    pub patterns: Vec<PatternTriple>,
    pub filters: Vec<Expression>,
}

impl GroupPattern {
    /// Variables that some triple pattern can bind
    pub fn bound_variables(&self) -> BTreeSet<VarId> {
        self.patterns.iter().flat_map(|p| p.variables()).collect()
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

/// Builtin functions usable in FILTER and projection expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Bound,
    IsIri,
    IsLiteral,
    IsBlank,
    Str,
    Lang,
    Datatype,
    Regex,
    Contains,
    StrStarts,
    StrEnds,
    StrLen,
    UCase,
    LCase,
}

impl Builtin {
    /// Look up a builtin by its case-insensitive keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let builtin = match keyword.to_ascii_uppercase().as_str() {
            "BOUND" => Builtin::Bound,
            "ISIRI" | "ISURI" => Builtin::IsIri,
            "ISLITERAL" => Builtin::IsLiteral,
            "ISBLANK" => Builtin::IsBlank,
            "STR" => Builtin::Str,
            "LANG" => Builtin::Lang,
            "DATATYPE" => Builtin::Datatype,
            "REGEX" => Builtin::Regex,
            "CONTAINS" => Builtin::Contains,
            "STRSTARTS" => Builtin::StrStarts,
            "STRENDS" => Builtin::StrEnds,
            "STRLEN" => Builtin::StrLen,
            "UCASE" => Builtin::UCase,
            "LCASE" => Builtin::LCase,
            _ => return None,
        };
        Some(builtin)
    }

    /// Accepted argument counts (inclusive)
    pub fn arity(self) -> (usize, usize) {
        match self {
            Builtin::Regex => (2, 3),
            Builtin::Contains | Builtin::StrStarts | Builtin::StrEnds => (2, 2),
            _ => (1, 1),
        }
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(VarId),
    Constant(RdfTerm),
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    Function {
        function: Builtin,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Collect every variable the expression reads
    pub fn collect_variables(&self, out: &mut BTreeSet<VarId>) {
        match self {
            Expression::Variable(v) => {
                out.insert(*v);
            }
            Expression::Constant(_) => {}
            Expression::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expression::Unary { expr, .. } => expr.collect_variables(out),
            Expression::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(out);
                }
            }
        }
    }

    pub fn variables(&self) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Sample,
}

impl AggregateFunction {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            "SAMPLE" => Some(AggregateFunction::Sample),
            _ => None,
        }
    }
}

/// An aggregate call; its value is written to `target` for each group
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub target: VarId,
    pub function: AggregateFunction,
    pub distinct: bool,
    /// `None` for `COUNT(*)`
    pub argument: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    Variable(VarId),
    Expression { expression: Expression, alias: VarId },
}

impl ProjectionItem {
    pub fn variable(&self) -> VarId {
        match self {
            ProjectionItem::Variable(v) => *v,
            ProjectionItem::Expression { alias, .. } => *alias,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Items(Vec<ProjectionItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCondition {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryForm {
    Select {
        projection: Projection,
        distinct: bool,
    },
    Ask,
    Construct {
        template: Vec<TemplateTriple>,
    },
}

/// A compiled query
#[derive(Debug, Clone)]
pub struct Query {
    pub variables: VariableTable,
    /// Query-local PREFIX declarations
    pub prefixes: Vec<(String, String)>,
    pub form: QueryForm,
    pub pattern: GroupPattern,
    pub group_by: Vec<VarId>,
    pub aggregates: Vec<Aggregate>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    /// True when solutions are grouped before projection
    pub fn is_aggregated(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates.is_empty()
    }

    /// Names of the result columns
    pub fn output_columns(&self) -> Vec<String> {
        match &self.form {
            QueryForm::Select { projection, .. } => self
                .projected_variables(projection)
                .into_iter()
                .map(|v| self.variables.name(v).to_string())
                .collect(),
            QueryForm::Ask | QueryForm::Construct { .. } => Vec::new(),
        }
    }

    /// Grouping keys: explicit GROUP BY, else the plain projected variables
    pub fn group_keys(&self) -> Vec<VarId> {
        if !self.group_by.is_empty() {
            return self.group_by.clone();
        }
        match &self.form {
            QueryForm::Select {
                projection: Projection::Items(items),
                ..
            } => items
                .iter()
                .filter_map(|item| match item {
                    ProjectionItem::Variable(v) => Some(*v),
                    ProjectionItem::Expression { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn projected_variables(&self, projection: &Projection) -> Vec<VarId> {
        match projection {
            Projection::All => self.variables.visible().collect(),
            Projection::Items(items) => items.iter().map(|i| i.variable()).collect(),
        }
    }
}

/// One operation of an update request
///
/// `INSERT DATA` / `DELETE DATA` have no pattern and ground templates;
/// `DELETE WHERE` reuses its pattern as the delete template.
#[derive(Debug, Clone)]
pub struct UpdateOperation {
    pub variables: VariableTable,
    pub delete: Vec<TemplateTriple>,
    pub insert: Vec<TemplateTriple>,
    pub pattern: Option<GroupPattern>,
}

/// A parsed rule before it is checked and stored
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub name: Option<String>,
    pub variables: VariableTable,
    pub head: Vec<TemplateTriple>,
    pub body: GroupPattern,
}

/// Rules plus an optional query to answer once they have been applied
#[derive(Debug, Clone)]
pub struct RuleProgram {
    pub rules: Vec<RuleDefinition>,
    pub query: Option<Query>,
}
