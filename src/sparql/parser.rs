//! SPARQL parser using Pest
//!
//! Queries, update requests and rule definitions share one grammar. The
//! builder resolves prefixed names against the query-local prologue first
//! and the store's prefix table second, so the output never carries a
//! qualified name.

use super::algebra::*;
use super::bindings::{VarId, VariableTable};
use super::{SparqlError, SparqlResult};
use crate::rdf::{
    Literal, NamedNode, PrefixLookup, PrefixTable, RdfTerm, RDF_TYPE, XSD_DECIMAL, XSD_DOUBLE,
    XSD_INTEGER,
};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::collections::BTreeSet;
use std::sync::LazyLock;

#[derive(Parser)]
#[grammar = "sparql/sparql.pest"]
struct SparqlGrammar;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::comparison_op, Assoc::Left))
        .op(Op::infix(Rule::additive_op, Assoc::Left))
        .op(Op::infix(Rule::multiplicative_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op) | Op::prefix(Rule::neg_op) | Op::prefix(Rule::pos_op))
});

/// Entry points for the three textual languages
pub struct SparqlParser;

impl SparqlParser {
    /// Parse a SELECT, ASK or CONSTRUCT query
    pub fn parse_query(input: &str, prefixes: &PrefixTable) -> SparqlResult<Query> {
        let unit = parse_unit(Rule::query_unit, input)?;
        let mut builder = Builder::new(prefixes);
        let mut query = None;
        for pair in unit.into_inner() {
            match pair.as_rule() {
                Rule::prologue => builder.prologue(pair),
                Rule::select_query | Rule::construct_query | Rule::ask_query => {
                    query = Some(builder.query(pair)?)
                }
                Rule::EOI => {}
                rule => return Err(unexpected(rule)),
            }
        }
        query.ok_or_else(|| SparqlError::Syntax("missing query form".to_string()))
    }

    /// Parse an update request of one or more `;`-separated operations
    pub fn parse_update(input: &str, prefixes: &PrefixTable) -> SparqlResult<Vec<UpdateOperation>> {
        let unit = parse_unit(Rule::update_unit, input)?;
        let mut builder = Builder::new(prefixes);
        let mut operations = Vec::new();
        for step in unit.into_inner() {
            if step.as_rule() != Rule::update_step {
                continue;
            }
            for pair in step.into_inner() {
                match pair.as_rule() {
                    Rule::prologue => builder.prologue(pair),
                    _ => operations.push(builder.update_operation(pair)?),
                }
            }
        }
        Ok(operations)
    }

    /// Parse one or more rule definitions, optionally followed by a query
    pub fn parse_rules(input: &str, prefixes: &PrefixTable) -> SparqlResult<RuleProgram> {
        let unit = parse_unit(Rule::rule_unit, input)?;
        let mut builder = Builder::new(prefixes);
        let mut program = RuleProgram {
            rules: Vec::new(),
            query: None,
        };
        for block in unit.into_inner() {
            match block.as_rule() {
                Rule::rule_block => {
                    for pair in block.into_inner() {
                        match pair.as_rule() {
                            Rule::prologue => builder.prologue(pair),
                            _ => program.rules.push(builder.rule_definition(pair)?),
                        }
                    }
                }
                Rule::rule_query => {
                    for pair in block.into_inner() {
                        match pair.as_rule() {
                            Rule::prologue => builder.prologue(pair),
                            _ => program.query = Some(builder.query(pair)?),
                        }
                    }
                }
                Rule::EOI => {}
                rule => return Err(unexpected(rule)),
            }
        }
        Ok(program)
    }

    /// Leading `PREFIX` declarations of any query, update or rule text
    pub fn parse_prologue(input: &str) -> SparqlResult<Vec<(String, String)>> {
        let unit = parse_unit(Rule::prologue_unit, input)?;
        let empty = PrefixTable::new();
        let mut builder = Builder::new(&empty);
        for pair in unit.into_inner() {
            if pair.as_rule() == Rule::prologue {
                builder.prologue(pair);
            }
        }
        Ok(builder.local)
    }
}

fn parse_unit(rule: Rule, input: &str) -> SparqlResult<Pair<'_, Rule>> {
    let mut pairs =
        SparqlGrammar::parse(rule, input).map_err(|e| SparqlError::Syntax(e.to_string()))?;
    pairs
        .next()
        .ok_or_else(|| SparqlError::Syntax("empty input".to_string()))
}

fn unexpected(rule: Rule) -> SparqlError {
    SparqlError::Syntax(format!("unexpected {:?}", rule))
}

fn expect_next<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> SparqlResult<Pair<'i, Rule>> {
    pairs
        .next()
        .ok_or_else(|| SparqlError::Syntax(format!("expected {}", what)))
}

fn strip_iri(text: &str) -> &str {
    text.trim_start_matches('<').trim_end_matches('>')
}

fn typed_literal(lexical: &str, datatype: &str) -> SparqlResult<RdfTerm> {
    let lexical = lexical.strip_prefix('+').unwrap_or(lexical);
    Ok(Literal::new_typed_literal(lexical, NamedNode::new(datatype)?).into())
}

fn binary_op(text: &str) -> SparqlResult<BinaryOp> {
    Ok(match text {
        "||" => BinaryOp::Or,
        "&&" => BinaryOp::And,
        "=" => BinaryOp::Equal,
        "!=" => BinaryOp::NotEqual,
        "<" => BinaryOp::Less,
        "<=" => BinaryOp::LessOrEqual,
        ">" => BinaryOp::Greater,
        ">=" => BinaryOp::GreaterOrEqual,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Subtract,
        "*" => BinaryOp::Multiply,
        "/" => BinaryOp::Divide,
        other => return Err(SparqlError::Syntax(format!("unknown operator {}", other))),
    })
}

/// Decode the escape sequences of a string literal body
fn unescape(raw: &str) -> SparqlResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next() {
            Some('t') => '\t',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('b') => '\u{8}',
            Some('f') => '\u{c}',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some('u') => hex_char(&mut chars, 4)?,
            Some('U') => hex_char(&mut chars, 8)?,
            Some(other) => {
                return Err(SparqlError::Syntax(format!(
                    "invalid escape sequence \\{}",
                    other
                )))
            }
            None => return Err(SparqlError::Syntax("dangling escape".to_string())),
        };
        out.push(decoded);
    }
    Ok(out)
}

fn hex_char(chars: &mut std::str::Chars<'_>, digits: usize) -> SparqlResult<char> {
    let code: String = chars.by_ref().take(digits).collect();
    u32::from_str_radix(&code, 16)
        .ok()
        .filter(|_| code.len() == digits)
        .and_then(char::from_u32)
        .ok_or_else(|| SparqlError::Syntax(format!("invalid unicode escape {}", code)))
}

#[derive(Default)]
struct Modifiers {
    group_by: Vec<VarId>,
    order_by: Vec<OrderCondition>,
    limit: Option<usize>,
    offset: usize,
}

/// Lowers parse trees; one per input text
struct Builder<'a> {
    base: &'a PrefixTable,
    local: Vec<(String, String)>,
    variables: VariableTable,
    aggregates: Vec<Aggregate>,
    allow_aggregates: bool,
    anonymous: usize,
}

impl<'a> Builder<'a> {
    fn new(base: &'a PrefixTable) -> Self {
        Self {
            base,
            local: Vec::new(),
            variables: VariableTable::new(),
            aggregates: Vec::new(),
            allow_aggregates: false,
            anonymous: 0,
        }
    }

    fn prologue(&mut self, pair: Pair<Rule>) {
        for decl in pair.into_inner() {
            let mut inner = decl.into_inner();
            if let (Some(ns), Some(iri)) = (inner.next(), inner.next()) {
                let prefix = ns.as_str().trim_end_matches(':').to_string();
                self.local.push((prefix, strip_iri(iri.as_str()).to_string()));
            }
        }
    }

    // ------------------------------------------------------------------
    // Terms
    // ------------------------------------------------------------------

    fn named_node(&self, pair: Pair<Rule>) -> SparqlResult<NamedNode> {
        match pair.as_rule() {
            Rule::IRIREF => Ok(NamedNode::new(strip_iri(pair.as_str()))?),
            Rule::prefixed_name => Ok(self.base.scoped(&self.local).resolve(pair.as_str())?),
            rule => Err(unexpected(rule)),
        }
    }

    fn constant(&self, pair: Pair<Rule>) -> SparqlResult<RdfTerm> {
        match pair.as_rule() {
            Rule::IRIREF | Rule::prefixed_name => Ok(self.named_node(pair)?.into()),
            Rule::a_keyword => Ok(NamedNode::new(RDF_TYPE)?.into()),
            Rule::rdf_literal => self.rdf_literal(pair),
            Rule::INTEGER => typed_literal(pair.as_str(), XSD_INTEGER),
            Rule::DECIMAL => typed_literal(pair.as_str(), XSD_DECIMAL),
            Rule::DOUBLE => typed_literal(pair.as_str(), XSD_DOUBLE),
            Rule::boolean_literal => {
                Ok(Literal::boolean(pair.as_str().eq_ignore_ascii_case("true")).into())
            }
            rule => Err(unexpected(rule)),
        }
    }

    fn rdf_literal(&self, pair: Pair<Rule>) -> SparqlResult<RdfTerm> {
        let mut inner = pair.into_inner();
        let value = unescape(expect_next(&mut inner, "string")?.as_str())?;
        let literal = match inner.next() {
            None => Literal::new_simple_literal(value),
            Some(tag) if tag.as_rule() == Rule::LANGTAG => {
                Literal::new_language_tagged_literal(value, &tag.as_str()[1..])?
            }
            Some(datatype) => Literal::new_typed_literal(value, self.named_node(datatype)?),
        };
        Ok(literal.into())
    }

    fn variable(&mut self, pair: Pair<Rule>) -> VarId {
        self.variables.intern(&pair.as_str()[1..])
    }

    fn pattern_term(&mut self, pair: Pair<Rule>) -> SparqlResult<PatternTerm> {
        Ok(match pair.as_rule() {
            Rule::var => PatternTerm::Variable(self.variable(pair)),
            // blank nodes in patterns behave as undistinguished variables
            Rule::blank_node => PatternTerm::Variable(self.variables.intern_hidden(pair.as_str())),
            Rule::anon => PatternTerm::Variable(self.variables.fresh_hidden("anon")),
            _ => PatternTerm::Constant(self.constant(pair)?),
        })
    }

    fn template_term(&mut self, pair: Pair<Rule>) -> SparqlResult<TemplateTerm> {
        Ok(match pair.as_rule() {
            Rule::var => TemplateTerm::Variable(self.variable(pair)),
            Rule::blank_node => TemplateTerm::BlankNode(pair.as_str()[2..].to_string()),
            Rule::anon => {
                self.anonymous += 1;
                TemplateTerm::BlankNode(format!(".anon{}", self.anonymous))
            }
            _ => TemplateTerm::Constant(self.constant(pair)?),
        })
    }

    // ------------------------------------------------------------------
    // Triples
    // ------------------------------------------------------------------

    fn triples_same_subject<T: Clone>(
        &mut self,
        pair: Pair<Rule>,
        term: fn(&mut Self, Pair<Rule>) -> SparqlResult<T>,
        out: &mut Vec<[T; 3]>,
    ) -> SparqlResult<()> {
        let mut inner = pair.into_inner();
        let subject = term(self, expect_next(&mut inner, "subject")?)?;
        for property in inner {
            let mut parts = property.into_inner();
            let verb = term(self, expect_next(&mut parts, "predicate")?)?;
            for object in parts {
                let object = term(self, object)?;
                out.push([subject.clone(), verb.clone(), object]);
            }
        }
        Ok(())
    }

    fn group_pattern(&mut self, pair: Pair<Rule>) -> SparqlResult<GroupPattern> {
        let mut group = GroupPattern::default();
        let mut triples = Vec::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::triples_same_subject => {
                    self.triples_same_subject(inner, Self::pattern_term, &mut triples)?
                }
                Rule::filter => group.filters.push(self.filter(inner)?),
                rule => return Err(unexpected(rule)),
            }
        }
        group.patterns = triples
            .into_iter()
            .map(|[subject, predicate, object]| PatternTriple {
                subject,
                predicate,
                object,
            })
            .collect();
        Ok(group)
    }

    fn template(&mut self, pair: Pair<Rule>) -> SparqlResult<Vec<TemplateTriple>> {
        let mut triples = Vec::new();
        for inner in pair.into_inner() {
            self.triples_same_subject(inner, Self::template_term, &mut triples)?;
        }
        Ok(triples
            .into_iter()
            .map(|[subject, predicate, object]| TemplateTriple {
                subject,
                predicate,
                object,
            })
            .collect())
    }

    /// `p(s, o)` is the triple (s p o); `C(x)` is (x rdf:type C)
    fn atom<T: Clone + From<RdfTerm>>(
        &mut self,
        pair: Pair<Rule>,
        term: fn(&mut Self, Pair<Rule>) -> SparqlResult<T>,
    ) -> SparqlResult<[T; 3]> {
        let mut inner = pair.into_inner();
        let predicate = term(self, expect_next(&mut inner, "atom predicate")?)?;
        let first = term(self, expect_next(&mut inner, "atom argument")?)?;
        match inner.next() {
            Some(second) => Ok([first, predicate, term(self, second)?]),
            None => Ok([first, T::from(NamedNode::new(RDF_TYPE)?.into()), predicate]),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn filter(&mut self, pair: Pair<Rule>) -> SparqlResult<Expression> {
        let inner = expect_next(&mut pair.into_inner(), "filter expression")?;
        match inner.as_rule() {
            Rule::builtin_call => self.builtin_call(inner),
            _ => self.expression(inner),
        }
    }

    fn expression(&mut self, pair: Pair<Rule>) -> SparqlResult<Expression> {
        PRATT_PARSER
            .map_primary(|primary| self.primary(primary))
            .map_prefix(|op, operand| {
                let op = match op.as_rule() {
                    Rule::not_op => UnaryOp::Not,
                    Rule::neg_op => UnaryOp::Minus,
                    _ => UnaryOp::Plus,
                };
                Ok(Expression::Unary {
                    op,
                    expr: Box::new(operand?),
                })
            })
            .map_infix(|left, op, right| {
                let left = left?;
                let right = right?;
                Ok(Expression::Binary {
                    left: Box::new(left),
                    op: binary_op(op.as_str())?,
                    right: Box::new(right),
                })
            })
            .parse(pair.into_inner())
    }

    fn primary(&mut self, pair: Pair<Rule>) -> SparqlResult<Expression> {
        match pair.as_rule() {
            Rule::expression => self.expression(pair),
            Rule::builtin_call => self.builtin_call(pair),
            Rule::aggregate => self.aggregate(pair),
            Rule::var => Ok(Expression::Variable(self.variable(pair))),
            _ => Ok(Expression::Constant(self.constant(pair)?)),
        }
    }

    fn builtin_call(&mut self, pair: Pair<Rule>) -> SparqlResult<Expression> {
        let mut inner = pair.into_inner();
        let name = expect_next(&mut inner, "function name")?;
        let function = Builtin::from_keyword(name.as_str())
            .ok_or_else(|| SparqlError::Syntax(format!("unknown function {}", name.as_str())))?;

        let mut args = Vec::new();
        for arg in inner {
            args.push(self.expression(arg)?);
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(SparqlError::Syntax(format!(
                "{} expects {} argument(s), got {}",
                name.as_str().to_ascii_uppercase(),
                if min == max { min.to_string() } else { format!("{}-{}", min, max) },
                args.len()
            )));
        }
        if function == Builtin::Bound && !matches!(args.first(), Some(Expression::Variable(_))) {
            return Err(SparqlError::Syntax("BOUND expects a variable".to_string()));
        }
        Ok(Expression::Function { function, args })
    }

    fn aggregate(&mut self, pair: Pair<Rule>) -> SparqlResult<Expression> {
        if !self.allow_aggregates {
            return Err(SparqlError::Syntax(
                "aggregates are only allowed in SELECT projections".to_string(),
            ));
        }

        let mut function = None;
        let mut distinct = false;
        let mut argument = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::aggregate_name => function = AggregateFunction::from_keyword(inner.as_str()),
                Rule::distinct => distinct = true,
                Rule::star => argument = None,
                Rule::expression => {
                    self.allow_aggregates = false;
                    let parsed = self.expression(inner);
                    self.allow_aggregates = true;
                    argument = Some(parsed?);
                }
                rule => return Err(unexpected(rule)),
            }
        }

        let function =
            function.ok_or_else(|| SparqlError::Syntax("unknown aggregate".to_string()))?;
        if argument.is_none() && function != AggregateFunction::Count {
            return Err(SparqlError::Syntax("only COUNT accepts *".to_string()));
        }

        let target = self.variables.fresh_hidden("agg");
        self.aggregates.push(Aggregate {
            target,
            function,
            distinct,
            argument,
        });
        Ok(Expression::Variable(target))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn query(&mut self, pair: Pair<Rule>) -> SparqlResult<Query> {
        let mut form = (pair.as_rule() == Rule::ask_query).then_some(QueryForm::Ask);
        let mut pattern = GroupPattern::default();
        let mut modifiers = Modifiers::default();

        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::select_clause => form = Some(self.select_clause(part)?),
                Rule::template => {
                    form = Some(QueryForm::Construct {
                        template: self.template(part)?,
                    })
                }
                Rule::group_graph_pattern => pattern = self.group_pattern(part)?,
                Rule::solution_modifier => self.solution_modifier(part, &mut modifiers)?,
                rule => return Err(unexpected(rule)),
            }
        }

        let query = Query {
            variables: std::mem::take(&mut self.variables),
            prefixes: self.local.clone(),
            form: form.ok_or_else(|| SparqlError::Syntax("missing query form".to_string()))?,
            pattern,
            group_by: modifiers.group_by,
            aggregates: std::mem::take(&mut self.aggregates),
            order_by: modifiers.order_by,
            limit: modifiers.limit,
            offset: modifiers.offset,
        };
        validate_query(&query)?;
        Ok(query)
    }

    fn select_clause(&mut self, pair: Pair<Rule>) -> SparqlResult<QueryForm> {
        let mut distinct = false;
        let mut all = false;
        let mut items = Vec::new();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::distinct => distinct = true,
                Rule::star => all = true,
                Rule::projection => items.push(self.projection(inner)?),
                rule => return Err(unexpected(rule)),
            }
        }
        let projection = if all {
            Projection::All
        } else {
            Projection::Items(items)
        };
        Ok(QueryForm::Select {
            projection,
            distinct,
        })
    }

    fn projection(&mut self, pair: Pair<Rule>) -> SparqlResult<ProjectionItem> {
        let mut inner = pair.into_inner();
        let first = expect_next(&mut inner, "projection")?;
        if first.as_rule() == Rule::var {
            return Ok(ProjectionItem::Variable(self.variable(first)));
        }

        self.allow_aggregates = true;
        let expression = self.expression(first);
        self.allow_aggregates = false;
        let expression = expression?;

        let alias = self.variable(expect_next(&mut inner, "AS ?variable")?);
        Ok(ProjectionItem::Expression { expression, alias })
    }

    fn solution_modifier(&mut self, pair: Pair<Rule>, modifiers: &mut Modifiers) -> SparqlResult<()> {
        for clause in pair.into_inner() {
            match clause.as_rule() {
                Rule::group_clause => {
                    for var in clause.into_inner() {
                        let id = self.variable(var);
                        modifiers.group_by.push(id);
                    }
                }
                Rule::order_clause => {
                    for condition in clause.into_inner() {
                        modifiers.order_by.push(self.order_condition(condition)?);
                    }
                }
                Rule::limit_clause => modifiers.limit = Some(parse_count(clause)?),
                Rule::offset_clause => modifiers.offset = parse_count(clause)?,
                rule => return Err(unexpected(rule)),
            }
        }
        Ok(())
    }

    fn order_condition(&mut self, pair: Pair<Rule>) -> SparqlResult<OrderCondition> {
        let mut inner = pair.into_inner();
        let first = expect_next(&mut inner, "ORDER BY condition")?;
        if first.as_rule() == Rule::var {
            return Ok(OrderCondition {
                expression: Expression::Variable(self.variable(first)),
                descending: false,
            });
        }
        let descending = first.as_str().eq_ignore_ascii_case("DESC");
        let expression = self.expression(expect_next(&mut inner, "ORDER BY expression")?)?;
        Ok(OrderCondition {
            expression,
            descending,
        })
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    fn update_operation(&mut self, pair: Pair<Rule>) -> SparqlResult<UpdateOperation> {
        let mut delete = Vec::new();
        let mut insert = Vec::new();
        let mut pattern = None;

        match pair.as_rule() {
            Rule::insert_data => {
                insert = self.template(expect_next(&mut pair.into_inner(), "data block")?)?;
            }
            Rule::delete_data => {
                delete = self.template(expect_next(&mut pair.into_inner(), "data block")?)?;
            }
            Rule::delete_where => {
                let group = self.group_pattern(expect_next(&mut pair.into_inner(), "pattern")?)?;
                delete = group
                    .patterns
                    .iter()
                    .cloned()
                    .map(TemplateTriple::from)
                    .collect();
                pattern = Some(group);
            }
            Rule::modify => {
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::delete_clause => {
                            delete = self.template(expect_next(&mut part.into_inner(), "template")?)?
                        }
                        Rule::insert_clause => {
                            insert = self.template(expect_next(&mut part.into_inner(), "template")?)?
                        }
                        Rule::group_graph_pattern => pattern = Some(self.group_pattern(part)?),
                        rule => return Err(unexpected(rule)),
                    }
                }
            }
            rule => return Err(unexpected(rule)),
        }

        if delete.iter().any(TemplateTriple::has_blank_nodes) {
            return Err(SparqlError::Syntax(
                "blank nodes are not allowed in DELETE templates".to_string(),
            ));
        }

        let operation = UpdateOperation {
            variables: std::mem::take(&mut self.variables),
            delete,
            insert,
            pattern,
        };
        if operation.pattern.is_none() {
            let unground = operation
                .delete
                .iter()
                .chain(&operation.insert)
                .flat_map(|t| t.variables())
                .next();
            if let Some(var) = unground {
                return Err(SparqlError::UngroundTemplate(format!(
                    "?{}",
                    operation.variables.name(var)
                )));
            }
        }
        Ok(operation)
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    fn rule_definition(&mut self, pair: Pair<Rule>) -> SparqlResult<RuleDefinition> {
        let mut name = None;
        let mut head = Vec::new();
        let mut body = GroupPattern::default();

        match pair.as_rule() {
            Rule::construct_rule => {
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::rule_name => name = Some(part.as_str().to_string()),
                        Rule::rule_params => {
                            for var in part.into_inner() {
                                self.variable(var);
                            }
                        }
                        Rule::template => head = self.template(part)?,
                        Rule::group_graph_pattern => body = self.group_pattern(part)?,
                        rule => return Err(unexpected(rule)),
                    }
                }
            }
            Rule::datalog_rule => {
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::rule_head => {
                            for atom in part.into_inner() {
                                let [subject, predicate, object] =
                                    self.atom(atom, Self::template_term)?;
                                head.push(TemplateTriple {
                                    subject,
                                    predicate,
                                    object,
                                });
                            }
                        }
                        Rule::rule_body => {
                            for item in part.into_inner() {
                                if item.as_rule() == Rule::filter {
                                    body.filters.push(self.filter(item)?);
                                    continue;
                                }
                                let [subject, predicate, object] =
                                    self.atom(item, Self::pattern_term)?;
                                body.patterns.push(PatternTriple {
                                    subject,
                                    predicate,
                                    object,
                                });
                            }
                        }
                        rule => return Err(unexpected(rule)),
                    }
                }
            }
            rule => return Err(unexpected(rule)),
        }

        Ok(RuleDefinition {
            name,
            variables: std::mem::take(&mut self.variables),
            head,
            body,
        })
    }
}

fn parse_count(clause: Pair<Rule>) -> SparqlResult<usize> {
    let number = expect_next(&mut clause.into_inner(), "number")?;
    number
        .as_str()
        .parse()
        .map_err(|_| SparqlError::Syntax(format!("invalid count {}", number.as_str())))
}

/// Scoping checks that need the whole query
fn validate_query(query: &Query) -> SparqlResult<()> {
    let QueryForm::Select { projection, .. } = &query.form else {
        return Ok(());
    };
    let items = match projection {
        Projection::All if query.is_aggregated() => {
            return Err(SparqlError::Syntax(
                "SELECT * cannot be combined with GROUP BY or aggregates".to_string(),
            ))
        }
        Projection::All => return Ok(()),
        Projection::Items(items) => items,
    };

    let bound = query.pattern.bound_variables();
    let keys: BTreeSet<VarId> = query.group_keys().into_iter().collect();
    let aggregate_targets: BTreeSet<VarId> = query.aggregates.iter().map(|a| a.target).collect();
    let mut defined = BTreeSet::new();
    let name = |v: VarId| format!("?{}", query.variables.name(v));

    for item in items {
        match item {
            ProjectionItem::Variable(v) => {
                if !bound.contains(v) && !defined.contains(v) {
                    return Err(SparqlError::UnboundVariableInProjection(name(*v)));
                }
                if query.is_aggregated() && !keys.contains(v) && !defined.contains(v) {
                    return Err(SparqlError::Syntax(format!(
                        "{} is projected but not grouped",
                        name(*v)
                    )));
                }
            }
            ProjectionItem::Expression { expression, alias } => {
                if bound.contains(alias) || defined.contains(alias) {
                    return Err(SparqlError::Syntax(format!(
                        "{} is already in scope",
                        name(*alias)
                    )));
                }
                if query.is_aggregated() {
                    let loose = expression.variables().into_iter().find(|v| {
                        !keys.contains(v) && !aggregate_targets.contains(v) && !defined.contains(v)
                    });
                    if let Some(v) = loose {
                        return Err(SparqlError::Syntax(format!(
                            "{} is used outside an aggregate but not grouped",
                            name(v)
                        )));
                    }
                }
                defined.insert(*alias);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> PrefixTable {
        let mut table = PrefixTable::new();
        table.register("ex", "http://example.org/");
        table
    }

    fn parse(query: &str) -> Query {
        SparqlParser::parse_query(query, &prefixes()).unwrap()
    }

    #[test]
    fn test_parse_simple_select() {
        let query = parse("SELECT ?x ?y WHERE { ?x ex:knows ?y }");
        assert_eq!(query.output_columns(), vec!["x", "y"]);
        assert_eq!(query.pattern.patterns.len(), 1);
        assert_eq!(
            query.pattern.patterns[0].predicate,
            PatternTerm::Constant(NamedNode::new("http://example.org/knows").unwrap().into())
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let query = parse("select distinct * where { ?s a ex:Person } limit 5 offset 2");
        assert!(matches!(
            query.form,
            QueryForm::Select {
                projection: Projection::All,
                distinct: true
            }
        ));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, 2);
        assert_eq!(
            query.pattern.patterns[0].predicate,
            PatternTerm::Constant(NamedNode::new(RDF_TYPE).unwrap().into())
        );
    }

    #[test]
    fn test_predicate_and_object_lists() {
        let query = parse("SELECT * WHERE { ?s ex:p ?a , ?b ; ex:q \"x\" . ?a ex:r ?s }");
        assert_eq!(query.pattern.patterns.len(), 4);
        assert_eq!(query.output_columns(), vec!["s", "a", "b"]);
    }

    #[test]
    fn test_literals() {
        let query = parse(
            r#"SELECT * WHERE { ?s ex:p "a\"b"@en . ?s ex:q 42 . ?s ex:r 1.5 . ?s ex:t "7"^^ex:dt . ?s ex:u true }"#,
        );
        let objects: Vec<String> = query
            .pattern
            .patterns
            .iter()
            .map(|p| match &p.object {
                PatternTerm::Constant(term) => term.to_string(),
                PatternTerm::Variable(_) => String::new(),
            })
            .collect();
        assert_eq!(objects[0], "\"a\\\"b\"@en");
        assert_eq!(objects[1], format!("\"42\"^^<{}>", XSD_INTEGER));
        assert_eq!(objects[2], format!("\"1.5\"^^<{}>", XSD_DECIMAL));
        assert_eq!(objects[3], "\"7\"^^<http://example.org/dt>");
        assert!(objects[4].starts_with("\"true\"^^"));
    }

    #[test]
    fn test_query_local_prefix_shadows_table() {
        let query = parse("PREFIX ex: <http://other.org/> SELECT ?s WHERE { ?s ex:p ?o }");
        assert_eq!(
            query.pattern.patterns[0].predicate,
            PatternTerm::Constant(NamedNode::new("http://other.org/p").unwrap().into())
        );
    }

    #[test]
    fn test_unknown_prefix() {
        let err = SparqlParser::parse_query("SELECT ?s WHERE { ?s nope:p ?o }", &prefixes())
            .unwrap_err();
        assert_eq!(err, SparqlError::UnknownPrefix("nope".to_string()));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in [
            "SELECT ?x WHERE { ?x ex:p ?y",
            "SELEKT ?x WHERE { ?x ex:p ?y }",
            "SELECT ?x WHERE { ?x ex:p ?y } LIMIT",
            "SELECT ?x WHERE { ?x ex:p ?y OPTIONAL { ?x ex:q ?z } }",
        ] {
            let err = SparqlParser::parse_query(bad, &prefixes()).unwrap_err();
            assert!(matches!(err, SparqlError::Syntax(_)), "{}", bad);
        }
    }

    #[test]
    fn test_unbound_projection() {
        let err = SparqlParser::parse_query("SELECT ?z WHERE { ?x ex:p ?y }", &prefixes())
            .unwrap_err();
        assert_eq!(err, SparqlError::UnboundVariableInProjection("?z".to_string()));
    }

    #[test]
    fn test_filter_expression_precedence() {
        let query = parse("SELECT ?x WHERE { ?x ex:age ?a FILTER(?a > 1 + 2 * 3 && !BOUND(?b)) }");
        let Expression::Binary { op, left, .. } = &query.pattern.filters[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::And);
        let Expression::Binary { op, right, .. } = left.as_ref() else {
            panic!("expected comparison");
        };
        assert_eq!(*op, BinaryOp::Greater);
        assert!(matches!(
            right.as_ref(),
            Expression::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_aggregates() {
        let query = parse(
            "SELECT ?p (COUNT(DISTINCT ?o) AS ?n) (SUM(?o) AS ?total) WHERE { ?s ?p ?o } GROUP BY ?p ORDER BY DESC(?n)",
        );
        assert_eq!(query.aggregates.len(), 2);
        assert!(query.aggregates[0].distinct);
        assert_eq!(query.output_columns(), vec!["p", "n", "total"]);
        assert!(query.order_by[0].descending);

        let count_all = parse("SELECT (COUNT(*) AS ?n) WHERE { ?s ?p ?o }");
        assert_eq!(count_all.aggregates[0].argument, None);

        let err = SparqlParser::parse_query(
            "SELECT ?s WHERE { ?s ?p ?o FILTER(COUNT(?o) > 1) }",
            &prefixes(),
        )
        .unwrap_err();
        assert!(matches!(err, SparqlError::Syntax(_)));
    }

    #[test]
    fn test_ungrouped_projection_is_rejected() {
        let err = SparqlParser::parse_query(
            "SELECT ?s ?o (COUNT(?o) AS ?n) WHERE { ?s ?p ?o } GROUP BY ?s",
            &prefixes(),
        )
        .unwrap_err();
        assert!(matches!(err, SparqlError::Syntax(_)));
    }

    #[test]
    fn test_ask_and_construct() {
        let ask = parse("ASK { ex:a ex:knows ?x }");
        assert!(matches!(ask.form, QueryForm::Ask));

        let construct = parse("CONSTRUCT { ?y ex:knownBy ?x . _:n ex:p ?x } WHERE { ?x ex:knows ?y }");
        let QueryForm::Construct { template } = construct.form else {
            panic!("expected construct");
        };
        assert_eq!(template.len(), 2);
        assert!(template[1].has_blank_nodes());
    }

    #[test]
    fn test_blank_nodes_in_patterns_are_hidden_variables() {
        let query = parse("SELECT * WHERE { _:b ex:p ?o . [] ex:q ?o }");
        assert_eq!(query.output_columns(), vec!["o"]);
        assert!(query.pattern.patterns[0].subject.as_variable().is_some());
    }

    #[test]
    fn test_parse_update_operations() {
        let ops = SparqlParser::parse_update(
            "PREFIX ex: <http://example.org/>
             INSERT DATA { ex:a ex:knows ex:b } ;
             DELETE { ?x ex:knows ex:b } INSERT { ?x ex:knew ex:b } WHERE { ?x ex:knows ex:b } ;
             DELETE WHERE { ?x ex:old ?y }",
            &PrefixTable::new(),
        )
        .unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].insert.len(), 1);
        assert!(ops[0].pattern.is_none());
        assert_eq!(ops[1].delete.len(), 1);
        assert_eq!(ops[1].insert.len(), 1);
        assert!(ops[1].pattern.is_some());
        assert_eq!(ops[2].delete.len(), 1);
        assert_eq!(ops[2].pattern.as_ref().map(|p| p.patterns.len()), Some(1));
    }

    #[test]
    fn test_unground_data_block() {
        let err = SparqlParser::parse_update("INSERT DATA { ?x ex:p ex:o }", &prefixes())
            .unwrap_err();
        assert_eq!(err, SparqlError::UngroundTemplate("?x".to_string()));

        let err = SparqlParser::parse_update("INSERT { ?x ex:p ex:o }", &prefixes()).unwrap_err();
        assert_eq!(err, SparqlError::UngroundTemplate("?x".to_string()));
    }

    #[test]
    fn test_parse_datalog_rules() {
        let program = SparqlParser::parse_rules(
            "ex:knows(?x, ?z) :- ex:knows(?x, ?y), ex:knows(?y, ?z).
             ex:Person(?x) :- ex:knows(?x, ?y), FILTER(?x != ?y).",
            &prefixes(),
        )
        .unwrap();
        assert_eq!(program.rules.len(), 2);
        assert_eq!(program.rules[0].body.patterns.len(), 2);
        assert_eq!(program.rules[1].body.filters.len(), 1);
        assert_eq!(
            program.rules[1].head[0].predicate,
            TemplateTerm::Constant(NamedNode::new(RDF_TYPE).unwrap().into())
        );
        assert!(program.query.is_none());
    }

    #[test]
    fn test_parse_construct_rule_with_query() {
        let program = SparqlParser::parse_rules(
            "PREFIX ex: <http://example.org/>
             RULE :Hot(?room) :- CONSTRUCT { ?room ex:alert \"hot\" . } WHERE { ?room ex:temp ?t FILTER(?t > 80) }
             SELECT ?room WHERE { ?room ex:alert ?a }",
            &PrefixTable::new(),
        )
        .unwrap();
        assert_eq!(program.rules.len(), 1);
        assert_eq!(program.rules[0].name.as_deref(), Some(":Hot"));
        assert_eq!(program.rules[0].body.filters.len(), 1);
        assert!(program.query.is_some());
    }

    #[test]
    fn test_parse_prologue() {
        let prefixes = SparqlParser::parse_prologue(
            "PREFIX ex: <http://example.org/>\nPREFIX : <http://default.org/>\nSELECT * WHERE { ?s ?p ?o }",
        )
        .unwrap();
        assert_eq!(
            prefixes,
            vec![
                ("ex".to_string(), "http://example.org/".to_string()),
                (String::new(), "http://default.org/".to_string()),
            ]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\tbA").unwrap(), "a\tbA");
        assert!(unescape(r"\q").is_err());
    }
}
