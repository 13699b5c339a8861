//! Join-order planning
//!
//! Greedy: the next pattern is the one with the lowest estimated candidate
//! count given the variables bound so far, ties broken by the number of
//! bound positions and then by textual order. Each filter is placed right
//! after the step that binds the last of its variables.

use super::algebra::GroupPattern;
use super::bindings::VarId;
use super::matcher::PatternMatcher;
use super::operator::{FilterOperator, OperatorBox, PatternMatchOperator, SingletonOperator};
use crate::rdf::TripleStore;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

/// Execution plan - a tree of physical operators
pub struct ExecutionPlan {
    /// Root operator
    pub root: OperatorBox,
    /// Pattern indices in join order
    pub pattern_order: Vec<usize>,
}

/// Query planner
#[derive(Debug, Clone, Default)]
pub struct QueryPlanner;

impl QueryPlanner {
    /// Create a new query planner
    pub fn new() -> Self {
        Self
    }

    /// Plan `pattern` over frames of `width` variables
    pub fn plan(&self, pattern: &GroupPattern, width: usize, store: &TripleStore) -> ExecutionPlan {
        let matchers: Vec<PatternMatcher> = pattern
            .patterns
            .iter()
            .map(|p| PatternMatcher::compile(p, store))
            .collect();

        let order = self.join_order(&matchers, store);

        let bindable = pattern.bound_variables();
        let filter_vars: Vec<BTreeSet<VarId>> = pattern
            .filters
            .iter()
            .map(|f| f.variables().intersection(&bindable).copied().collect())
            .collect();
        let mut placed = vec![false; pattern.filters.len()];

        let mut bound = BTreeSet::new();
        let mut root: OperatorBox = Box::new(SingletonOperator::new(width));
        root = attach_filters(root, pattern, &filter_vars, &bound, &mut placed);

        for &index in &order {
            let matcher = matchers[index].clone();
            bound.extend(matcher.variables());
            root = Box::new(PatternMatchOperator::new(root, matcher));
            root = attach_filters(root, pattern, &filter_vars, &bound, &mut placed);
        }

        debug!(
            patterns = pattern.patterns.len(),
            filters = pattern.filters.len(),
            order = ?order,
            "planned join order"
        );

        ExecutionPlan {
            root,
            pattern_order: order,
        }
    }

    fn join_order(&self, matchers: &[PatternMatcher], store: &TripleStore) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..matchers.len()).collect();
        let mut bound = BTreeSet::new();
        let mut order = Vec::with_capacity(matchers.len());

        while let Some(position) = remaining
            .iter()
            .enumerate()
            .min_by_key(|&(_, &i)| {
                let matcher = &matchers[i];
                (
                    matcher.estimate(store, &bound),
                    Reverse(matcher.bound_positions(&bound)),
                    i,
                )
            })
            .map(|(position, _)| position)
        {
            let next = remaining.remove(position);
            bound.extend(matchers[next].variables());
            order.push(next);
        }
        order
    }
}

fn attach_filters(
    mut root: OperatorBox,
    pattern: &GroupPattern,
    filter_vars: &[BTreeSet<VarId>],
    bound: &BTreeSet<VarId>,
    placed: &mut [bool],
) -> OperatorBox {
    for (i, filter) in pattern.filters.iter().enumerate() {
        if !placed[i] && filter_vars[i].is_subset(bound) {
            placed[i] = true;
            root = Box::new(FilterOperator::new(root, filter.clone()));
        }
    }
    root
}
