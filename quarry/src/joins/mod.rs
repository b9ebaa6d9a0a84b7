/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Inner joins.
//!
//! The node splits its condition into conjuncts, pushes single-sided ones into
//! the matching child and picks a strategy for the rest: hash or merge when
//! every straddling conjunct is an equality between the two sides, nested
//! loop otherwise.

pub mod hash;
pub mod merge;
pub mod nested_loop;

use crate::config::{JoinConfig, JoinStrategyKind};
use crate::plan::protocol;
use crate::plan::{Node, OrderNode, ValuesNode};
use crate::scanner::{FilteredScanner, Scanner};
use log::debug;
use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::{BinaryOp, Expression};
use shared::field::Field;
use shared::filter;
use shared::order::OrderExpression;
use shared::row::Row;
use shared::value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::sync::Arc;

pub use hash::HashJoinScanner;
pub use merge::MergeJoinScanner;
pub use nested_loop::NestedLoopScanner;

/// `left_expr = right_expr`, each side over one input only
#[derive(Debug, Clone, PartialEq)]
pub struct EquiPair {
    pub left: Expression,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinStrategy {
    NestedLoop,
    Hash(Vec<EquiPair>),
    Merge(Vec<EquiPair>),
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, pairs) = match self {
            JoinStrategy::NestedLoop => return write!(f, "NestedLoop"),
            JoinStrategy::Hash(pairs) => ("HashJoin", pairs),
            JoinStrategy::Merge(pairs) => ("MergeJoin", pairs),
        };
        let keys: Vec<String> = pairs
            .iter()
            .map(|pair| format!("{} = {}", pair.left, pair.right))
            .collect();
        write!(f, "{}({})", name, keys.join(", "))
    }
}

/// Conjuncts of a join predicate sorted by the inputs they reference
#[derive(Debug, Default)]
struct Partition {
    left: Vec<Expression>,
    right: Vec<Expression>,
    straddling: Vec<Expression>,
}

fn partition(conjuncts: Vec<Expression>, left: &[Field], right: &[Field]) -> Result<Partition> {
    let mut out = Partition::default();
    for conjunct in conjuncts {
        let on_left = conjunct.references_any(left)?;
        let on_right = conjunct.references_any(right)?;
        match (on_left, on_right) {
            (_, false) => out.left.push(conjunct),
            (false, true) => out.right.push(conjunct),
            (true, true) => out.straddling.push(conjunct),
        }
    }
    Ok(out)
}

fn side_of(expression: &Expression, fields: &[Field]) -> Result<bool> {
    Ok(expression.references_any(fields)? && expression.resolves_within(fields)?)
}

fn equi_pair(conjunct: &Expression, left: &[Field], right: &[Field]) -> Result<Option<EquiPair>> {
    let Expression::Binary {
        op: BinaryOp::Eq,
        left: a,
        right: b,
    } = conjunct
    else {
        return Ok(None);
    };
    if side_of(a, left)? && side_of(b, right)? {
        return Ok(Some(EquiPair {
            left: a.as_ref().clone(),
            right: b.as_ref().clone(),
        }));
    }
    if side_of(b, left)? && side_of(a, right)? {
        return Ok(Some(EquiPair {
            left: b.as_ref().clone(),
            right: a.as_ref().clone(),
        }));
    }
    Ok(None)
}

/// All straddling conjuncts as equi-pairs, or `None` if any of them is not one
fn equi_pairs(
    straddling: &[Expression],
    left: &[Field],
    right: &[Field],
) -> Result<Option<Vec<EquiPair>>> {
    if straddling.is_empty() {
        return Ok(None);
    }
    let mut pairs = Vec::with_capacity(straddling.len());
    for conjunct in straddling {
        match equi_pair(conjunct, left, right)? {
            Some(pair) => pairs.push(pair),
            None => return Ok(None),
        }
    }
    Ok(Some(pairs))
}

/// Evaluates one side of the equi-pairs; `None` when a key component is NULL
pub(crate) fn join_key(
    expressions: &[Expression],
    ctx: &ExecutionContext,
    row: &Row,
) -> Result<Option<Vec<Value>>> {
    let mut key = Vec::with_capacity(expressions.len());
    for expression in expressions {
        let value = expression.value_from(ctx, row)?;
        if value.is_null() {
            return Ok(None);
        }
        key.push(value);
    }
    Ok(Some(key))
}

pub(crate) fn compare_join_keys(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right) {
        let ordering = l.total_cmp(r);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Inner join of two inputs, a cross join when there is no condition
pub struct JoinNode<'t> {
    left: Box<dyn Node + 't>,
    right: Box<dyn Node + 't>,
    condition: Option<Expression>,
    config: JoinConfig,
    fields: Arc<[Field]>,
    pushed_filter: Option<Expression>,
    pushed_order: Option<OrderExpression>,
    strategy: Option<JoinStrategy>,
    left_residual: Option<Expression>,
    right_residual: Option<Expression>,
    residual_order: Option<OrderExpression>,
    optimized: bool,
}

impl<'t> JoinNode<'t> {
    pub fn new(
        left: Box<dyn Node + 't>,
        right: Box<dyn Node + 't>,
        condition: Option<Expression>,
    ) -> Self {
        let fields: Arc<[Field]> = left
            .fields()
            .iter()
            .chain(right.fields().iter())
            .cloned()
            .collect();
        Self {
            left,
            right,
            condition,
            config: JoinConfig::default(),
            fields,
            pushed_filter: None,
            pushed_order: None,
            strategy: None,
            left_residual: None,
            right_residual: None,
            residual_order: None,
            optimized: false,
        }
    }

    pub fn with_config(mut self, config: JoinConfig) -> Self {
        self.config = config;
        self
    }

    /// The chosen strategy, once optimized
    pub fn strategy(&self) -> Option<&JoinStrategy> {
        self.strategy.as_ref()
    }

    fn choose(&self, pairs: Option<Vec<EquiPair>>) -> JoinStrategy {
        match (self.config.strategy, pairs) {
            (JoinStrategyKind::Auto | JoinStrategyKind::Hash, Some(pairs)) => {
                JoinStrategy::Hash(pairs)
            }
            (JoinStrategyKind::Merge, Some(pairs)) => JoinStrategy::Merge(pairs),
            _ => JoinStrategy::NestedLoop,
        }
    }

    /// Puts both inputs behind sorts on their join keys; the right one is
    /// buffered so equal-key groups can be replayed
    fn wrap_for_merge(&mut self, pairs: &[EquiPair]) {
        let left_keys = OrderExpression::asc(pairs.iter().map(|p| p.left.clone()).collect());
        let right_keys = OrderExpression::asc(pairs.iter().map(|p| p.right.clone()).collect());
        let placeholder: Box<dyn Node + 't> = Box::new(ValuesNode::empty(self.left.fields()));
        let left = mem::replace(&mut self.left, placeholder);
        self.left = Box::new(OrderNode::new(left, left_keys));
        let placeholder: Box<dyn Node + 't> = Box::new(ValuesNode::empty(self.right.fields()));
        let right = mem::replace(&mut self.right, placeholder);
        self.right = Box::new(OrderNode::new(right, right_keys).materialized());
    }

    /// Pushes the requested order and records what stays pending
    fn place_order(&mut self, order: Option<OrderExpression>) -> Result<Option<OrderExpression>> {
        let Some(order) = order else {
            return Ok(None);
        };
        if let Some(JoinStrategy::Merge(pairs)) = &self.strategy {
            let keys = OrderExpression::asc(pairs.iter().map(|p| p.left.clone()).collect());
            return Ok(protocol::residual_order(Some(&order), &keys));
        }
        let left_fields = self.left.fields();
        let mut on_left = true;
        for term in &order.terms {
            if !term.expression.resolves_within(&left_fields)? {
                on_left = false;
            }
        }
        if on_left {
            self.left.add_order(order.clone())?;
            Ok(None)
        } else {
            Ok(Some(order))
        }
    }
}

impl Node for JoinNode<'_> {
    fn name(&self) -> String {
        match &self.condition {
            Some(condition) => format!("Join({})", condition),
            None => "CrossJoin".to_string(),
        }
    }

    fn fields(&self) -> Arc<[Field]> {
        self.fields.clone()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        protocol::push_filter(&mut self.pushed_filter, filter);
        Ok(())
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        protocol::push_order(&mut self.pushed_order, order);
        Ok(())
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        protocol::begin_optimize(&mut self.optimized, &name)?;
        let fields = self.fields.clone();
        if let Some(condition) = &self.condition {
            protocol::validate_references(condition, &fields)?;
            self.condition = Some(condition.qualify(&fields)?);
        }
        let pushed = match self.pushed_filter.take() {
            Some(pushed) => Some(pushed.qualify(&fields)?),
            None => None,
        };
        let combined = protocol::fold_filter(filter::union([self.condition.as_ref(), pushed.as_ref()]));

        let left_fields = self.left.fields();
        let right_fields = self.right.fields();
        let mut parts = partition(
            filter::conjunctions(combined.as_ref()),
            &left_fields,
            &right_fields,
        )?;
        let pairs = equi_pairs(&parts.straddling, &left_fields, &right_fields)?;
        let strategy = self.choose(pairs);
        match &strategy {
            JoinStrategy::NestedLoop => parts.right.append(&mut parts.straddling),
            JoinStrategy::Merge(pairs) => self.wrap_for_merge(pairs),
            JoinStrategy::Hash(_) => {}
        }
        debug!("{}: {}", self.name(), strategy);
        self.strategy = Some(strategy);

        if let Some(left) = filter::and_all(parts.left) {
            self.left.add_filter(left)?;
        }
        if let Some(right) = filter::and_all(parts.right) {
            self.right.add_filter(right)?;
        }
        let order = match self.pushed_order.take() {
            Some(order) => Some(order.qualify(&fields)?),
            None => None,
        };
        let pending = self.place_order(order.clone())?;
        self.pushed_order = order;

        self.left.optimize()?;
        self.right.optimize()?;
        self.left_residual = self.left.filter();
        self.right_residual = self.right.filter();
        self.residual_order = match pending {
            Some(pending) => Some(pending),
            None if self.left.ordering().is_some() => self.pushed_order.clone(),
            None => None,
        };
        debug!(
            "{}: {} residual conjunct(s) on the left, {} on the right",
            self.name(),
            filter::conjunction_count(self.left_residual.as_ref()),
            filter::conjunction_count(self.right_residual.as_ref()),
        );
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        None
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.residual_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        false
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        let left = FilteredScanner::wrap(self.left.scanner(ctx)?, self.left_residual.clone(), ctx);
        match &self.strategy {
            Some(JoinStrategy::Hash(pairs)) => {
                let right =
                    FilteredScanner::wrap(self.right.scanner(ctx)?, self.right_residual.clone(), ctx);
                Ok(Box::new(HashJoinScanner::new(
                    left,
                    right,
                    pairs,
                    ctx,
                    self.fields.clone(),
                )))
            }
            Some(JoinStrategy::Merge(pairs)) => {
                let right =
                    FilteredScanner::wrap(self.right.scanner(ctx)?, self.right_residual.clone(), ctx);
                Ok(Box::new(MergeJoinScanner::new(
                    left,
                    right,
                    pairs,
                    ctx,
                    self.fields.clone(),
                )))
            }
            Some(JoinStrategy::NestedLoop) => Ok(Box::new(NestedLoopScanner::new(
                left,
                self.right.as_ref(),
                self.right_residual.as_ref(),
                ctx,
                self.fields.clone(),
            ))),
            None => Err(QueryError::NotOptimized(self.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::collect_rows;
    use shared::value::DataType;

    fn values(relation: &str, column: &str, rows: &[i64]) -> Box<ValuesNode> {
        Box::new(
            ValuesNode::new(
                vec![Field::new(Some(relation), column, DataType::Int)],
                rows.iter().map(|v| vec![Value::Int(*v)]).collect(),
            )
            .unwrap(),
        )
    }

    fn pairs_of(node: &JoinNode<'_>) -> Vec<(Value, Value)> {
        let rows = collect_rows(node.scanner(&ExecutionContext::new()).unwrap().as_mut()).unwrap();
        rows.iter()
            .map(|r| (r.values()[0].clone(), r.values()[1].clone()))
            .collect()
    }

    #[test]
    fn test_partition_conjuncts() {
        let left = [Field::new(Some("l"), "a", DataType::Int)];
        let right = [Field::new(Some("r"), "x", DataType::Int)];
        let parts = partition(
            vec![
                Expression::greater(Expression::field("l.a"), Expression::constant(1)),
                Expression::greater(Expression::field("r.x"), Expression::constant(1)),
                Expression::equals(Expression::field("r.x"), Expression::field("l.a")),
                Expression::constant(true),
            ],
            &left,
            &right,
        )
        .unwrap();
        assert_eq!(parts.left.len(), 2);
        assert_eq!(parts.right.len(), 1);
        assert_eq!(parts.straddling.len(), 1);

        let pairs = equi_pairs(&parts.straddling, &left, &right).unwrap().unwrap();
        assert_eq!(pairs[0].left, Expression::field("l.a"));
        assert_eq!(pairs[0].right, Expression::field("r.x"));
    }

    #[test]
    fn test_non_equi_falls_back_to_nested_loop() {
        let mut node = JoinNode::new(
            values("l", "a", &[1, 2]),
            values("r", "x", &[1, 2, 3]),
            Some(Expression::less(Expression::field("a"), Expression::field("x"))),
        );
        node.optimize().unwrap();
        assert_eq!(node.strategy(), Some(&JoinStrategy::NestedLoop));
        assert_eq!(
            pairs_of(&node),
            vec![
                (Value::Int(1), Value::Int(2)),
                (Value::Int(1), Value::Int(3)),
                (Value::Int(2), Value::Int(3)),
            ]
        );
    }

    #[test]
    fn test_equi_join_strategies_agree() {
        let expected = vec![
            (Value::Int(1), Value::Int(1)),
            (Value::Int(2), Value::Int(2)),
            (Value::Int(2), Value::Int(2)),
        ];
        for kind in [
            JoinStrategyKind::NestedLoop,
            JoinStrategyKind::Hash,
            JoinStrategyKind::Merge,
        ] {
            let mut node = JoinNode::new(
                values("l", "a", &[2, 1, 7]),
                values("r", "x", &[2, 1, 2, 3]),
                Some(Expression::equals(Expression::field("a"), Expression::field("x"))),
            )
            .with_config(JoinConfig { strategy: kind });
            node.optimize().unwrap();
            let mut got = pairs_of(&node);
            got.sort();
            assert_eq!(got, expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_cross_join() {
        let mut node = JoinNode::new(values("l", "a", &[1, 2]), values("r", "x", &[3, 4]), None);
        node.optimize().unwrap();
        assert_eq!(pairs_of(&node).len(), 4);
        assert_eq!(node.name(), "CrossJoin");
    }
}
