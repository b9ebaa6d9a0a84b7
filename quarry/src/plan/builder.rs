/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{
    optimize_and_execute, AccessNode, AliasNode, FilterNode, LimitNode, Node, OffsetNode,
    OrderNode, ProjectionNode, UnionNode, ValuesNode,
};
use crate::config::PlannerConfig;
use crate::joins::JoinNode;
use crate::table::Table;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::order::OrderExpression;
use shared::row::Row;
use shared::value::Value;

/// Fluent construction of a plan tree, bottom-up.
///
/// ```ignore
/// let rows = PlanBuilder::scan(&table)
///     .filter(Expression::greater(Expression::field("a"), Expression::constant(1)))
///     .order_by(OrderExpression::asc(vec![Expression::field("a")]))
///     .execute()?;
/// ```
pub struct PlanBuilder<'t> {
    node: Box<dyn Node + 't>,
    config: PlannerConfig,
}

impl<'t> PlanBuilder<'t> {
    pub fn scan(table: &'t Table) -> Self {
        Self::scan_with_config(table, PlannerConfig::default())
    }

    pub fn scan_with_config(table: &'t Table, config: PlannerConfig) -> Self {
        Self {
            node: Box::new(AccessNode::with_config(table, config.access)),
            config,
        }
    }

    pub fn values(fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Result<Self> {
        Ok(Self {
            node: Box::new(ValuesNode::new(fields, rows)?),
            config: PlannerConfig::default(),
        })
    }

    /// Wraps an already built node
    pub fn from_node(node: Box<dyn Node + 't>, config: PlannerConfig) -> Self {
        Self { node, config }
    }

    fn wrap<N: Node + 't>(self, build: impl FnOnce(Box<dyn Node + 't>) -> N) -> Self {
        Self {
            node: Box::new(build(self.node)),
            config: self.config,
        }
    }

    pub fn filter(self, predicate: Expression) -> Self {
        self.wrap(|child| FilterNode::new(child, predicate))
    }

    pub fn order_by(self, order: OrderExpression) -> Self {
        self.wrap(|child| OrderNode::new(child, order))
    }

    pub fn project(self, columns: Vec<(&str, Expression)>) -> Self {
        let columns = columns
            .into_iter()
            .map(|(name, expression)| (name.to_string(), expression))
            .collect();
        self.wrap(|child| ProjectionNode::new(child, columns))
    }

    pub fn limit(self, count: usize) -> Self {
        self.wrap(|child| LimitNode::new(child, count))
    }

    pub fn offset(self, count: usize) -> Self {
        self.wrap(|child| OffsetNode::new(child, count))
    }

    pub fn alias(self, alias: &str) -> Self {
        self.wrap(|child| AliasNode::new(child, alias))
    }

    /// Inner join with `other` on the right; `None` is a cross join
    pub fn join(self, other: PlanBuilder<'t>, on: Option<Expression>) -> Self {
        let join = self.config.join;
        self.wrap(|child| JoinNode::new(child, other.node, on).with_config(join))
    }

    pub fn union_all(self, other: PlanBuilder<'t>) -> Self {
        self.wrap(|child| UnionNode::new(child, other.node))
    }

    pub fn union(self, other: PlanBuilder<'t>) -> Self {
        self.wrap(|child| UnionNode::new(child, other.node).distinct())
    }

    pub fn build(self) -> Box<dyn Node + 't> {
        self.node
    }

    /// Optimizes the tree and collects every row
    pub fn execute(self) -> Result<Vec<Row>> {
        let mut node = self.node;
        optimize_and_execute(node.as_mut())
    }
}
