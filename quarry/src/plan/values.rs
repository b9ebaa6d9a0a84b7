/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::protocol;
use super::Node;
use crate::scanner::{RowsScanner, Scanner};
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::order::OrderExpression;
use shared::row::Row;
use shared::value::Value;
use std::sync::Arc;

/// Inline rows. Enforces pushed predicates itself, never provides an order.
pub struct ValuesNode {
    fields: Arc<[Field]>,
    rows: Vec<Row>,
    pushed_filter: Option<Expression>,
    pushed_order: Option<OrderExpression>,
    optimized: bool,
}

impl ValuesNode {
    pub fn new(fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let fields: Arc<[Field]> = fields.into();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(fields.clone(), values))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            fields,
            rows,
            pushed_filter: None,
            pushed_order: None,
            optimized: false,
        })
    }

    /// No rows, same shape
    pub fn empty(fields: Arc<[Field]>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
            pushed_filter: None,
            pushed_order: None,
            optimized: false,
        }
    }
}

impl Node for ValuesNode {
    fn name(&self) -> String {
        format!("Values({} rows)", self.rows.len())
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
        self.pushed_filter = match protocol::fold_filter(self.pushed_filter.take()) {
            Some(filter) => Some(filter.qualify(&self.fields)?),
            None => None,
        };
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        None
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.pushed_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        true
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        let rows = match &self.pushed_filter {
            None => self.rows.clone(),
            Some(predicate) => {
                let mut kept = Vec::new();
                for row in &self.rows {
                    if predicate.holds(ctx, row)? {
                        kept.push(row.clone());
                    }
                }
                kept
            }
        };
        Ok(Box::new(RowsScanner::new(rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::collect_rows;
    use shared::value::DataType;

    #[test]
    fn test_values_enforce_pushed_filter() {
        let mut node = ValuesNode::new(
            vec![Field::new(Some("v"), "a", DataType::Int)],
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
        )
        .unwrap();
        node.add_filter(Expression::greater(Expression::field("a"), Expression::constant(1)))
            .unwrap();
        node.add_order(OrderExpression::asc(vec![Expression::field("a")]))
            .unwrap();
        node.optimize().unwrap();
        assert_eq!(node.filter(), None);
        assert!(node.ordering().is_some());
        let rows = collect_rows(node.scanner(&ExecutionContext::new()).unwrap().as_mut()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_values_arity_checked() {
        let result = ValuesNode::new(
            vec![Field::new(None, "a", DataType::Int)],
            vec![vec![Value::Int(1), Value::Int(2)]],
        );
        assert!(result.is_err());
    }
}
