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
use crate::scanner::{FilteredScanner, Scanner};
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::{resolve, Field};
use shared::order::OrderExpression;
use shared::row::Row;
use std::sync::Arc;

/// SELECT list: computes one output column per expression
pub struct ProjectionNode<'t> {
    child: Box<dyn Node + 't>,
    expressions: Vec<Expression>,
    fields: Arc<[Field]>,
    pushed_filter: Option<Expression>,
    pushed_order: Option<OrderExpression>,
    kept: Option<Expression>,
    residual: Option<Expression>,
    order_pending: bool,
    optimized: bool,
}

impl<'t> ProjectionNode<'t> {
    /// `columns` pairs an output name with its defining expression. A plain
    /// reference to a child column keeps that column's relation.
    pub fn new(child: Box<dyn Node + 't>, columns: Vec<(String, Expression)>) -> Self {
        let child_fields = child.fields();
        let mut fields = Vec::with_capacity(columns.len());
        let mut expressions = Vec::with_capacity(columns.len());
        for (name, expression) in columns {
            let relation = match &expression {
                Expression::Field(reference) => match resolve(&child_fields, reference) {
                    Ok(Some(position)) => child_fields[position].relation.clone(),
                    _ => None,
                },
                _ => None,
            };
            fields.push(Field {
                relation,
                name,
                data_type: expression.data_type(&child_fields),
                internal: false,
            });
            expressions.push(expression);
        }
        Self {
            child,
            expressions,
            fields: fields.into(),
            pushed_filter: None,
            pushed_order: None,
            kept: None,
            residual: None,
            order_pending: false,
            optimized: false,
        }
    }

    /// Replaces references to output columns by their defining expressions
    fn unproject(&self, expression: &Expression) -> Result<Expression> {
        expression.try_map(&mut |e| match e {
            Expression::Field(reference) => {
                Ok(resolve(&self.fields, reference)?.map(|position| self.expressions[position].clone()))
            }
            _ => Ok(None),
        })
    }
}

impl Node for ProjectionNode<'_> {
    fn name(&self) -> String {
        let names: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
        format!("Projection({})", names.join(", "))
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
        let child_fields = self.child.fields();
        for expression in self.expressions.iter_mut() {
            protocol::validate_references(expression, &child_fields)?;
            *expression = expression.qualify(&child_fields)?;
        }
        if let Some(pushed) = self.pushed_filter.take() {
            let (forward, kept) = protocol::split_captured(&pushed, &self.fields, &child_fields)?;
            if let Some(forward) = forward {
                let mapped = self.unproject(&forward)?;
                self.child.add_filter(mapped)?;
            }
            // outer references the child would shadow; checked by whoever pushed them
            self.kept = kept;
        }
        if let Some(order) = &self.pushed_order {
            let mapped = order.try_map(&mut |e| match e {
                Expression::Field(_) => self.unproject(e).map(Some),
                _ => Ok(None),
            })?;
            self.child.add_order(mapped)?;
        }
        self.child.optimize()?;
        self.residual = self.child.filter();
        self.order_pending = self.child.ordering().is_some();
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        self.kept.clone()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        if self.order_pending {
            self.pushed_order.clone()
        } else {
            None
        }
    }

    fn supports_mark_restore(&self) -> bool {
        self.child.supports_mark_restore()
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        let child = self.child.scanner(ctx)?;
        Ok(Box::new(ProjectionScanner {
            child: FilteredScanner::wrap(child, self.residual.clone(), ctx),
            expressions: &self.expressions,
            fields: self.fields.clone(),
            ctx: ctx.clone(),
        }))
    }
}

struct ProjectionScanner<'s> {
    child: Box<dyn Scanner + 's>,
    expressions: &'s [Expression],
    fields: Arc<[Field]>,
    ctx: ExecutionContext,
}

impl Scanner for ProjectionScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.scan()? else {
            return Ok(None);
        };
        let values = self
            .expressions
            .iter()
            .map(|expression| expression.value_from(&self.ctx, &row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Row::new(self.fields.clone(), values)?))
    }

    fn mark(&mut self) -> Result<()> {
        self.child.mark()
    }

    fn restore(&mut self) -> Result<()> {
        self.child.restore()
    }
}
