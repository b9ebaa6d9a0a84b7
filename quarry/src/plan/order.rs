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
use log::debug;
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::order::OrderExpression;
use std::sync::Arc;

/// ORDER BY. Asks the child for the order first and sorts only when the
/// child cannot provide it.
pub struct OrderNode<'t> {
    child: Box<dyn Node + 't>,
    order: OrderExpression,
    materialize: bool,
    pushed: Option<OrderExpression>,
    needs_sort: bool,
    optimized: bool,
}

impl<'t> OrderNode<'t> {
    pub fn new(child: Box<dyn Node + 't>, order: OrderExpression) -> Self {
        Self {
            child,
            order,
            materialize: false,
            pushed: None,
            needs_sort: false,
            optimized: false,
        }
    }

    /// Buffers the child even when no sort is needed, so scanners always
    /// support mark/restore
    pub fn materialized(mut self) -> Self {
        self.materialize = true;
        self
    }

    /// Whether the scanner sorts, known after optimization
    pub fn needs_sort(&self) -> bool {
        self.needs_sort
    }
}

impl Node for OrderNode<'_> {
    fn name(&self) -> String {
        format!("Order({})", self.order)
    }

    fn fields(&self) -> Arc<[Field]> {
        self.child.fields()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        self.child.add_filter(filter)
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        protocol::push_order(&mut self.pushed, order);
        Ok(())
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        protocol::begin_optimize(&mut self.optimized, &name)?;
        let fields = self.child.fields();
        protocol::validate_order(&self.order, &fields)?;
        self.order = self.order.qualify(&fields)?.fold();
        if !self.order.is_empty() {
            self.child.add_order(self.order.clone())?;
        }
        self.child.optimize()?;
        self.needs_sort = !self.order.is_empty() && self.child.ordering().is_some();
        debug!(
            "{}: {}",
            self.name(),
            if self.needs_sort {
                "sorting"
            } else {
                "order provided by child"
            }
        );
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        self.child.filter()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        protocol::residual_order(self.pushed.as_ref(), &self.order)
    }

    fn supports_mark_restore(&self) -> bool {
        self.needs_sort || self.materialize || self.child.supports_mark_restore()
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        let mut child = self.child.scanner(ctx)?;
        if !self.needs_sort && (!self.materialize || self.child.supports_mark_restore()) {
            return Ok(child);
        }
        let mut keyed = Vec::new();
        while let Some(row) = child.scan()? {
            let key = self.order.sort_key(ctx, &row)?;
            keyed.push((key, row));
        }
        if self.needs_sort {
            keyed.sort_by(|(a, _), (b, _)| self.order.compare_keys(a, b));
        }
        Ok(Box::new(RowsScanner::new(
            keyed.into_iter().map(|(_, row)| row).collect(),
        )))
    }
}
