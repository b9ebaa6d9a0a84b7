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
use shared::field::Field;
use shared::filter;
use shared::order::OrderExpression;
use std::sync::Arc;

/// WHERE clause. Pushes its predicate, together with anything pushed into
/// it, down to the child and evaluates only what the child leaves.
pub struct FilterNode<'t> {
    child: Box<dyn Node + 't>,
    predicate: Expression,
    pushed: Option<Expression>,
    residual: Option<Expression>,
    optimized: bool,
}

impl<'t> FilterNode<'t> {
    pub fn new(child: Box<dyn Node + 't>, predicate: Expression) -> Self {
        Self {
            child,
            predicate,
            pushed: None,
            residual: None,
            optimized: false,
        }
    }

    /// Predicate evaluated by this node after optimization
    pub fn residual(&self) -> Option<&Expression> {
        self.residual.as_ref()
    }
}

impl Node for FilterNode<'_> {
    fn name(&self) -> String {
        format!("Filter({})", self.predicate)
    }

    fn fields(&self) -> Arc<[Field]> {
        self.child.fields()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        protocol::push_filter(&mut self.pushed, filter);
        Ok(())
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        self.child.add_order(order)
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        protocol::begin_optimize(&mut self.optimized, &name)?;
        let fields = self.child.fields();
        protocol::validate_references(&self.predicate, &fields)?;
        self.predicate = self.predicate.qualify(&fields)?;

        let combined = filter::union([Some(&self.predicate), self.pushed.as_ref()]);
        if let Some(combined) = protocol::fold_filter(combined) {
            self.child.add_filter(combined)?;
        }
        self.child.optimize()?;
        self.residual = self.child.filter();
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        None
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.child.ordering()
    }

    fn supports_mark_restore(&self) -> bool {
        self.child.supports_mark_restore()
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        let child = self.child.scanner(ctx)?;
        Ok(FilteredScanner::wrap(child, self.residual.clone(), ctx))
    }
}
