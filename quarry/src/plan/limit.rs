/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! LIMIT and OFFSET. Both are pushdown boundaries: filtering or reordering
//! below them would change which rows are counted, so anything pushed into
//! them stays here and is reported back as pending.

use super::protocol;
use super::Node;
use crate::scanner::{FilteredScanner, Scanner};
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::order::OrderExpression;
use shared::row::Row;
use std::sync::Arc;

/// State common to both boundary nodes
struct Boundary<'t> {
    child: Box<dyn Node + 't>,
    pushed_filter: Option<Expression>,
    pushed_order: Option<OrderExpression>,
    child_residual: Option<Expression>,
    optimized: bool,
}

impl<'t> Boundary<'t> {
    fn new(child: Box<dyn Node + 't>) -> Self {
        Self {
            child,
            pushed_filter: None,
            pushed_order: None,
            child_residual: None,
            optimized: false,
        }
    }

    fn add_filter(&mut self, filter: Expression, name: &str) -> Result<()> {
        protocol::guard_open(self.optimized, name)?;
        protocol::push_filter(&mut self.pushed_filter, filter);
        Ok(())
    }

    fn add_order(&mut self, order: OrderExpression, name: &str) -> Result<()> {
        protocol::guard_open(self.optimized, name)?;
        protocol::push_order(&mut self.pushed_order, order);
        Ok(())
    }

    fn optimize(&mut self, name: &str) -> Result<()> {
        protocol::begin_optimize(&mut self.optimized, name)?;
        self.child.optimize()?;
        self.child_residual = self.child.filter();
        Ok(())
    }

    fn child_scanner<'s>(&'s self, ctx: &ExecutionContext, name: &str) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, name)?;
        let child = self.child.scanner(ctx)?;
        Ok(FilteredScanner::wrap(child, self.child_residual.clone(), ctx))
    }
}

pub struct LimitNode<'t> {
    boundary: Boundary<'t>,
    count: usize,
}

impl<'t> LimitNode<'t> {
    pub fn new(child: Box<dyn Node + 't>, count: usize) -> Self {
        Self {
            boundary: Boundary::new(child),
            count,
        }
    }
}

impl Node for LimitNode<'_> {
    fn name(&self) -> String {
        format!("Limit({})", self.count)
    }

    fn fields(&self) -> Arc<[Field]> {
        self.boundary.child.fields()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        let name = self.name();
        self.boundary.add_filter(filter, &name)
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        let name = self.name();
        self.boundary.add_order(order, &name)
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        self.boundary.optimize(&name)
    }

    fn filter(&self) -> Option<Expression> {
        self.boundary.pushed_filter.clone()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.boundary.pushed_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        false
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        Ok(Box::new(LimitScanner {
            child: self.boundary.child_scanner(ctx, &self.name())?,
            remaining: self.count,
        }))
    }
}

struct LimitScanner<'s> {
    child: Box<dyn Scanner + 's>,
    remaining: usize,
}

impl Scanner for LimitScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let row = self.child.scan()?;
        if row.is_some() {
            self.remaining -= 1;
        }
        Ok(row)
    }
}

pub struct OffsetNode<'t> {
    boundary: Boundary<'t>,
    count: usize,
}

impl<'t> OffsetNode<'t> {
    pub fn new(child: Box<dyn Node + 't>, count: usize) -> Self {
        Self {
            boundary: Boundary::new(child),
            count,
        }
    }
}

impl Node for OffsetNode<'_> {
    fn name(&self) -> String {
        format!("Offset({})", self.count)
    }

    fn fields(&self) -> Arc<[Field]> {
        self.boundary.child.fields()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        let name = self.name();
        self.boundary.add_filter(filter, &name)
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        let name = self.name();
        self.boundary.add_order(order, &name)
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        self.boundary.optimize(&name)
    }

    fn filter(&self) -> Option<Expression> {
        self.boundary.pushed_filter.clone()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.boundary.pushed_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        false
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        Ok(Box::new(OffsetScanner {
            child: self.boundary.child_scanner(ctx, &self.name())?,
            skip: self.count,
        }))
    }
}

struct OffsetScanner<'s> {
    child: Box<dyn Scanner + 's>,
    skip: usize,
}

impl Scanner for OffsetScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        while self.skip > 0 {
            if self.child.scan()?.is_none() {
                self.skip = 0;
                return Ok(None);
            }
            self.skip -= 1;
        }
        self.child.scan()
    }
}
