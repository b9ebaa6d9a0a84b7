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
use crate::access::{select_access_strategy, AccessStrategy};
use crate::config::AccessConfig;
use crate::scanner::Scanner;
use crate::table::Table;
use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::field::Field;
use shared::filter;
use shared::order::OrderExpression;
use std::sync::Arc;

/// Leaf reading a table through the best available access path.
///
/// Pushed predicates and orders are handed to access selection; whatever the
/// chosen strategy does not enforce is reported upward.
pub struct AccessNode<'t> {
    table: &'t Table,
    config: AccessConfig,
    pushed_filter: Option<Expression>,
    pushed_order: Option<OrderExpression>,
    strategy: Option<AccessStrategy<'t>>,
    residual_filter: Option<Expression>,
    residual_order: Option<OrderExpression>,
    optimized: bool,
}

impl<'t> AccessNode<'t> {
    pub fn new(table: &'t Table) -> Self {
        Self::with_config(table, AccessConfig::default())
    }

    pub fn with_config(table: &'t Table, config: AccessConfig) -> Self {
        Self {
            table,
            config,
            pushed_filter: None,
            pushed_order: None,
            strategy: None,
            residual_filter: None,
            residual_order: None,
            optimized: false,
        }
    }

    /// The chosen strategy, once optimized
    pub fn strategy(&self) -> Option<&AccessStrategy<'t>> {
        self.strategy.as_ref()
    }
}

impl Node for AccessNode<'_> {
    fn name(&self) -> String {
        format!("Access({})", self.table.name())
    }

    fn fields(&self) -> Arc<[Field]> {
        self.table.fields().clone()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        let qualified = filter.qualify(self.table.fields())?;
        protocol::push_filter(&mut self.pushed_filter, qualified);
        Ok(())
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        let qualified = order.qualify(self.table.fields())?;
        protocol::push_order(&mut self.pushed_order, qualified.fold());
        Ok(())
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        protocol::begin_optimize(&mut self.optimized, &name)?;
        let pushed = protocol::fold_filter(self.pushed_filter.take());
        let strategy = select_access_strategy(
            self.table,
            pushed.as_ref(),
            self.pushed_order.as_ref(),
            &self.config,
        )?;
        self.residual_filter = filter::difference(pushed.as_ref(), strategy.filter());
        self.residual_order =
            protocol::residual_order(self.pushed_order.as_ref(), &strategy.ordering());
        self.pushed_filter = pushed;
        self.strategy = Some(strategy);
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        self.residual_filter.clone()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.residual_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        false
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        match &self.strategy {
            Some(strategy) => strategy.scanner(ctx),
            None => Err(QueryError::NotOptimized(self.name())),
        }
    }
}
