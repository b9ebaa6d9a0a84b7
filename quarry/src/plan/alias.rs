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
use crate::scanner::Scanner;
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::filter;
use shared::order::OrderExpression;
use shared::row::Row;
use std::sync::Arc;

/// `child AS alias`: renames the relation of every output column.
///
/// Pushdowns are rewritten into the child's names and forwarded right away;
/// whatever the child leaves is rewritten back into aliased names. A
/// conjunct reading an outer column the child would mistake for its own is
/// kept here and reported as residual.
pub struct AliasNode<'t> {
    child: Box<dyn Node + 't>,
    alias: String,
    fields: Arc<[Field]>,
    kept_filter: Option<Expression>,
    residual_filter: Option<Expression>,
    residual_order: Option<OrderExpression>,
    optimized: bool,
}

impl<'t> AliasNode<'t> {
    pub fn new(child: Box<dyn Node + 't>, alias: &str) -> Self {
        let fields: Arc<[Field]> = child
            .fields()
            .iter()
            .map(|field| field.with_relation(Some(alias)))
            .collect();
        Self {
            child,
            alias: alias.to_string(),
            fields,
            kept_filter: None,
            residual_filter: None,
            residual_order: None,
            optimized: false,
        }
    }
}

impl Node for AliasNode<'_> {
    fn name(&self) -> String {
        format!("Alias({})", self.alias)
    }

    fn fields(&self) -> Arc<[Field]> {
        self.fields.clone()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        let child_fields = self.child.fields();
        let (forward, kept) = protocol::split_captured(&filter, &self.fields, &child_fields)?;
        if let Some(kept) = kept {
            protocol::push_filter(&mut self.kept_filter, kept);
        }
        match forward {
            Some(forward) => self.child.add_filter(forward.alias(&self.fields, &child_fields)?),
            None => Ok(()),
        }
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        let renamed = order.alias(&self.fields, &self.child.fields())?;
        self.child.add_order(renamed)
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        protocol::begin_optimize(&mut self.optimized, &name)?;
        self.child.optimize()?;
        let child_fields = self.child.fields();
        let child_residual = match self.child.filter() {
            Some(residual) => Some(residual.alias(&child_fields, &self.fields)?),
            None => None,
        };
        self.residual_filter = filter::union([self.kept_filter.as_ref(), child_residual.as_ref()]);
        self.residual_order = match self.child.ordering() {
            Some(order) => Some(order.alias(&child_fields, &self.fields)?),
            None => None,
        };
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        self.residual_filter.clone()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.residual_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        self.child.supports_mark_restore()
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        Ok(Box::new(AliasScanner {
            child: self.child.scanner(ctx)?,
            fields: self.fields.clone(),
        }))
    }
}

struct AliasScanner<'s> {
    child: Box<dyn Scanner + 's>,
    fields: Arc<[Field]>,
}

impl Scanner for AliasScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        match self.child.scan()? {
            Some(row) => Ok(Some(row.reshape(self.fields.clone())?)),
            None => Ok(None),
        }
    }

    fn mark(&mut self) -> Result<()> {
        self.child.mark()
    }

    fn restore(&mut self) -> Result<()> {
        self.child.restore()
    }
}
