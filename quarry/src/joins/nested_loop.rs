/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::plan::Node;
use crate::scanner::{FilteredScanner, Scanner};
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::row::Row;
use std::sync::Arc;

/// For every left row, opens a fresh scanner on the right input with that
/// row as the innermost outer row, so right-side index bounds and
/// predicates can refer to it.
pub struct NestedLoopScanner<'s> {
    left: Box<dyn Scanner + 's>,
    right: &'s dyn Node,
    right_residual: Option<&'s Expression>,
    ctx: ExecutionContext,
    fields: Arc<[Field]>,
    current: Option<(Row, Box<dyn Scanner + 's>)>,
}

impl<'s> NestedLoopScanner<'s> {
    pub fn new(
        left: Box<dyn Scanner + 's>,
        right: &'s dyn Node,
        right_residual: Option<&'s Expression>,
        ctx: &ExecutionContext,
        fields: Arc<[Field]>,
    ) -> Self {
        Self {
            left,
            right,
            right_residual,
            ctx: ctx.clone(),
            fields,
            current: None,
        }
    }
}

impl Scanner for NestedLoopScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some((left, inner)) = &mut self.current {
                if let Some(right) = inner.scan()? {
                    return Ok(Some(left.concat(&right, self.fields.clone())?));
                }
                self.current = None;
            }
            let Some(left) = self.left.scan()? else {
                return Ok(None);
            };
            let correlated = self.ctx.with_outer_row(left.clone());
            let inner = FilteredScanner::wrap(
                self.right.scanner(&correlated)?,
                self.right_residual.cloned(),
                &correlated,
            );
            self.current = Some((left, inner));
        }
    }
}
