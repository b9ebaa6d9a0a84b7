/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::Index;
use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::row::Row;

/// Index over the rows satisfying `condition` only
#[derive(Debug, Clone)]
pub struct PartialIndex {
    condition: Expression,
    index: Box<Index>,
}

impl PartialIndex {
    pub fn new(condition: Expression, index: Index) -> Result<Self> {
        if let Index::Partial(_) = index {
            return Err(QueryError::InvalidIndex {
                name: index.name().to_string(),
                reason: "a partial index cannot wrap another partial index".to_string(),
            });
        }
        Ok(Self {
            condition,
            index: Box::new(index),
        })
    }

    pub fn condition(&self) -> &Expression {
        &self.condition
    }

    pub(crate) fn condition_mut(&mut self) -> &mut Expression {
        &mut self.condition
    }

    pub fn inner(&self) -> &Index {
        &self.index
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    /// false and NULL both exclude the row
    pub fn covers(&self, row: &Row) -> Result<bool> {
        self.condition.holds(&ExecutionContext::new(), row)
    }

    pub fn insert(&mut self, row: &Row) -> Result<()> {
        if self.covers(row)? {
            self.index.insert(row)?;
        }
        Ok(())
    }

    pub fn delete(&mut self, row: &Row) -> Result<bool> {
        if self.covers(row)? {
            self.index.delete(row)
        } else {
            Ok(false)
        }
    }
}
