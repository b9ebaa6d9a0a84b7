/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::error::{QueryError, Result};
use crate::field::FieldRef;
use crate::row::Row;
use crate::value::Value;

/// Evaluation environment carrying the outer rows of enclosing scans.
///
/// A nested-loop join hands its current left row to the right side through
/// [`ExecutionContext::with_outer_row`]; fields that the current row does not
/// produce are looked up in the outer rows, innermost first.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    outer_rows: Vec<Row>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outer_row(&self, row: Row) -> Self {
        let mut outer_rows = self.outer_rows.clone();
        outer_rows.push(row);
        Self { outer_rows }
    }

    pub fn outer_rows(&self) -> &[Row] {
        &self.outer_rows
    }

    pub fn lookup(&self, row: Option<&Row>, reference: &FieldRef) -> Result<Value> {
        if let Some(row) = row {
            if let Some(value) = row.lookup(reference)? {
                return Ok(value.clone());
            }
        }
        for outer in self.outer_rows.iter().rev() {
            if let Some(value) = outer.lookup(reference)? {
                return Ok(value.clone());
            }
        }
        Err(QueryError::UnknownField(reference.to_string()))
    }
}
