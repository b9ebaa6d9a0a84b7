/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::row::Row;

/// Pull-based row stream.
///
/// `Ok(None)` marks the end of the stream. Errors are returned as they occur
/// and the scanner should not be polled again afterwards.
pub trait Scanner {
    fn scan(&mut self) -> Result<Option<Row>>;

    /// Remembers the position of the next row to be returned
    fn mark(&mut self) -> Result<()> {
        Err(QueryError::MarkRestoreUnsupported)
    }

    /// Rewinds to the last mark
    fn restore(&mut self) -> Result<()> {
        Err(QueryError::MarkRestoreUnsupported)
    }
}

/// Drains a scanner into a vector
pub fn collect_rows(scanner: &mut dyn Scanner) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = scanner.scan()? {
        rows.push(row);
    }
    Ok(rows)
}

/// Materialized rows, supports mark/restore
pub struct RowsScanner {
    rows: Vec<Row>,
    position: usize,
    mark: Option<usize>,
}

impl RowsScanner {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            position: 0,
            mark: None,
        }
    }
}

impl Scanner for RowsScanner {
    fn scan(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn mark(&mut self) -> Result<()> {
        self.mark = Some(self.position);
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        self.position = self.mark.unwrap_or(0);
        Ok(())
    }
}

pub struct EmptyScanner;

impl Scanner for EmptyScanner {
    fn scan(&mut self) -> Result<Option<Row>> {
        Ok(None)
    }

    fn mark(&mut self) -> Result<()> {
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Passes through rows for which `predicate` holds
pub struct FilteredScanner<'s> {
    inner: Box<dyn Scanner + 's>,
    predicate: Expression,
    ctx: ExecutionContext,
}

impl<'s> FilteredScanner<'s> {
    /// Returns `inner` unchanged when there is nothing to check
    pub fn wrap(
        inner: Box<dyn Scanner + 's>,
        predicate: Option<Expression>,
        ctx: &ExecutionContext,
    ) -> Box<dyn Scanner + 's> {
        match predicate {
            None => inner,
            Some(predicate) => Box::new(Self {
                inner,
                predicate,
                ctx: ctx.clone(),
            }),
        }
    }
}

impl Scanner for FilteredScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.inner.scan()? {
            if self.predicate.holds(&self.ctx, &row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn mark(&mut self) -> Result<()> {
        self.inner.mark()
    }

    fn restore(&mut self) -> Result<()> {
        self.inner.restore()
    }
}
