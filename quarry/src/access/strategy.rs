/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::indexes::{Index, ScanOptions};
use crate::scanner::Scanner;
use crate::table::Table;
use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::order::OrderExpression;
use shared::row::{Row, Tid};
use std::fmt;

/// How an access node reads its table
#[derive(Debug, Clone)]
pub enum AccessStrategy<'t> {
    /// Every row in tid order
    TableScan { table: &'t Table },
    /// Rows located through an index
    IndexScan {
        table: &'t Table,
        index: &'t Index,
        options: ScanOptions,
        /// Conjuncts every produced row is guaranteed to satisfy
        filter: Option<Expression>,
        ordering: OrderExpression,
    },
}

impl<'t> AccessStrategy<'t> {
    pub fn table(&self) -> &'t Table {
        match self {
            AccessStrategy::TableScan { table } => *table,
            AccessStrategy::IndexScan { table, .. } => *table,
        }
    }

    pub fn filter(&self) -> Option<&Expression> {
        match self {
            AccessStrategy::TableScan { .. } => None,
            AccessStrategy::IndexScan { filter, .. } => filter.as_ref(),
        }
    }

    pub fn ordering(&self) -> OrderExpression {
        match self {
            AccessStrategy::TableScan { .. } => OrderExpression::default(),
            AccessStrategy::IndexScan { ordering, .. } => ordering.clone(),
        }
    }

    pub fn index_name(&self) -> Option<&str> {
        match self {
            AccessStrategy::TableScan { .. } => None,
            AccessStrategy::IndexScan { index, .. } => Some(index.name()),
        }
    }

    pub fn options(&self) -> Option<&ScanOptions> {
        match self {
            AccessStrategy::TableScan { .. } => None,
            AccessStrategy::IndexScan { options, .. } => Some(options),
        }
    }

    /// Same access path with the same scan options
    pub fn equivalent(&self, other: &AccessStrategy<'_>) -> bool {
        self.table().name() == other.table().name()
            && self.index_name() == other.index_name()
            && self.options() == other.options()
    }

    pub fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        match self {
            AccessStrategy::TableScan { table } => Ok(Box::new(TableScanner {
                table: *table,
                tids: table.tids(),
                position: 0,
            })),
            AccessStrategy::IndexScan {
                table,
                index,
                options,
                ..
            } => Ok(Box::new(IndexScanner {
                table: *table,
                index_name: index.name(),
                tids: index.scan(options, ctx)?,
            })),
        }
    }
}

impl fmt::Display for AccessStrategy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessStrategy::TableScan { table } => write!(f, "table scan of {}", table.name()),
            AccessStrategy::IndexScan {
                table,
                index,
                options,
                ..
            } => write!(
                f,
                "index scan of {} using {} ({:?})",
                table.name(),
                index.name(),
                options
            ),
        }
    }
}

/// Serves a tid snapshot taken when the scanner was created
struct TableScanner<'t> {
    table: &'t Table,
    tids: Vec<Tid>,
    position: usize,
}

impl Scanner for TableScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        while let Some(tid) = self.tids.get(self.position) {
            self.position += 1;
            if let Some(row) = self.table.row(*tid) {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }
}

struct IndexScanner<'s> {
    table: &'s Table,
    index_name: &'s str,
    tids: Box<dyn Iterator<Item = Tid> + 's>,
}

impl Scanner for IndexScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        let Some(tid) = self.tids.next() else {
            return Ok(None);
        };
        match self.table.row(tid) {
            Some(row) => Ok(Some(row.clone())),
            None => Err(QueryError::MissingRow {
                table: self.table.name().to_string(),
                index: self.index_name.to_string(),
                tid,
            }),
        }
    }
}
