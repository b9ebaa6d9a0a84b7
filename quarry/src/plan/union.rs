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
use log::debug;
use rustc_hash::FxHashSet;
use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::field::Field;
use shared::filter;
use shared::order::OrderExpression;
use shared::row::Row;
use shared::value::Value;
use std::sync::Arc;

/// UNION ALL of two inputs with positionally compatible columns, or UNION
/// when built with [`UnionNode::distinct`].
///
/// A pushed predicate goes to both sides. What both sides leave is reported
/// upward; what only one side leaves is checked here, on that side's rows.
pub struct UnionNode<'t> {
    left: Box<dyn Node + 't>,
    right: Box<dyn Node + 't>,
    fields: Arc<[Field]>,
    distinct: bool,
    pushed_filter: Option<Expression>,
    pushed_order: Option<OrderExpression>,
    reported: Option<Expression>,
    left_local: Option<Expression>,
    right_local: Option<Expression>,
    optimized: bool,
}

impl<'t> UnionNode<'t> {
    pub fn new(left: Box<dyn Node + 't>, right: Box<dyn Node + 't>) -> Self {
        let fields = left.fields();
        Self {
            left,
            right,
            fields,
            distinct: false,
            pushed_filter: None,
            pushed_order: None,
            reported: None,
            left_local: None,
            right_local: None,
            optimized: false,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    fn check_compatible(&self) -> Result<()> {
        let left = self.left.fields();
        let right = self.right.fields();
        if left.len() != right.len() {
            return Err(QueryError::ArityMismatch {
                expected: left.len(),
                found: right.len(),
            });
        }
        for (position, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if !l.data_type.compatible_with(r.data_type) {
                return Err(QueryError::IncompatibleColumnTypes {
                    position,
                    left: l.data_type,
                    right: r.data_type,
                });
            }
        }
        Ok(())
    }

    /// Residual of `child`, rewritten into this node's column names
    fn child_residual(&self, child: &dyn Node) -> Result<Option<Expression>> {
        match child.filter() {
            Some(residual) => Ok(Some(residual.alias(&child.fields(), &self.fields)?)),
            None => Ok(None),
        }
    }
}

impl Node for UnionNode<'_> {
    fn name(&self) -> String {
        if self.distinct {
            "Union".to_string()
        } else {
            "UnionAll".to_string()
        }
    }

    fn fields(&self) -> Arc<[Field]> {
        self.fields.clone()
    }

    fn add_filter(&mut self, filter: Expression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        protocol::push_filter(&mut self.pushed_filter, filter);
        Ok(())
    }

    fn add_order(&mut self, order: OrderExpression) -> Result<()> {
        protocol::guard_open(self.optimized, &self.name())?;
        protocol::push_order(&mut self.pushed_order, order);
        Ok(())
    }

    fn optimize(&mut self) -> Result<()> {
        let name = self.name();
        protocol::begin_optimize(&mut self.optimized, &name)?;
        self.check_compatible()?;
        let mut kept = None;
        if let Some(pushed) = protocol::fold_filter(self.pushed_filter.take()) {
            let left_fields = self.left.fields();
            let right_fields = self.right.fields();
            let mut forward = Vec::new();
            let mut captured = Vec::new();
            for conjunct in filter::conjunctions(Some(&pushed)) {
                if protocol::captures_outer(&conjunct, &self.fields, &left_fields)?
                    || protocol::captures_outer(&conjunct, &self.fields, &right_fields)?
                {
                    captured.push(conjunct);
                } else {
                    forward.push(conjunct);
                }
            }
            kept = filter::and_all(captured);
            if let Some(forward) = filter::and_all(forward) {
                let for_left = forward.alias(&self.fields, &left_fields)?;
                let for_right = forward.alias(&self.fields, &right_fields)?;
                self.left.add_filter(for_left)?;
                self.right.add_filter(for_right)?;
            }
        }
        self.left.optimize()?;
        self.right.optimize()?;

        let left = self.child_residual(self.left.as_ref())?;
        let right = self.child_residual(self.right.as_ref())?;
        self.reported = filter::intersection(left.as_ref(), right.as_ref());
        self.left_local = filter::difference(left.as_ref(), self.reported.as_ref());
        self.right_local = filter::difference(right.as_ref(), self.reported.as_ref());
        self.reported = filter::union([self.reported.as_ref(), kept.as_ref()]);
        debug!(
            "{}: {} conjunct(s) reported, {} checked on the left, {} on the right",
            self.name(),
            filter::conjunction_count(self.reported.as_ref()),
            filter::conjunction_count(self.left_local.as_ref()),
            filter::conjunction_count(self.right_local.as_ref()),
        );
        Ok(())
    }

    fn filter(&self) -> Option<Expression> {
        self.reported.clone()
    }

    fn ordering(&self) -> Option<OrderExpression> {
        self.pushed_order.clone()
    }

    fn supports_mark_restore(&self) -> bool {
        false
    }

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>> {
        protocol::guard_optimized(self.optimized, &self.name())?;
        let left = Box::new(ReshapeScanner {
            child: self.left.scanner(ctx)?,
            fields: self.fields.clone(),
        });
        let right = Box::new(ReshapeScanner {
            child: self.right.scanner(ctx)?,
            fields: self.fields.clone(),
        });
        Ok(Box::new(UnionScanner {
            sides: [
                FilteredScanner::wrap(left, self.left_local.clone(), ctx),
                FilteredScanner::wrap(right, self.right_local.clone(), ctx),
            ],
            current: 0,
            seen: self.distinct.then(|| FxHashSet::default()),
        }))
    }
}

/// Presents a child's rows under the union's column names
struct ReshapeScanner<'s> {
    child: Box<dyn Scanner + 's>,
    fields: Arc<[Field]>,
}

impl Scanner for ReshapeScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        match self.child.scan()? {
            Some(row) => Ok(Some(row.reshape(self.fields.clone())?)),
            None => Ok(None),
        }
    }
}

struct UnionScanner<'s> {
    sides: [Box<dyn Scanner + 's>; 2],
    current: usize,
    seen: Option<FxHashSet<Vec<Value>>>,
}

impl Scanner for UnionScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        while self.current < self.sides.len() {
            let Some(row) = self.sides[self.current].scan()? else {
                self.current += 1;
                continue;
            };
            match &mut self.seen {
                Some(seen) => {
                    if seen.insert(row.values().to_vec()) {
                        return Ok(Some(row));
                    }
                }
                None => return Ok(Some(row)),
            }
        }
        Ok(None)
    }
}
