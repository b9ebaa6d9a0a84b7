/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{join_key, EquiPair};
use crate::scanner::Scanner;
use log::trace;
use rustc_hash::FxHashMap;
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::row::Row;
use shared::value::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Builds a table over the right input on the first call, then probes it
/// once per left row. Output follows left order.
pub struct HashJoinScanner<'s> {
    left: Box<dyn Scanner + 's>,
    build: Option<Box<dyn Scanner + 's>>,
    left_keys: Vec<Expression>,
    right_keys: Vec<Expression>,
    table: FxHashMap<Vec<Value>, Vec<Row>>,
    ctx: ExecutionContext,
    fields: Arc<[Field]>,
    pending: std::vec::IntoIter<Row>,
}

impl<'s> HashJoinScanner<'s> {
    pub fn new(
        left: Box<dyn Scanner + 's>,
        right: Box<dyn Scanner + 's>,
        pairs: &[EquiPair],
        ctx: &ExecutionContext,
        fields: Arc<[Field]>,
    ) -> Self {
        Self {
            left,
            build: Some(right),
            left_keys: pairs.iter().map(|pair| pair.left.clone()).collect(),
            right_keys: pairs.iter().map(|pair| pair.right.clone()).collect(),
            table: FxHashMap::default(),
            ctx: ctx.clone(),
            fields,
            pending: Vec::new().into_iter(),
        }
    }

    fn build_table(&mut self) -> Result<()> {
        let Some(mut right) = self.build.take() else {
            return Ok(());
        };
        let mut rows = 0usize;
        while let Some(row) = right.scan()? {
            if let Some(key) = join_key(&self.right_keys, &self.ctx, &row)? {
                self.table.entry(key).or_default().push(row);
                rows += 1;
            }
        }
        trace!("hash join built {} row(s) in {} bucket(s)", rows, self.table.len());
        Ok(())
    }

    fn probe(&self, left: &Row) -> Result<Vec<Row>> {
        let Some(key) = join_key(&self.left_keys, &self.ctx, left)? else {
            return Ok(Vec::new());
        };
        let Some(candidates) = self.table.get(&key) else {
            return Ok(Vec::new());
        };
        let mut joined = Vec::with_capacity(candidates.len());
        'candidates: for right in candidates {
            let right_key = join_key(&self.right_keys, &self.ctx, right)?.unwrap_or_default();
            for (l, r) in key.iter().zip(&right_key) {
                if l.sql_cmp(r)? != Some(Ordering::Equal) {
                    continue 'candidates;
                }
            }
            joined.push(left.concat(right, self.fields.clone())?);
        }
        Ok(joined)
    }
}

impl Scanner for HashJoinScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        self.build_table()?;
        loop {
            if let Some(row) = self.pending.next() {
                return Ok(Some(row));
            }
            let Some(left) = self.left.scan()? else {
                return Ok(None);
            };
            self.pending = self.probe(&left)?.into_iter();
        }
    }
}
