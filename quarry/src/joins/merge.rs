/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{compare_join_keys, join_key, EquiPair};
use crate::scanner::Scanner;
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::row::Row;
use shared::value::Value;
use std::cmp::Ordering;
use std::sync::Arc;

type Keyed = (Row, Vec<Value>);

/// Merges two inputs sorted ascending on their join keys.
///
/// The right scanner must support mark/restore: it is marked after the first
/// row of each equal-key group and rewound when the next left row carries
/// the same key.
pub struct MergeJoinScanner<'s> {
    left: Box<dyn Scanner + 's>,
    right: Box<dyn Scanner + 's>,
    left_keys: Vec<Expression>,
    right_keys: Vec<Expression>,
    ctx: ExecutionContext,
    fields: Arc<[Field]>,
    left_row: Option<Keyed>,
    right_row: Option<Keyed>,
    /// First right row of the group matching `left_row`
    group: Option<Keyed>,
}

impl<'s> MergeJoinScanner<'s> {
    pub fn new(
        left: Box<dyn Scanner + 's>,
        right: Box<dyn Scanner + 's>,
        pairs: &[EquiPair],
        ctx: &ExecutionContext,
        fields: Arc<[Field]>,
    ) -> Self {
        Self {
            left,
            right,
            left_keys: pairs.iter().map(|pair| pair.left.clone()).collect(),
            right_keys: pairs.iter().map(|pair| pair.right.clone()).collect(),
            ctx: ctx.clone(),
            fields,
            left_row: None,
            right_row: None,
            group: None,
        }
    }

    /// Next row with a key free of NULLs
    fn next_keyed(
        scanner: &mut dyn Scanner,
        keys: &[Expression],
        ctx: &ExecutionContext,
    ) -> Result<Option<Keyed>> {
        while let Some(row) = scanner.scan()? {
            if let Some(key) = join_key(keys, ctx, &row)? {
                return Ok(Some((row, key)));
            }
        }
        Ok(None)
    }

    fn next_left(&mut self) -> Result<Option<Keyed>> {
        Self::next_keyed(self.left.as_mut(), &self.left_keys, &self.ctx)
    }

    fn next_right(&mut self) -> Result<Option<Keyed>> {
        Self::next_keyed(self.right.as_mut(), &self.right_keys, &self.ctx)
    }

    fn emit(&self, left: &Row, right: &Row) -> Result<Option<Row>> {
        Ok(Some(left.concat(right, self.fields.clone())?))
    }

    /// Continues the current group: the next right row if it still matches,
    /// otherwise the next left row replayed against the group from its mark
    fn advance_group(&mut self, group_key: Vec<Value>) -> Result<Option<Row>> {
        match self.next_right()? {
            Some((row, key)) if compare_join_keys(&key, &group_key) == Ordering::Equal => {
                match &self.left_row {
                    Some((left, _)) => self.emit(left, &row),
                    None => Ok(None),
                }
            }
            beyond => {
                self.right_row = beyond;
                match self.next_left()? {
                    Some((left, key)) if compare_join_keys(&key, &group_key) == Ordering::Equal => {
                        self.right.restore()?;
                        let row = match &self.group {
                            Some((first, _)) => self.emit(&left, first)?,
                            None => None,
                        };
                        self.left_row = Some((left, key));
                        Ok(row)
                    }
                    next => {
                        self.left_row = next;
                        self.group = None;
                        self.scan()
                    }
                }
            }
        }
    }
}

impl Scanner for MergeJoinScanner<'_> {
    fn scan(&mut self) -> Result<Option<Row>> {
        if let Some((_, key)) = &self.group {
            let key = key.clone();
            return self.advance_group(key);
        }
        loop {
            if self.left_row.is_none() {
                self.left_row = self.next_left()?;
            }
            if self.right_row.is_none() {
                self.right_row = self.next_right()?;
            }
            let (Some((_, left_key)), Some((_, right_key))) = (&self.left_row, &self.right_row)
            else {
                return Ok(None);
            };
            match compare_join_keys(left_key, right_key) {
                Ordering::Less => self.left_row = None,
                Ordering::Greater => self.right_row = None,
                Ordering::Equal => {
                    self.right.mark()?;
                    let first = self.right_row.take();
                    let row = match (&self.left_row, &first) {
                        (Some((left, _)), Some((right, _))) => self.emit(left, right)?,
                        _ => None,
                    };
                    self.group = first;
                    return Ok(row);
                }
            }
        }
    }
}
