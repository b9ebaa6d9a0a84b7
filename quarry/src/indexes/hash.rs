/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::check_comparable;
use rustc_hash::{FxHashMap, FxHasher};
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::row::{Row, Tid};
use shared::value::{DataType, Value};
use std::hash::{Hash, Hasher};

/// Maps a value to its bucket
pub type BucketHasher = fn(&Value) -> u64;

pub fn fx_hash(value: &Value) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashScanOptions {
    /// Evaluated once per scan, may reference outer rows
    pub probe: Expression,
}

/// Equality index over a single expression
#[derive(Debug, Clone)]
pub struct HashIndex {
    name: String,
    expression: Expression,
    key_type: DataType,
    entries: FxHashMap<u64, Vec<(Tid, Value)>>,
    hasher: BucketHasher,
    len: usize,
}

impl HashIndex {
    pub fn new(name: &str, expression: Expression) -> Self {
        Self::with_hasher(name, expression, fx_hash)
    }

    pub fn with_hasher(name: &str, expression: Expression, hasher: BucketHasher) -> Self {
        Self {
            name: name.to_string(),
            expression,
            key_type: DataType::Any,
            entries: FxHashMap::default(),
            hasher,
            len: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub(crate) fn expression_mut(&mut self) -> &mut Expression {
        &mut self.expression
    }

    pub(crate) fn set_key_type(&mut self, key_type: DataType) {
        self.key_type = key_type;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, row: &Row) -> Result<()> {
        let tid = row.require_tid()?;
        let value = self.expression.value_from(&ExecutionContext::new(), row)?;
        self.entries
            .entry((self.hasher)(&value))
            .or_default()
            .push((tid, value));
        self.len += 1;
        Ok(())
    }

    pub fn delete(&mut self, row: &Row) -> Result<bool> {
        let tid = row.require_tid()?;
        let value = self.expression.value_from(&ExecutionContext::new(), row)?;
        let bucket_key = (self.hasher)(&value);
        let Some(bucket) = self.entries.get_mut(&bucket_key) else {
            return Ok(false);
        };
        let Some(position) = bucket.iter().position(|(entry, _)| *entry == tid) else {
            return Ok(false);
        };
        bucket.swap_remove(position);
        if bucket.is_empty() {
            self.entries.remove(&bucket_key);
        }
        self.len -= 1;
        Ok(true)
    }

    /// Tids whose stored value equals the probe. A NULL probe matches nothing;
/// a probe that cannot compare with the indexed column is a type error.
    pub fn scan(&self, options: &HashScanOptions, ctx: &ExecutionContext) -> Result<HashScan<'_>> {
        let probe = options.probe.value_in(ctx)?;
        if !self.is_empty() {
            check_comparable(self.key_type, &probe)?;
        }
        let bucket = if probe.is_null() {
            None
        } else {
            self.entries.get(&(self.hasher)(&probe))
        };
        Ok(HashScan {
            entries: bucket.map(|b| b.as_slice()).unwrap_or(&[]),
            probe,
            position: 0,
        })
    }
}

pub struct HashScan<'a> {
    entries: &'a [(Tid, Value)],
    probe: Value,
    position: usize,
}

impl Iterator for HashScan<'_> {
    type Item = Tid;

    fn next(&mut self) -> Option<Tid> {
        while let Some((tid, value)) = self.entries.get(self.position) {
            self.position += 1;
            // buckets may hold colliding values
            if matches!(value.sql_cmp(&self.probe), Ok(Some(std::cmp::Ordering::Equal))) {
                return Some(*tid);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::field::Field;
    use shared::value::DataType;
    use std::sync::Arc;

    fn collide(_: &Value) -> u64 {
        7
    }

    fn row(tid: Tid, b: Value) -> Row {
        let fields: Arc<[Field]> = vec![Field::new(Some("t"), "b", DataType::Int)].into();
        Row::new(fields, vec![b]).unwrap().with_tid(tid)
    }

    fn probe(index: &HashIndex, value: Value) -> Vec<Tid> {
        let options = HashScanOptions {
            probe: Expression::Constant(value),
        };
        index
            .scan(&options, &ExecutionContext::new())
            .unwrap()
            .collect()
    }

    #[test]
    fn test_collisions_are_rechecked() {
        let mut index = HashIndex::with_hasher("idx_b", Expression::field("t.b"), collide);
        for (tid, b) in [10, 20, 10, 30].iter().enumerate() {
            index.insert(&row(tid as Tid, Value::Int(*b))).unwrap();
        }
        assert_eq!(index.entries.len(), 1);
        assert_eq!(probe(&index, Value::Int(10)), vec![0, 2]);
        assert_eq!(probe(&index, Value::Int(20)), vec![1]);
        assert!(probe(&index, Value::Int(40)).is_empty());
    }

    #[test]
    fn test_null_probe_matches_nothing() {
        let mut index = HashIndex::new("idx_b", Expression::field("t.b"));
        index.insert(&row(0, Value::Null)).unwrap();
        assert!(probe(&index, Value::Null).is_empty());
    }

    #[test]
    fn test_delete_by_tid() {
        let mut index = HashIndex::new("idx_b", Expression::field("t.b"));
        index.insert(&row(0, Value::Int(5))).unwrap();
        index.insert(&row(1, Value::Int(5))).unwrap();
        assert!(index.delete(&row(0, Value::Int(5))).unwrap());
        assert!(!index.delete(&row(0, Value::Int(5))).unwrap());
        assert_eq!(probe(&index, Value::Int(5)), vec![1]);
        assert_eq!(index.len(), 1);
    }
}
