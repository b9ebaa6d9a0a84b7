/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod btree;
pub mod hash;
pub mod partial;

pub use btree::{BTreeIndex, BTreeScanOptions, ColumnBounds, ScanBound, ScanDirection};
pub use hash::{BucketHasher, HashIndex, HashScanOptions};
pub use partial::PartialIndex;

use shared::context::ExecutionContext;
use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::field::Field;
use shared::order::OrderExpression;
use shared::row::{Row, Tid};
use shared::value::{DataType, Value};

/// Secondary index attached to a table
#[derive(Debug, Clone)]
pub enum Index {
    BTree(BTreeIndex),
    Hash(HashIndex),
    Partial(PartialIndex),
}

/// Per-variant scan parameters chosen by access selection
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOptions {
    BTree(BTreeScanOptions),
    Hash(HashScanOptions),
}

impl Index {
    pub fn btree(name: &str, expressions: Vec<Expression>) -> Self {
        Index::BTree(BTreeIndex::new(name, expressions))
    }

    pub fn unique_btree(name: &str, expressions: Vec<Expression>) -> Self {
        Index::BTree(BTreeIndex::new(name, expressions).unique())
    }

    pub fn hash(name: &str, expression: Expression) -> Self {
        Index::Hash(HashIndex::new(name, expression))
    }

    pub fn partial(condition: Expression, index: Index) -> Result<Self> {
        Ok(Index::Partial(PartialIndex::new(condition, index)?))
    }

    pub fn name(&self) -> &str {
        match self {
            Index::BTree(index) => index.name(),
            Index::Hash(index) => index.name(),
            Index::Partial(index) => index.inner().name(),
        }
    }

    /// Condition a row must satisfy to be indexed, partial indexes only
    pub fn filter(&self) -> Option<&Expression> {
        match self {
            Index::Partial(index) => Some(index.condition()),
            _ => None,
        }
    }

    /// The B-tree or hash index doing the actual work
    pub fn base(&self) -> &Index {
        match self {
            Index::Partial(index) => index.inner(),
            other => other,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Index::BTree(index) => index.len(),
            Index::Hash(index) => index.len(),
            Index::Partial(index) => index.inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Order of a forward scan; empty for hash indexes
    pub fn ordering(&self) -> OrderExpression {
        match self.base() {
            Index::BTree(index) => index.ordering(),
            _ => OrderExpression::default(),
        }
    }

    pub fn insert(&mut self, row: &Row) -> Result<()> {
        match self {
            Index::BTree(index) => index.insert(row),
            Index::Hash(index) => index.insert(row),
            Index::Partial(index) => index.insert(row),
        }
    }

    pub fn delete(&mut self, row: &Row) -> Result<bool> {
        match self {
            Index::BTree(index) => index.delete(row),
            Index::Hash(index) => index.delete(row),
            Index::Partial(index) => index.delete(row),
        }
    }

    /// Qualifies every expression against the table fields and rejects
    /// references the table does not produce.
    pub fn prepare(&mut self, fields: &[Field]) -> Result<()> {
        let name = self.name().to_string();
        let check = |expression: &Expression| -> Result<Expression> {
            let invalid = |reason: String| QueryError::InvalidIndex {
                name: name.clone(),
                reason,
            };
            let qualified = expression
                .qualify(fields)
                .map_err(|err| invalid(err.to_string()))?;
            if !qualified
                .resolves_within(fields)
                .map_err(|err| invalid(err.to_string()))?
            {
                return Err(invalid(format!("`{}` references unknown fields", expression)));
            }
            Ok(qualified)
        };
        match self {
            Index::BTree(index) => {
                if index.expressions().is_empty() {
                    return Err(QueryError::InvalidIndex {
                        name: name.clone(),
                        reason: "no key expressions".to_string(),
                    });
                }
                for expression in index.expressions_mut().iter_mut() {
                    *expression = check(expression)?;
                }
                let key_types = index
                    .expressions()
                    .iter()
                    .map(|expression| expression.data_type(fields))
                    .collect();
                index.set_key_types(key_types);
            }
            Index::Hash(index) => {
                let qualified = check(index.expression())?;
                index.set_key_type(qualified.data_type(fields));
                *index.expression_mut() = qualified;
            }
            Index::Partial(index) => {
                let qualified = check(index.condition())?;
                *index.condition_mut() = qualified;
                index.inner_mut().prepare(fields)?;
            }
        }
        Ok(())
    }

    /// Lazily yields matching tids
    pub fn scan<'a>(
        &'a self,
        options: &ScanOptions,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn Iterator<Item = Tid> + 'a>> {
        match (self.base(), options) {
            (Index::BTree(index), ScanOptions::BTree(options)) => {
                Ok(Box::new(index.scan(options, ctx)?))
            }
            (Index::Hash(index), ScanOptions::Hash(options)) => {
                Ok(Box::new(index.scan(options, ctx)?))
            }
            _ => Err(QueryError::InvalidIndex {
                name: self.name().to_string(),
                reason: "scan options do not match the index kind".to_string(),
            }),
        }
    }
}

/// A non-NULL bound or probe must compare with the column it constrains,
/// the same way the predicate would when evaluated on a row
pub(crate) fn check_comparable(column: DataType, value: &Value) -> Result<()> {
    let found = value.data_type();
    if value.is_null() || column.compatible_with(found) {
        return Ok(());
    }
    Err(QueryError::TypeMismatch {
        op: "comparison".to_string(),
        left: column.to_string(),
        right: found.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields() -> Arc<[Field]> {
        vec![
            Field::new(Some("t"), "a", DataType::Int),
            Field::new(Some("t"), "b", DataType::Int),
        ]
        .into()
    }

    fn row(tid: Tid, a: Value, b: Value) -> Row {
        Row::new(fields(), vec![a, b]).unwrap().with_tid(tid)
    }

    #[test]
    fn test_partial_of_partial_rejected() {
        let condition = || Expression::greater(Expression::field("a"), Expression::constant(1));
        let inner = Index::partial(condition(), Index::hash("h", Expression::field("b"))).unwrap();
        let err = Index::partial(condition(), inner).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIndex { .. }));
    }

    #[test]
    fn test_partial_gates_insert_and_delete() {
        let mut index = Index::partial(
            Expression::greater(Expression::field("a"), Expression::constant(1)),
            Index::hash("h", Expression::field("b")),
        )
        .unwrap();
        index.prepare(&fields()).unwrap();
        index.insert(&row(0, Value::Int(1), Value::Int(20))).unwrap();
        index.insert(&row(1, Value::Int(2), Value::Int(20))).unwrap();
        index.insert(&row(2, Value::Null, Value::Int(20))).unwrap();
        assert_eq!(index.len(), 1);
        assert!(!index.delete(&row(0, Value::Int(1), Value::Int(20))).unwrap());
        assert!(index.delete(&row(1, Value::Int(2), Value::Int(20))).unwrap());
        assert!(index.is_empty());
    }

    #[test]
    fn test_prepare_rejects_unknown_fields() {
        let mut index = Index::btree("bad", vec![Expression::field("z")]);
        let err = index.prepare(&fields()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIndex { .. }));
        let mut index = Index::hash("h", Expression::field("b"));
        index.prepare(&fields()).unwrap();
        assert_eq!(index.ordering(), OrderExpression::default());
        let Index::Hash(hash) = &index else {
            unreachable!()
        };
        assert_eq!(hash.expression(), &Expression::field("t.b"));
    }

    #[test]
    fn test_scan_option_mismatch() {
        let index = Index::hash("h", Expression::field("t.b"));
        let options = ScanOptions::BTree(BTreeScanOptions::default());
        assert!(index.scan(&options, &ExecutionContext::new()).is_err());
    }
}
