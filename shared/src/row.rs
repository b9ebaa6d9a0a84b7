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
use crate::field::{resolve, Field, FieldRef};
use crate::value::Value;
use std::sync::Arc;

/// Tuple identifier assigned by a table when a row is stored
pub type Tid = u64;

/// Ordered values aligned 1:1 with a field list
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Arc<[Field]>,
    values: Vec<Value>,
    tid: Option<Tid>,
}

impl Row {
    pub fn new(fields: Arc<[Field]>, values: Vec<Value>) -> Result<Self> {
        if fields.len() != values.len() {
            return Err(QueryError::ArityMismatch {
                expected: fields.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            fields,
            values,
            tid: None,
        })
    }

    pub fn with_tid(mut self, tid: Tid) -> Self {
        self.tid = Some(tid);
        self
    }

    pub fn tid(&self) -> Option<Tid> {
        self.tid
    }

    pub fn require_tid(&self) -> Result<Tid> {
        self.tid.ok_or(QueryError::UnstoredRow)
    }

    pub fn fields(&self) -> &Arc<[Field]> {
        &self.fields
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the referenced field, `Ok(None)` when this row does not produce it
    pub fn lookup(&self, reference: &FieldRef) -> Result<Option<&Value>> {
        Ok(resolve(&self.fields, reference)?.map(|position| &self.values[position]))
    }

    /// Joined row of a pair: left values followed by right values
    pub fn concat(&self, right: &Row, fields: Arc<[Field]>) -> Result<Row> {
        let mut values = Vec::with_capacity(self.len() + right.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&right.values);
        Row::new(fields, values)
    }

    /// Same values under a different (equally long) field list
    pub fn reshape(&self, fields: Arc<[Field]>) -> Result<Row> {
        Row::new(fields, self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn schema(relation: &str) -> Arc<[Field]> {
        vec![
            Field::new(Some(relation), "a", DataType::Int),
            Field::new(Some(relation), "b", DataType::Text),
        ]
        .into()
    }

    #[test]
    fn test_row_arity_checked() {
        let err = Row::new(schema("t"), vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err, QueryError::ArityMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn test_lookup_and_concat() {
        let left = Row::new(schema("t"), vec![1.into(), "x".into()]).unwrap();
        let right = Row::new(schema("u"), vec![2.into(), "y".into()]).unwrap();
        let fields: Arc<[Field]> = left
            .fields()
            .iter()
            .chain(right.fields().iter())
            .cloned()
            .collect();
        let joined = left.concat(&right, fields).unwrap();
        assert_eq!(
            joined.lookup(&FieldRef::parse("u.a")).unwrap(),
            Some(&Value::Int(2))
        );
        assert!(joined.lookup(&FieldRef::parse("a")).is_err());
        assert_eq!(joined.tid(), None);
    }
}
