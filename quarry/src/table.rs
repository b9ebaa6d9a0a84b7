/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::indexes::Index;
use log::{debug, warn};
use shared::error::{QueryError, Result};
use shared::field::Field;
use shared::row::{Row, Tid};
use shared::value::{DataType, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory row store with secondary indexes.
///
/// Every stored row carries a tid that is never reused by this table, and
/// every index holds exactly the rows its filter accepts.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    fields: Arc<[Field]>,
    rows: BTreeMap<Tid, Row>,
    indexes: Vec<Index>,
    next_tid: Tid,
}

impl Table {
    pub fn new(name: &str, columns: &[(&str, DataType)]) -> Self {
        let fields: Arc<[Field]> = columns
            .iter()
            .map(|(column, data_type)| Field::new(Some(name), column, *data_type))
            .collect();
        Self {
            name: name.to_string(),
            fields,
            rows: BTreeMap::new(),
            indexes: Vec::new(),
            next_tid: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &Arc<[Field]> {
        &self.fields
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All stored tids, ascending
    pub fn tids(&self) -> Vec<Tid> {
        self.rows.keys().copied().collect()
    }

    pub fn row(&self, tid: Tid) -> Option<&Row> {
        self.rows.get(&tid)
    }

    fn check_values(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(QueryError::ArityMismatch {
                expected: self.fields.len(),
                found: values.len(),
            });
        }
        for (field, value) in self.fields.iter().zip(values) {
            if !value.data_type().compatible_with(field.data_type) {
                return Err(QueryError::TypeMismatch {
                    op: format!("insert into {}", field),
                    left: value.data_type().to_string(),
                    right: field.data_type.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Adds `row` to every index and the row map. All-or-nothing.
    fn store(&mut self, row: Row) -> Result<()> {
        let tid = row.require_tid()?;
        for position in 0..self.indexes.len() {
            if let Err(err) = self.indexes[position].insert(&row) {
                for index in self.indexes[..position].iter_mut().rev() {
                    if let Err(rollback) = index.delete(&row) {
                        warn!("rollback of tid {} in index {} failed: {}", tid, index.name(), rollback);
                    }
                }
                return Err(err);
            }
        }
        self.rows.insert(tid, row);
        Ok(())
    }

    pub fn insert(&mut self, values: Vec<Value>) -> Result<Row> {
        self.check_values(&values)?;
        let tid = self.next_tid;
        self.next_tid += 1;
        let row = Row::new(self.fields.clone(), values)?.with_tid(tid);
        self.store(row.clone())?;
        Ok(row)
    }

    /// Removes the stored row with the tid of `row`
    pub fn delete(&mut self, row: &Row) -> Result<Option<Row>> {
        let tid = row.require_tid()?;
        let Some(stored) = self.rows.remove(&tid) else {
            return Ok(None);
        };
        for index in self.indexes.iter_mut() {
            index.delete(&stored)?;
        }
        Ok(Some(stored))
    }

    /// Replaces a row; the new version gets a fresh tid. On failure the old
    /// row is left in place.
    pub fn update(&mut self, tid: Tid, values: Vec<Value>) -> Result<Row> {
        self.check_values(&values)?;
        let Some(old) = self.rows.get(&tid).cloned() else {
            return Err(QueryError::MissingRow {
                table: self.name.clone(),
                index: "primary".to_string(),
                tid,
            });
        };
        self.delete(&old)?;
        match self.insert(values) {
            Ok(row) => Ok(row),
            Err(err) => {
                self.store(old)?;
                Err(err)
            }
        }
    }

    /// Validates `index` against this table and back-fills it from the stored rows
    pub fn add_index(&mut self, mut index: Index) -> Result<()> {
        if self.indexes.iter().any(|existing| existing.name() == index.name()) {
            return Err(QueryError::InvalidIndex {
                name: index.name().to_string(),
                reason: format!("an index with this name already exists on `{}`", self.name),
            });
        }
        index.prepare(&self.fields)?;
        for row in self.rows.values() {
            index.insert(row)?;
        }
        debug!(
            "table {}: added index {} over {} rows",
            self.name,
            index.name(),
            index.len()
        );
        self.indexes.push(index);
        Ok(())
    }
}
