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
use shared::expression::{BinaryOp, Expression};
use shared::filter;
use shared::order::OrderExpression;
use shared::row::{Row, Tid};
use super::check_comparable;
use shared::value::{DataType, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

/// One side of a range on an indexed column
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBound {
    pub expression: Expression,
    pub inclusive: bool,
}

/// All bounds collected for one indexed column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBounds {
    pub lower: Vec<ScanBound>,
    pub upper: Vec<ScanBound>,
}

impl ColumnBounds {
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty() && self.upper.is_empty()
    }
}

/// Bounds for a prefix of the indexed columns, in declared order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BTreeScanOptions {
    pub bounds: Vec<ColumnBounds>,
    pub direction: ScanDirection,
}

/// Lexicographic key comparison; a shorter key is equal on the shared prefix
pub fn compare_keys(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right) {
        let ordering = l.total_cmp(r);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone)]
struct TreeNode {
    key: Vec<Value>,
    tid: Tid,
    left: Option<usize>,
    right: Option<usize>,
}

/// Unbalanced binary search tree over evaluated key tuples.
///
/// Keys in a left subtree are `<=` the node key and keys in a right subtree
/// are `>=` it. Equal keys are inserted to the left.
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    name: String,
    expressions: Vec<Expression>,
    key_types: Vec<DataType>,
    unique: bool,
    nodes: Vec<TreeNode>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl BTreeIndex {
    pub fn new(name: &str, expressions: Vec<Expression>) -> Self {
        Self {
            name: name.to_string(),
            expressions,
            key_types: Vec::new(),
            unique: false,
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    /// Rejects a second row with an equal, fully non-NULL key
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub(crate) fn expressions_mut(&mut self) -> &mut Vec<Expression> {
        &mut self.expressions
    }

    pub(crate) fn set_key_types(&mut self, key_types: Vec<DataType>) {
        self.key_types = key_types;
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forward scans yield rows in this order
    pub fn ordering(&self) -> OrderExpression {
        OrderExpression::asc(self.expressions.clone())
    }

    fn key_of(&self, row: &Row) -> Result<Vec<Value>> {
        let ctx = ExecutionContext::new();
        self.expressions
            .iter()
            .map(|expression| expression.value_from(&ctx, row))
            .collect()
    }

    fn allocate(&mut self, key: Vec<Value>, tid: Tid) -> usize {
        let node = TreeNode {
            key,
            tid,
            left: None,
            right: None,
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    pub fn insert(&mut self, row: &Row) -> Result<()> {
        let tid = row.require_tid()?;
        let key = self.key_of(row)?;
        let check_unique = self.unique && !key.iter().any(Value::is_null);

        let mut parent: Option<(usize, bool)> = None;
        let mut current = self.root;
        while let Some(index) = current {
            let node = &self.nodes[index];
            let ordering = compare_keys(&key, &node.key);
            if check_unique && ordering == Ordering::Equal {
                return Err(QueryError::UniqueViolation {
                    index: self.name.clone(),
                    key: format_key(&key),
                });
            }
            if ordering == Ordering::Greater {
                parent = Some((index, false));
                current = node.right;
            } else {
                parent = Some((index, true));
                current = node.left;
            }
        }

        let slot = self.allocate(key, tid);
        match parent {
            None => self.root = Some(slot),
            Some((index, true)) => self.nodes[index].left = Some(slot),
            Some((index, false)) => self.nodes[index].right = Some(slot),
        }
        self.len += 1;
        Ok(())
    }

    /// Removes the entry of `row` (matched by tid). Returns whether it was found.
    pub fn delete(&mut self, row: &Row) -> Result<bool> {
        let tid = row.require_tid()?;
        let key = self.key_of(row)?;

        let mut stack: Vec<(usize, Option<(usize, bool)>)> = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, None));
        }
        while let Some((index, parent)) = stack.pop() {
            let node = &self.nodes[index];
            match compare_keys(&key, &node.key) {
                Ordering::Less => {
                    if let Some(left) = node.left {
                        stack.push((left, Some((index, true))));
                    }
                }
                Ordering::Greater => {
                    if let Some(right) = node.right {
                        stack.push((right, Some((index, false))));
                    }
                }
                Ordering::Equal => {
                    if node.tid == tid {
                        self.remove_node(index, parent);
                        self.len -= 1;
                        return Ok(true);
                    }
                    if let Some(right) = node.right {
                        stack.push((right, Some((index, false))));
                    }
                    if let Some(left) = node.left {
                        stack.push((left, Some((index, true))));
                    }
                }
            }
        }
        Ok(false)
    }

    fn relink(&mut self, parent: Option<(usize, bool)>, child: Option<usize>) {
        match parent {
            None => self.root = child,
            Some((index, true)) => self.nodes[index].left = child,
            Some((index, false)) => self.nodes[index].right = child,
        }
    }

    fn release(&mut self, index: usize) {
        self.nodes[index].key = Vec::new();
        self.nodes[index].left = None;
        self.nodes[index].right = None;
        self.free.push(index);
    }

    fn remove_node(&mut self, index: usize, parent: Option<(usize, bool)>) {
        let (left, right) = (self.nodes[index].left, self.nodes[index].right);
        match (left, right) {
            (None, child) | (child, None) => {
                self.relink(parent, child);
                self.release(index);
            }
            (Some(_), Some(right)) => {
                // Promote the in-order successor, then splice it out of the right subtree
                let mut successor_parent = (index, false);
                let mut successor = right;
                while let Some(next) = self.nodes[successor].left {
                    successor_parent = (successor, true);
                    successor = next;
                }
                let key = std::mem::take(&mut self.nodes[successor].key);
                let tid = self.nodes[successor].tid;
                let successor_right = self.nodes[successor].right;
                self.nodes[index].key = key;
                self.nodes[index].tid = tid;
                self.relink(Some(successor_parent), successor_right);
                self.release(successor);
            }
        }
    }

    /// Lazily yields tids whose keys satisfy `options`; bound expressions are
    /// evaluated once against `ctx`.
    pub fn scan(&self, options: &BTreeScanOptions, ctx: &ExecutionContext) -> Result<BTreeScan<'_>> {
        let mut columns = Vec::with_capacity(options.bounds.len());
        let mut empty = false;
        for (column, bounds) in options.bounds.iter().enumerate() {
            // an empty index has no key a bound could fail to compare with
            let key_type = match self.key_types.get(column) {
                Some(key_type) if !self.is_empty() => *key_type,
                _ => DataType::Any,
            };
            let lower = tightest(&bounds.lower, ctx, key_type, Ordering::Greater)?;
            let upper = tightest(&bounds.upper, ctx, key_type, Ordering::Less)?;
            match (lower, upper) {
                (Some(lower), Some(upper)) => columns.push(EvaluatedBounds { lower, upper }),
                _ => empty = true,
            }
        }
        let mut scan = BTreeScan {
            index: self,
            columns,
            direction: options.direction,
            stack: Vec::new(),
        };
        if !empty {
            scan.descend(self.root);
        }
        Ok(scan)
    }
}

fn format_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

#[derive(Debug, Clone)]
struct EvaluatedBound {
    value: Value,
    inclusive: bool,
}

#[derive(Debug, Clone)]
struct EvaluatedBounds {
    lower: Option<EvaluatedBound>,
    upper: Option<EvaluatedBound>,
}

/// Picks the most restrictive bound after checking that each one compares
/// with `key_type`. `Ok(None)` means a bound evaluated to
/// NULL, which no key can satisfy; `Ok(Some(None))` means unbounded.
fn tightest(
    bounds: &[ScanBound],
    ctx: &ExecutionContext,
    key_type: DataType,
    tighter: Ordering,
) -> Result<Option<Option<EvaluatedBound>>> {
    let mut best: Option<EvaluatedBound> = None;
    for bound in bounds {
        let value = bound.expression.value_in(ctx)?;
        check_comparable(key_type, &value)?;
        if value.is_null() {
            return Ok(None);
        }
        let candidate = EvaluatedBound {
            value,
            inclusive: bound.inclusive,
        };
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let ordering = candidate.value.total_cmp(&current.value);
                if ordering == tighter || (ordering == Ordering::Equal && !candidate.inclusive) {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(Some(best))
}

/// In-order traversal with subtree pruning
pub struct BTreeScan<'a> {
    index: &'a BTreeIndex,
    columns: Vec<EvaluatedBounds>,
    direction: ScanDirection,
    stack: Vec<usize>,
}

impl BTreeScan<'_> {
    /// Some key `<= key` may satisfy the lower bounds
    fn may_match_below(&self, key: &[Value]) -> bool {
        for (column, bounds) in self.columns.iter().enumerate() {
            let (Some(lower), Some(value)) = (&bounds.lower, key.get(column)) else {
                return true;
            };
            match value.total_cmp(&lower.value) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                Ordering::Equal => continue,
                Ordering::Greater => return true,
            }
        }
        true
    }

    /// Some key `>= key` may satisfy the upper bounds
    fn may_match_above(&self, key: &[Value]) -> bool {
        for (column, bounds) in self.columns.iter().enumerate() {
            let (Some(upper), Some(value)) = (&bounds.upper, key.get(column)) else {
                return true;
            };
            match value.total_cmp(&upper.value) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                Ordering::Equal => continue,
                Ordering::Less => return true,
            }
        }
        true
    }

    fn matches(&self, key: &[Value]) -> bool {
        self.columns.iter().enumerate().all(|(column, bounds)| {
            let Some(value) = key.get(column) else {
                return false;
            };
            if value.is_null() {
                return false;
            }
            let above_lower = bounds.lower.as_ref().map_or(true, |lower| {
                match value.total_cmp(&lower.value) {
                    Ordering::Greater => true,
                    Ordering::Equal => lower.inclusive,
                    Ordering::Less => false,
                }
            });
            let below_upper = bounds.upper.as_ref().map_or(true, |upper| {
                match value.total_cmp(&upper.value) {
                    Ordering::Less => true,
                    Ordering::Equal => upper.inclusive,
                    Ordering::Greater => false,
                }
            });
            above_lower && below_upper
        })
    }

    /// Pushes the spine leading towards the first node in scan direction
    fn descend(&mut self, mut current: Option<usize>) {
        let tree = self.index;
        while let Some(index) = current {
            self.stack.push(index);
            let node = &tree.nodes[index];
            current = match self.direction {
                ScanDirection::Forward if self.may_match_below(&node.key) => node.left,
                ScanDirection::Backward if self.may_match_above(&node.key) => node.right,
                _ => None,
            };
        }
    }
}

impl Iterator for BTreeScan<'_> {
    type Item = Tid;

    fn next(&mut self) -> Option<Tid> {
        let tree = self.index;
        while let Some(index) = self.stack.pop() {
            let node = &tree.nodes[index];
            let next = match self.direction {
                ScanDirection::Forward if self.may_match_above(&node.key) => node.right,
                ScanDirection::Backward if self.may_match_below(&node.key) => node.left,
                _ => None,
            };
            self.descend(next);
            if self.matches(&node.key) {
                return Some(node.tid);
            }
        }
        None
    }
}

/// Collects per-column bounds from `conjuncts` for the index expressions.
///
/// A conjunct contributes when one side is structurally the column
/// expression and `is_external` accepts the other side. Collection stops at
/// the first column without bounds. Returns the bounds and the conjuncts they
/// consumed.
pub fn extract_bounds<F>(
    expressions: &[Expression],
    conjuncts: &[Expression],
    mut is_external: F,
) -> Result<(Vec<ColumnBounds>, Vec<Expression>)>
where
    F: FnMut(&Expression) -> Result<bool>,
{
    let mut all_bounds = Vec::new();
    let mut consumed: Vec<Expression> = Vec::new();
    for column in expressions {
        let mut bounds = ColumnBounds::default();
        for conjunct in conjuncts {
            let Expression::Binary { op, left, right } = conjunct else {
                continue;
            };
            let (op, other) = if left.equal(column) && is_external(right.as_ref())? {
                (*op, right.as_ref())
            } else if right.equal(column) && is_external(left.as_ref())? {
                match op.flip() {
                    Some(flipped) => (flipped, left.as_ref()),
                    None => continue,
                }
            } else {
                continue;
            };
            let bound = |inclusive| ScanBound {
                expression: other.clone(),
                inclusive,
            };
            match op {
                BinaryOp::Eq => {
                    bounds.lower.push(bound(true));
                    bounds.upper.push(bound(true));
                }
                BinaryOp::Lt => bounds.upper.push(bound(false)),
                BinaryOp::LtEq => bounds.upper.push(bound(true)),
                BinaryOp::Gt => bounds.lower.push(bound(false)),
                BinaryOp::GtEq => bounds.lower.push(bound(true)),
                _ => continue,
            }
            if !filter::contains(&consumed, conjunct) {
                consumed.push(conjunct.clone());
            }
        }
        if bounds.is_empty() {
            break;
        }
        all_bounds.push(bounds);
    }
    Ok((all_bounds, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::field::Field;
    use shared::value::DataType;
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

    fn index_on_a(values: &[i64]) -> BTreeIndex {
        let mut index = BTreeIndex::new("idx_a", vec![Expression::field("t.a")]);
        for (tid, v) in values.iter().enumerate() {
            index
                .insert(&row(tid as Tid, Value::Int(*v), Value::Int(0)))
                .unwrap();
        }
        index
    }

    fn range(lower: i64, upper: i64, direction: ScanDirection) -> BTreeScanOptions {
        BTreeScanOptions {
            bounds: vec![ColumnBounds {
                lower: vec![ScanBound {
                    expression: Expression::constant(lower),
                    inclusive: true,
                }],
                upper: vec![ScanBound {
                    expression: Expression::constant(upper),
                    inclusive: true,
                }],
            }],
            direction,
        }
    }

    fn keys(index: &BTreeIndex, options: &BTreeScanOptions) -> Vec<Tid> {
        index
            .scan(options, &ExecutionContext::new())
            .unwrap()
            .collect()
    }

    #[test]
    fn test_range_forward_and_backward() {
        // tid == value - 1
        let index = index_on_a(&[3, 1, 4, 2, 5]);
        let forward = keys(&index, &range(2, 4, ScanDirection::Forward));
        assert_eq!(forward, vec![3, 0, 2]);
        let backward = keys(&index, &range(2, 4, ScanDirection::Backward));
        assert_eq!(backward, vec![2, 0, 3]);
    }

    #[test]
    fn test_unbounded_scan_is_sorted() {
        let index = index_on_a(&[5, 3, 9, 1, 7, 3]);
        let tids = keys(&index, &BTreeScanOptions::default());
        let values: Vec<i64> = tids.iter().map(|t| [5, 3, 9, 1, 7, 3][*t as usize]).collect();
        assert_eq!(values, vec![1, 3, 3, 5, 7, 9]);
        // equal keys go left, so the newer duplicate comes first
        assert_eq!(&tids[1..3], &[5, 1]);
    }

    #[test]
    fn test_exclusive_bounds() {
        let index = index_on_a(&[1, 2, 3, 4, 5]);
        let options = BTreeScanOptions {
            bounds: vec![ColumnBounds {
                lower: vec![ScanBound {
                    expression: Expression::constant(1),
                    inclusive: false,
                }],
                upper: vec![ScanBound {
                    expression: Expression::constant(4),
                    inclusive: false,
                }],
            }],
            direction: ScanDirection::Forward,
        };
        assert_eq!(keys(&index, &options), vec![1, 2]);
    }

    #[test]
    fn test_null_bound_is_empty() {
        let index = index_on_a(&[1, 2, 3]);
        let options = BTreeScanOptions {
            bounds: vec![ColumnBounds {
                lower: vec![ScanBound {
                    expression: Expression::null(),
                    inclusive: true,
                }],
                upper: Vec::new(),
            }],
            direction: ScanDirection::Forward,
        };
        assert!(keys(&index, &options).is_empty());
    }

    #[test]
    fn test_null_keys_never_match_upper_bound() {
        let mut index = BTreeIndex::new("idx_a", vec![Expression::field("t.a")]);
        index.insert(&row(0, Value::Null, Value::Int(0))).unwrap();
        index.insert(&row(1, Value::Int(1), Value::Int(0))).unwrap();
        let options = BTreeScanOptions {
            bounds: vec![ColumnBounds {
                lower: Vec::new(),
                upper: vec![ScanBound {
                    expression: Expression::constant(5),
                    inclusive: true,
                }],
            }],
            direction: ScanDirection::Forward,
        };
        assert_eq!(keys(&index, &options), vec![1]);
        assert_eq!(keys(&index, &BTreeScanOptions::default()).len(), 2);
    }

    #[test]
    fn test_delete_with_two_children() {
        let values = [50, 30, 70, 20, 40, 60, 80, 30];
        let mut index = index_on_a(&values);
        for tid in [0u64, 1, 7] {
            let r = row(tid, Value::Int(values[tid as usize]), Value::Int(0));
            assert!(index.delete(&r).unwrap());
        }
        assert!(!index
            .delete(&row(0, Value::Int(50), Value::Int(0)))
            .unwrap());
        assert_eq!(index.len(), 5);
        let tids = keys(&index, &BTreeScanOptions::default());
        assert_eq!(tids, vec![3, 4, 5, 2, 6]);
        // slots are reused
        index.insert(&row(9, Value::Int(45), Value::Int(0))).unwrap();
        assert_eq!(index.nodes.len(), values.len());
    }

    #[test]
    fn test_unique_violation() {
        let mut index = BTreeIndex::new("pk", vec![Expression::field("t.a")]).unique();
        index.insert(&row(0, Value::Int(1), Value::Int(0))).unwrap();
        let err = index
            .insert(&row(1, Value::Int(1), Value::Int(5)))
            .unwrap_err();
        assert!(matches!(err, QueryError::UniqueViolation { .. }));
        index.insert(&row(2, Value::Null, Value::Int(0))).unwrap();
        index.insert(&row(3, Value::Null, Value::Int(0))).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_composite_prefix_pruning() {
        let mut index = BTreeIndex::new(
            "idx_ab",
            vec![Expression::field("t.a"), Expression::field("t.b")],
        );
        let mut tid = 0;
        for a in 1..=3 {
            for b in 1..=3 {
                index.insert(&row(tid, Value::Int(a), Value::Int(b))).unwrap();
                tid += 1;
            }
        }
        let eq = |v: i64| ScanBound {
            expression: Expression::constant(v),
            inclusive: true,
        };
        let options = BTreeScanOptions {
            bounds: vec![
                ColumnBounds {
                    lower: vec![eq(2)],
                    upper: vec![eq(2)],
                },
                ColumnBounds {
                    lower: vec![eq(2)],
                    upper: Vec::new(),
                },
            ],
            direction: ScanDirection::Forward,
        };
        assert_eq!(keys(&index, &options), vec![4, 5]);
    }

    #[test]
    fn test_extract_bounds_flips_and_stops() {
        let a = Expression::field("t.a");
        let b = Expression::field("t.b");
        let conjuncts = vec![
            Expression::less(Expression::constant(2), a.clone()),
            Expression::less_eq(a.clone(), Expression::constant(9)),
            Expression::equals(b.clone(), Expression::constant(1)),
            Expression::equals(a.clone(), b.clone()),
        ];
        let external = |e: &Expression| Ok(e.fields().is_empty());
        let (bounds, consumed) =
            extract_bounds(&[a.clone(), b.clone()], &conjuncts, external).unwrap();
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[0].lower[0].inclusive, false);
        assert_eq!(bounds[0].upper.len(), 1);
        assert_eq!(consumed.len(), 3);

        let (bounds, consumed) = extract_bounds(&[b, a], &conjuncts[..2], external).unwrap();
        assert!(bounds.is_empty());
        assert!(consumed.is_empty());
    }
}
