/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate quarry;
use quarry::indexes::{
    BTreeScanOptions, ColumnBounds, HashIndex, HashScanOptions, Index, ScanBound, ScanDirection,
    ScanOptions,
};
use quarry::plan::{optimize_and_execute, AccessNode, Node};
use quarry::table::Table;
use shared::context::ExecutionContext;
use shared::error::QueryError;
use shared::expression::Expression;
use shared::value::{DataType, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn two_columns(name: &str) -> Table {
        Table::new(name, &[("a", DataType::Int), ("b", DataType::Int)])
    }

    fn column_a(table: &Table, tids: impl Iterator<Item = u64>) -> Vec<i64> {
        tids.map(|tid| match table.row(tid).unwrap().values()[0] {
            Value::Int(a) => a,
            ref other => panic!("unexpected {:?}", other),
        })
        .collect()
    }

    fn range(lower: i64, upper: i64, direction: ScanDirection) -> ScanOptions {
        ScanOptions::BTree(BTreeScanOptions {
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
        })
    }

    #[test]
    fn test_btree_range_scan_both_directions() {
        let mut table = two_columns("t");
        for a in [3, 1, 5, 2, 4] {
            table.insert(vec![Value::Int(a), Value::Int(a * 10)]).unwrap();
        }
        table
            .add_index(Index::btree("t_a", vec![Expression::field("a")]))
            .unwrap();
        let index = &table.indexes()[0];
        let ctx = ExecutionContext::new();

        let forward = index.scan(&range(2, 4, ScanDirection::Forward), &ctx).unwrap();
        assert_eq!(column_a(&table, forward), vec![2, 3, 4]);

        let backward = index.scan(&range(2, 4, ScanDirection::Backward), &ctx).unwrap();
        assert_eq!(column_a(&table, backward), vec![4, 3, 2]);
    }

    #[test]
    fn test_hash_index_survives_total_collisions() {
        fn collide(_: &Value) -> u64 {
            0
        }
        let mut table = two_columns("t");
        for a in [1, 2, 3, 3, 4] {
            table.insert(vec![Value::Int(a), Value::Int(0)]).unwrap();
        }
        table
            .add_index(Index::Hash(HashIndex::with_hasher(
                "t_a",
                Expression::field("a"),
                collide,
            )))
            .unwrap();
        let index = &table.indexes()[0];
        let ctx = ExecutionContext::new();

        let probe = |value: Expression| {
            ScanOptions::Hash(HashScanOptions { probe: value })
        };
        let hits = index.scan(&probe(Expression::constant(3)), &ctx).unwrap();
        assert_eq!(column_a(&table, hits), vec![3, 3]);

        let misses = index.scan(&probe(Expression::constant(9)), &ctx).unwrap();
        assert_eq!(misses.count(), 0);

        let null = index.scan(&probe(Expression::null()), &ctx).unwrap();
        assert_eq!(null.count(), 0);
    }

    #[test]
    fn test_partial_index_needs_its_condition_in_the_query() {
        let mut table = two_columns("t");
        for (a, b) in [(1, 20), (2, 20), (3, 30)] {
            table.insert(vec![Value::Int(a), Value::Int(b)]).unwrap();
        }
        let partial = Index::partial(
            Expression::greater(Expression::field("a"), Expression::constant(1)),
            Index::hash("t_b_partial", Expression::field("b")),
        )
        .unwrap();
        table.add_index(partial).unwrap();
        assert_eq!(table.indexes()[0].len(), 2);

        let b_eq_20 = Expression::equals(Expression::field("b"), Expression::constant(20));

        let mut gated = AccessNode::new(&table);
        gated
            .add_filter(Expression::and(
                Expression::greater(Expression::field("a"), Expression::constant(1)),
                b_eq_20.clone(),
            ))
            .unwrap();
        let rows = optimize_and_execute(&mut gated).unwrap();
        assert_eq!(
            gated.strategy().and_then(|s| s.index_name()),
            Some("t_b_partial")
        );
        assert_eq!(gated.filter(), None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values(), &[Value::Int(2), Value::Int(20)]);

        let mut ungated = AccessNode::new(&table);
        ungated.add_filter(b_eq_20).unwrap();
        let rows = optimize_and_execute(&mut ungated).unwrap();
        assert_eq!(ungated.strategy().and_then(|s| s.index_name()), None);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_wrapping_a_partial_index_is_rejected() {
        let inner = Index::partial(
            Expression::greater(Expression::field("a"), Expression::constant(1)),
            Index::hash("h", Expression::field("b")),
        )
        .unwrap();
        let nested = Index::partial(Expression::constant(true), inner);
        assert!(matches!(nested, Err(QueryError::InvalidIndex { .. })));
    }

    #[test]
    fn test_unique_violation_rolls_back_every_index() {
        let mut table = two_columns("t");
        table
            .add_index(Index::btree("t_a", vec![Expression::field("a")]))
            .unwrap();
        table
            .add_index(Index::unique_btree("t_b", vec![Expression::field("b")]))
            .unwrap();

        let first = table.insert(vec![Value::Int(1), Value::Int(10)]).unwrap();
        let err = table
            .insert(vec![Value::Int(2), Value::Int(10)])
            .unwrap_err();
        assert!(matches!(err, QueryError::UniqueViolation { .. }));
        assert_eq!(table.len(), 1);
        assert_eq!(table.indexes()[0].len(), 1);
        assert_eq!(table.indexes()[1].len(), 1);

        let second = table.insert(vec![Value::Int(2), Value::Int(20)]).unwrap();
        assert!(second.tid() > first.tid());
        assert_eq!(table.tids(), vec![first.tid().unwrap(), second.tid().unwrap()]);
    }

    #[test]
    fn test_index_with_unknown_column_is_rejected() {
        let mut table = two_columns("t");
        let err = table
            .add_index(Index::btree("t_z", vec![Expression::field("z")]))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIndex { .. }));
        assert!(table.indexes().is_empty());
    }

    #[test]
    fn test_incomparable_bound_fails_like_a_table_scan() {
        let query = |table: &Table, filter: Expression| {
            let mut access = AccessNode::new(table);
            access.add_filter(filter).unwrap();
            let result = optimize_and_execute(&mut access);
            let index = access.strategy().and_then(|s| s.index_name()).map(str::to_string);
            (index, result)
        };
        let a_gt_text = || Expression::greater(Expression::field("a"), Expression::constant("x"));
        let a_eq_text = || Expression::equals(Expression::field("a"), Expression::constant("x"));

        let mut table = two_columns("t");
        for a in [1, 2, 3] {
            table.insert(vec![Value::Int(a), Value::Int(0)]).unwrap();
        }
        let (index, scanned) = query(&table, a_gt_text());
        assert_eq!(index, None);
        assert!(matches!(scanned, Err(QueryError::TypeMismatch { .. })));

        let mut ordered = table.clone();
        ordered
            .add_index(Index::btree("t_a", vec![Expression::field("a")]))
            .unwrap();
        let (index, via_btree) = query(&ordered, a_gt_text());
        assert_eq!(index.as_deref(), Some("t_a"));
        assert_eq!(via_btree, scanned);

        let mut hashed = table.clone();
        hashed
            .add_index(Index::hash("t_a_hash", Expression::field("a")))
            .unwrap();
        let (index, via_hash) = query(&hashed, a_eq_text());
        assert_eq!(index.as_deref(), Some("t_a_hash"));
        assert!(matches!(via_hash, Err(QueryError::TypeMismatch { .. })));

        let mut empty = two_columns("t");
        empty
            .add_index(Index::btree("t_a", vec![Expression::field("a")]))
            .unwrap();
        let (_, nothing) = query(&empty, a_gt_text());
        assert_eq!(nothing.unwrap().len(), 0);
    }
}
