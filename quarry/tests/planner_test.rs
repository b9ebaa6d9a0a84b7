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
use quarry::access::select_access_strategy;
use quarry::config::{AccessConfig, JoinStrategyKind, PlannerConfig};
use quarry::indexes::Index;
use quarry::plan::{
    optimize_and_execute, AccessNode, FilterNode, LimitNode, Node, OrderNode, PlanBuilder,
    UnionNode,
};
use quarry::table::Table;
use shared::context::ExecutionContext;
use shared::error::QueryError;
use shared::expression::Expression;
use shared::order::OrderExpression;
use shared::row::Row;
use shared::value::{DataType, Value};

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed_table() -> Table {
        let mut table = Table::new("t", &[("a", DataType::Int), ("b", DataType::Int)]);
        for (a, b) in [(1, 10), (2, 20), (3, 30)] {
            table.insert(vec![Value::Int(a), Value::Int(b)]).unwrap();
        }
        table
            .add_index(Index::btree("t_a", vec![Expression::field("a")]))
            .unwrap();
        table
    }

    fn a_between_2_and_3() -> Expression {
        Expression::and(
            Expression::greater_eq(Expression::field("a"), Expression::constant(2)),
            Expression::less_eq(Expression::field("a"), Expression::constant(3)),
        )
    }

    fn by_a() -> OrderExpression {
        OrderExpression::asc(vec![Expression::field("a")])
    }

    fn ints(rows: &[Row]) -> Vec<Vec<Value>> {
        rows.iter().map(|row| row.values().to_vec()).collect()
    }

    #[test]
    fn test_range_query_uses_index_without_sorting() {
        let table = indexed_table();

        let mut access = AccessNode::new(&table);
        access.add_filter(a_between_2_and_3()).unwrap();
        access.add_order(by_a()).unwrap();
        access.optimize().unwrap();
        assert_eq!(access.strategy().and_then(|s| s.index_name()), Some("t_a"));
        assert_eq!(access.filter(), None);
        assert_eq!(access.ordering(), None);

        let filter = FilterNode::new(Box::new(AccessNode::new(&table)), a_between_2_and_3());
        let mut order = OrderNode::new(Box::new(filter), by_a());
        let rows = optimize_and_execute(&mut order).unwrap();
        assert!(!order.needs_sort());
        assert_eq!(
            ints(&rows),
            vec![
                vec![Value::Int(2), Value::Int(20)],
                vec![Value::Int(3), Value::Int(30)]
            ]
        );
    }

    #[test]
    fn test_descending_order_scans_backward() {
        let table = indexed_table();
        let rows = PlanBuilder::scan(&table)
            .order_by(by_a().reversed())
            .execute()
            .unwrap();
        let a: Vec<Value> = rows.iter().map(|r| r.values()[0].clone()).collect();
        assert_eq!(a, vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut table = indexed_table();
        table
            .add_index(Index::hash("t_b", Expression::field("b")))
            .unwrap();
        let filter = Expression::and(
            Expression::equals(Expression::field("t.b"), Expression::constant(20)),
            Expression::greater(Expression::field("t.a"), Expression::constant(1)),
        );
        let order = OrderExpression::asc(vec![Expression::field("t.a")]);
        let config = AccessConfig::default();
        let first = select_access_strategy(&table, Some(&filter), Some(&order), &config).unwrap();
        for _ in 0..10 {
            let again =
                select_access_strategy(&table, Some(&filter), Some(&order), &config).unwrap();
            assert!(first.equivalent(&again));
        }
    }

    #[test]
    fn test_limit_and_offset_do_not_forward_pushdowns() {
        let table = indexed_table();
        let a_gt_1 = Expression::greater(Expression::field("a"), Expression::constant(1));

        let mut limit = LimitNode::new(Box::new(AccessNode::new(&table)), 2);
        limit.add_filter(a_gt_1.clone()).unwrap();
        limit.add_order(by_a().reversed()).unwrap();
        limit.optimize().unwrap();
        assert_eq!(limit.filter(), Some(a_gt_1.clone()));
        assert_eq!(limit.ordering(), Some(by_a().reversed()));

        let rows = PlanBuilder::scan(&table)
            .limit(2)
            .filter(a_gt_1.clone())
            .execute()
            .unwrap();
        assert_eq!(ints(&rows), vec![vec![Value::Int(2), Value::Int(20)]]);

        let rows = PlanBuilder::scan(&table)
            .offset(1)
            .filter(a_gt_1)
            .execute()
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_lifecycle_errors() {
        let table = indexed_table();
        let mut node = PlanBuilder::scan(&table)
            .filter(Expression::greater(Expression::field("a"), Expression::constant(1)))
            .build();
        let err = node.scanner(&ExecutionContext::new()).err().unwrap();
        assert!(matches!(err, QueryError::NotOptimized(_)));

        node.optimize().unwrap();
        assert!(matches!(
            node.optimize().unwrap_err(),
            QueryError::AlreadyOptimized(_)
        ));
        assert!(node.add_order(by_a()).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected_at_plan_time() {
        let table = indexed_table();
        let err = PlanBuilder::scan(&table)
            .filter(Expression::equals(Expression::field("zz"), Expression::constant(1)))
            .execute()
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownField("zz".to_string()));

        let err = PlanBuilder::scan(&table)
            .order_by(OrderExpression::asc(vec![Expression::field("u.a")]))
            .execute()
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(_)));
    }

    #[test]
    fn test_union_reports_intersection_of_residuals() {
        let mut left = Table::new("l", &[("a", DataType::Int), ("b", DataType::Int)]);
        for (a, b) in [(1, 2), (1, 3), (2, 2)] {
            left.insert(vec![Value::Int(a), Value::Int(b)]).unwrap();
        }
        left.add_index(Index::hash("l_a", Expression::field("a")))
            .unwrap();
        let mut right = Table::new("r", &[("a", DataType::Int), ("b", DataType::Int)]);
        for (a, b) in [(1, 2), (3, 2)] {
            right.insert(vec![Value::Int(a), Value::Int(b)]).unwrap();
        }
        let predicate = Expression::and(
            Expression::equals(Expression::field("a"), Expression::constant(1)),
            Expression::equals(Expression::field("b"), Expression::constant(2)),
        );

        let mut union = UnionNode::new(
            Box::new(AccessNode::new(&left)),
            Box::new(AccessNode::new(&right)),
        );
        union.add_filter(predicate.clone()).unwrap();
        union.optimize().unwrap();
        let reported = union.filter().unwrap();
        assert!(reported.equal(&Expression::equals(
            Expression::field("l.b"),
            Expression::constant(2)
        )));

        let rows = PlanBuilder::scan(&left)
            .union_all(PlanBuilder::scan(&right))
            .filter(predicate)
            .execute()
            .unwrap();
        assert_eq!(
            ints(&rows),
            vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::Int(1), Value::Int(2)]
            ]
        );
    }

    #[test]
    fn test_projection_pushes_through_computed_columns() {
        let table = indexed_table();
        let rows = PlanBuilder::scan(&table)
            .project(vec![
                ("a", Expression::field("a")),
                (
                    "total",
                    Expression::plus(Expression::field("a"), Expression::field("b")),
                ),
            ])
            .filter(Expression::greater(
                Expression::field("total"),
                Expression::constant(20),
            ))
            .order_by(OrderExpression::asc(vec![Expression::field("total")]).reversed())
            .execute()
            .unwrap();
        assert_eq!(
            ints(&rows),
            vec![
                vec![Value::Int(3), Value::Int(33)],
                vec![Value::Int(2), Value::Int(22)]
            ]
        );
    }

    #[test]
    fn test_alias_requalifies_columns() {
        let table = indexed_table();
        let rows = PlanBuilder::scan(&table)
            .alias("x")
            .filter(Expression::equals(Expression::field("x.a"), Expression::constant(2)))
            .execute()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields()[0].relation.as_deref(), Some("x"));
    }

    #[test]
    fn test_config_from_json() {
        let config =
            PlannerConfig::from_json(r#"{ "access": { "order_bonus": 0 }, "join": { "strategy": "merge" } }"#)
                .unwrap();
        assert_eq!(config.access.order_bonus, 0);
        assert_eq!(config.access.filter_weight, 10);
        assert_eq!(config.join.strategy, JoinStrategyKind::Merge);
        assert!(matches!(
            PlannerConfig::from_json("{ not json"),
            Err(QueryError::Config(_))
        ));
    }
}
