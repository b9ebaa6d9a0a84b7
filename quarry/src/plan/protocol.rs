/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Behaviour shared by every plan node, called explicitly from each operator.

use shared::error::{QueryError, Result};
use shared::expression::Expression;
use shared::field::{resolve, resolve_required, Field};
use shared::filter;
use shared::order::OrderExpression;

/// Moves a node from Built to Optimized
pub fn begin_optimize(optimized: &mut bool, name: &str) -> Result<()> {
    if *optimized {
        return Err(QueryError::AlreadyOptimized(name.to_string()));
    }
    *optimized = true;
    Ok(())
}

/// Scanning requires an optimized node
pub fn guard_optimized(optimized: bool, name: &str) -> Result<()> {
    if optimized {
        Ok(())
    } else {
        Err(QueryError::NotOptimized(name.to_string()))
    }
}

/// Pushdowns are only accepted before optimization
pub fn guard_open(optimized: bool, name: &str) -> Result<()> {
    if optimized {
        Err(QueryError::AlreadyOptimized(name.to_string()))
    } else {
        Ok(())
    }
}

/// ANDs `incoming` into the accumulated predicate
pub fn push_filter(pending: &mut Option<Expression>, incoming: Expression) {
    *pending = filter::union([pending.as_ref(), Some(&incoming)]);
}

/// The most recently pushed order wins
pub fn push_order(pending: &mut Option<OrderExpression>, incoming: OrderExpression) {
    *pending = if incoming.is_empty() {
        None
    } else {
        Some(incoming)
    };
}

/// Part of `requested` not already guaranteed by `guaranteed`
pub fn residual_order(
    requested: Option<&OrderExpression>,
    guaranteed: &OrderExpression,
) -> Option<OrderExpression> {
    match requested {
        Some(requested) if !requested.is_empty() && !guaranteed.subsumes(requested) => {
            Some(requested.clone())
        }
        _ => None,
    }
}

/// Every field of `expression` must resolve, unambiguously, within `fields`
pub fn validate_references(expression: &Expression, fields: &[Field]) -> Result<()> {
    for reference in expression.fields() {
        resolve_required(fields, &reference)?;
    }
    Ok(())
}

pub fn validate_order(order: &OrderExpression, fields: &[Field]) -> Result<()> {
    for term in &order.terms {
        validate_references(&term.expression, fields)?;
    }
    Ok(())
}

/// A reference produced outside `own` (an outer row) that `child` would
/// resolve to one of its own columns once renamed into child names
pub fn captures_outer(expression: &Expression, own: &[Field], child: &[Field]) -> Result<bool> {
    for reference in expression.fields() {
        if resolve(own, &reference)?.is_some() {
            continue;
        }
        if !matches!(resolve(child, &reference), Ok(None)) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Splits a predicate about to be renamed from `own` into `child` names into
/// the conjuncts that can be forwarded and those that must stay here
pub fn split_captured(
    filter: &Expression,
    own: &[Field],
    child: &[Field],
) -> Result<(Option<Expression>, Option<Expression>)> {
    let mut forward = Vec::new();
    let mut kept = Vec::new();
    for conjunct in filter::conjunctions(Some(filter)) {
        if captures_outer(&conjunct, own, child)? {
            kept.push(conjunct);
        } else {
            forward.push(conjunct);
        }
    }
    Ok((filter::and_all(forward), filter::and_all(kept)))
}

/// Folds a predicate; a constant TRUE means no predicate at all
pub fn fold_filter(filter: Option<Expression>) -> Option<Expression> {
    match filter.map(|f| f.fold()) {
        Some(Expression::Constant(shared::value::Value::Bool(true))) => None,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_guards() {
        let mut optimized = false;
        assert!(guard_optimized(optimized, "n").is_err());
        guard_open(optimized, "n").unwrap();
        begin_optimize(&mut optimized, "n").unwrap();
        assert_eq!(
            begin_optimize(&mut optimized, "n").unwrap_err(),
            QueryError::AlreadyOptimized("n".to_string())
        );
        guard_optimized(optimized, "n").unwrap();
        assert!(guard_open(optimized, "n").is_err());
    }

    #[test]
    fn test_push_filter_accumulates() {
        let mut pending = None;
        let a = Expression::greater(Expression::field("a"), Expression::constant(1));
        push_filter(&mut pending, a.clone());
        push_filter(&mut pending, a.clone());
        assert_eq!(filter::conjunction_count(pending.as_ref()), 1);
        assert_eq!(fold_filter(Some(Expression::constant(true))), None);
    }

    #[test]
    fn test_outer_references_captured_by_child_names_stay() {
        use shared::value::DataType;
        let own = [Field::new(Some("x"), "a", DataType::Int)];
        let child = [Field::new(Some("t"), "a", DataType::Int)];
        let captured = Expression::less(Expression::field("t.a"), Expression::field("x.a"));
        let outer = Expression::less(Expression::field("o.a"), Expression::field("x.a"));
        let local = Expression::greater(Expression::field("x.a"), Expression::constant(1));
        let (forward, kept) = split_captured(
            &Expression::and(Expression::and(captured.clone(), outer.clone()), local.clone()),
            &own,
            &child,
        )
        .unwrap();
        assert_eq!(filter::conjunction_count(forward.as_ref()), 2);
        assert!(filter::contains(&filter::conjunctions(forward.as_ref()), &outer));
        assert!(filter::contains(&filter::conjunctions(forward.as_ref()), &local));
        assert!(kept.unwrap().equal(&captured));
    }

    #[test]
    fn test_residual_order() {
        let ab = OrderExpression::asc(vec![Expression::field("a"), Expression::field("b")]);
        let a = OrderExpression::asc(vec![Expression::field("a")]);
        assert_eq!(residual_order(Some(&a), &ab), None);
        assert_eq!(residual_order(Some(&ab), &a), Some(ab.clone()));
        assert_eq!(residual_order(None, &a), None);
    }
}
