/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::field::{resolve, Field, FieldRef};
use crate::row::Row;
use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    IsDistinctFrom,
}

impl BinaryOp {
    /// Operand order does not matter
    pub fn is_symmetric(self) -> bool {
        matches!(
            self,
            BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Plus
                | BinaryOp::Multiply
                | BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::IsDistinctFrom
        )
    }

    /// `=`, `<>`, `<`, `<=`, `>`, `>=`
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    /// The operator that gives the same result with swapped operands
    pub fn flip(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Lt => Some(BinaryOp::Gt),
            BinaryOp::LtEq => Some(BinaryOp::GtEq),
            BinaryOp::Gt => Some(BinaryOp::Lt),
            BinaryOp::GtEq => Some(BinaryOp::LtEq),
            op if op.is_symmetric() => Some(op),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::IsDistinctFrom => "IS DISTINCT FROM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

/// Scalar expression tree evaluated against a row and an execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Constant(Value),
    Field(FieldRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn null() -> Self {
        Expression::Constant(Value::Null)
    }

    /// Field reference, `rel.name` or `name`
    pub fn field(name: &str) -> Self {
        Expression::Field(FieldRef::parse(name))
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn not_equals(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::NotEq, left, right)
    }

    pub fn less(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Lt, left, right)
    }

    pub fn less_eq(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::LtEq, left, right)
    }

    pub fn greater(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Gt, left, right)
    }

    pub fn greater_eq(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::GtEq, left, right)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    pub fn plus(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Plus, left, right)
    }

    pub fn minus(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Minus, left, right)
    }

    pub fn times(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Multiply, left, right)
    }

    pub fn divide(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Divide, left, right)
    }

    pub fn distinct_from(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::IsDistinctFrom, left, right)
    }

    pub fn logical_not(operand: Expression) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    pub fn negate(operand: Expression) -> Self {
        Self::unary(UnaryOp::Negate, operand)
    }

    pub fn is_null(operand: Expression) -> Self {
        Self::unary(UnaryOp::IsNull, operand)
    }

    pub fn is_not_null(operand: Expression) -> Self {
        Self::unary(UnaryOp::IsNotNull, operand)
    }

    /// Structural equality modulo operand order of symmetric operators and
    /// flipped comparisons (`a > b` equals `b < a`).
    pub fn equal(&self, other: &Expression) -> bool {
        match (self, other) {
            (Expression::Constant(a), Expression::Constant(b)) => {
                a.data_type() == b.data_type() && a == b
            }
            (Expression::Field(a), Expression::Field(b)) => a == b,
            (
                Expression::Unary { op, operand },
                Expression::Unary {
                    op: other_op,
                    operand: other_operand,
                },
            ) => op == other_op && operand.equal(other_operand),
            (
                Expression::Binary { op, left, right },
                Expression::Binary {
                    op: other_op,
                    left: other_left,
                    right: other_right,
                },
            ) => {
                if op == other_op && left.equal(other_left) && right.equal(other_right) {
                    return true;
                }
                op.flip() == Some(*other_op) && left.equal(other_right) && right.equal(other_left)
            }
            _ => false,
        }
    }

    /// Flattened AND conjuncts; a non-AND expression is its own single conjunct
    pub fn conjunctions(&self) -> Vec<Expression> {
        let mut out = Vec::new();
        self.collect_conjunctions(&mut out);
        out
    }

    fn collect_conjunctions(&self, out: &mut Vec<Expression>) {
        match self {
            Expression::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                left.collect_conjunctions(out);
                right.collect_conjunctions(out);
            }
            other => out.push(other.clone()),
        }
    }

    /// Free field references, deduplicated, in first-occurrence order
    pub fn fields(&self) -> Vec<FieldRef> {
        let mut out: Vec<FieldRef> = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<FieldRef>) {
        match self {
            Expression::Constant(_) => {}
            Expression::Field(reference) => {
                if !out.contains(reference) {
                    out.push(reference.clone());
                }
            }
            Expression::Unary { operand, .. } => operand.collect_fields(out),
            Expression::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }

    /// Rebuilds the tree bottom-up, replacing every sub-expression for which
    /// `f` returns a replacement.
    pub fn map<F>(&self, f: &mut F) -> Expression
    where
        F: FnMut(&Expression) -> Option<Expression>,
    {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expression::Constant(_) | Expression::Field(_) => self.clone(),
            Expression::Unary { op, operand } => Expression::unary(*op, operand.map(f)),
            Expression::Binary { op, left, right } => {
                Expression::binary(*op, left.map(f), right.map(f))
            }
        }
    }

    /// Fallible variant of [`Expression::map`]
    pub fn try_map<F>(&self, f: &mut F) -> Result<Expression>
    where
        F: FnMut(&Expression) -> Result<Option<Expression>>,
    {
        if let Some(replacement) = f(self)? {
            return Ok(replacement);
        }
        Ok(match self {
            Expression::Constant(_) | Expression::Field(_) => self.clone(),
            Expression::Unary { op, operand } => Expression::unary(*op, operand.try_map(f)?),
            Expression::Binary { op, left, right } => {
                Expression::binary(*op, left.try_map(f)?, right.try_map(f)?)
            }
        })
    }

    /// Positional relation rename: a reference resolving to column `i` of
    /// `from` is rewritten to the fully qualified reference of `to[i]`.
    /// References that `from` does not produce are kept as they are.
    pub fn alias(&self, from: &[Field], to: &[Field]) -> Result<Expression> {
        self.try_map(&mut |expression| match expression {
            Expression::Field(reference) => Ok(resolve(from, reference)?
                .and_then(|position| to.get(position))
                .map(|field| Expression::Field(field.reference()))),
            _ => Ok(None),
        })
    }

    /// Rewrites references produced by `fields` into fully qualified form
    pub fn qualify(&self, fields: &[Field]) -> Result<Expression> {
        self.alias(fields, fields)
    }

    /// Every free field is produced by `fields`
    pub fn resolves_within(&self, fields: &[Field]) -> Result<bool> {
        for reference in self.fields() {
            if resolve(fields, &reference)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// At least one free field is produced by `fields`
    pub fn references_any(&self, fields: &[Field]) -> Result<bool> {
        for reference in self.fields() {
            if resolve(fields, &reference)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Result type when evaluated over rows shaped like `fields`
    pub fn data_type(&self, fields: &[Field]) -> DataType {
        match self {
            Expression::Constant(value) => value.data_type(),
            Expression::Field(reference) => match resolve(fields, reference) {
                Ok(Some(position)) => fields[position].data_type,
                _ => DataType::Any,
            },
            Expression::Unary {
                op: UnaryOp::Negate,
                operand,
            } => operand.data_type(fields),
            Expression::Unary { .. } => DataType::Bool,
            Expression::Binary { op, left, right } => match op {
                BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
                    match (left.data_type(fields), right.data_type(fields)) {
                        (DataType::Int, DataType::Int) => DataType::Int,
                        (DataType::Float, r) if r.is_numeric() => DataType::Float,
                        (l, DataType::Float) if l.is_numeric() => DataType::Float,
                        _ => DataType::Any,
                    }
                }
                _ => DataType::Bool,
            },
        }
    }

    /// Constant folding with AND/OR short-cut simplification.
    /// Sub-trees whose evaluation fails are left unfolded.
    pub fn fold(&self) -> Expression {
        match self {
            Expression::Constant(_) | Expression::Field(_) => self.clone(),
            Expression::Unary { op, operand } => {
                let folded = Expression::unary(*op, operand.fold());
                folded.fold_constant()
            }
            Expression::Binary { op, left, right } => {
                let left = left.fold();
                let right = right.fold();
                match op {
                    BinaryOp::And => {
                        if left.is_constant(false) || right.is_constant(false) {
                            return Expression::constant(false);
                        }
                        if left.is_constant(true) {
                            return right;
                        }
                        if right.is_constant(true) {
                            return left;
                        }
                    }
                    BinaryOp::Or => {
                        if left.is_constant(true) || right.is_constant(true) {
                            return Expression::constant(true);
                        }
                        if left.is_constant(false) {
                            return right;
                        }
                        if right.is_constant(false) {
                            return left;
                        }
                    }
                    _ => {}
                }
                Expression::binary(*op, left, right).fold_constant()
            }
        }
    }

    fn fold_constant(self) -> Expression {
        let all_constant = match &self {
            Expression::Unary { operand, .. } => matches!(**operand, Expression::Constant(_)),
            Expression::Binary { left, right, .. } => {
                matches!(**left, Expression::Constant(_))
                    && matches!(**right, Expression::Constant(_))
            }
            _ => false,
        };
        if !all_constant {
            return self;
        }
        match self.value_in(&ExecutionContext::new()) {
            Ok(value) => Expression::Constant(value),
            Err(_) => self,
        }
    }

    fn is_constant(&self, b: bool) -> bool {
        matches!(self, Expression::Constant(Value::Bool(v)) if *v == b)
    }

    /// Evaluates against `row`, falling back to the context's outer rows
    pub fn value_from(&self, ctx: &ExecutionContext, row: &Row) -> Result<Value> {
        self.evaluate(ctx, Some(row))
    }

    /// Evaluates with no current row (index bounds, hash probes)
    pub fn value_in(&self, ctx: &ExecutionContext) -> Result<Value> {
        self.evaluate(ctx, None)
    }

    /// Predicate test: unknown counts as false
    pub fn holds(&self, ctx: &ExecutionContext, row: &Row) -> Result<bool> {
        Ok(self.value_from(ctx, row)?.as_bool()?.unwrap_or(false))
    }

    fn evaluate(&self, ctx: &ExecutionContext, row: Option<&Row>) -> Result<Value> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::Field(reference) => ctx.lookup(row, reference),
            Expression::Unary { op, operand } => {
                let value = operand.evaluate(ctx, row)?;
                evaluate_unary(*op, value)
            }
            Expression::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let l = left.evaluate(ctx, row)?.as_bool()?;
                    if l == Some(false) {
                        return Ok(Value::Bool(false));
                    }
                    let r = right.evaluate(ctx, row)?.as_bool()?;
                    Ok(match (l, r) {
                        (_, Some(false)) => Value::Bool(false),
                        (Some(true), Some(true)) => Value::Bool(true),
                        _ => Value::Null,
                    })
                }
                BinaryOp::Or => {
                    let l = left.evaluate(ctx, row)?.as_bool()?;
                    if l == Some(true) {
                        return Ok(Value::Bool(true));
                    }
                    let r = right.evaluate(ctx, row)?.as_bool()?;
                    Ok(match (l, r) {
                        (_, Some(true)) => Value::Bool(true),
                        (Some(false), Some(false)) => Value::Bool(false),
                        _ => Value::Null,
                    })
                }
                _ => {
                    let l = left.evaluate(ctx, row)?;
                    let r = right.evaluate(ctx, row)?;
                    evaluate_binary(*op, &l, &r)
                }
            },
        }
    }
}

fn evaluate_unary(op: UnaryOp, value: Value) -> Result<Value> {
    match op {
        UnaryOp::IsNull => Ok(Value::Bool(value.is_null())),
        UnaryOp::IsNotNull => Ok(Value::Bool(!value.is_null())),
        UnaryOp::Not => Ok(value.as_bool()?.map_or(Value::Null, |b| Value::Bool(!b))),
        UnaryOp::Negate => match value {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or(QueryError::IntegerOverflow),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(QueryError::TypeMismatch {
                op: "-".to_string(),
                left: other.data_type().to_string(),
                right: DataType::Int.to_string(),
            }),
        },
    }
}

fn evaluate_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if op == BinaryOp::IsDistinctFrom {
        return Ok(Value::Bool(left.is_distinct_from(right)));
    }
    if op.is_comparison() {
        let ordering = left.sql_cmp(right)?;
        return Ok(ordering.map_or(Value::Null, |ordering| {
            Value::Bool(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::NotEq => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }));
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Plus => a.checked_add(*b),
                BinaryOp::Minus => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                _ => {
                    if *b == 0 {
                        return Err(QueryError::DivisionByZero);
                    }
                    a.checked_div(*b)
                }
            };
            result.map(Value::Int).ok_or(QueryError::IntegerOverflow)
        }
        (a, b) if a.data_type().is_numeric() && b.data_type().is_numeric() => {
            let (a, b) = (as_float(a), as_float(b));
            Ok(Value::Float(match op {
                BinaryOp::Plus => a + b,
                BinaryOp::Minus => a - b,
                BinaryOp::Multiply => a * b,
                _ => {
                    if b == 0.0 {
                        return Err(QueryError::DivisionByZero);
                    }
                    a / b
                }
            }))
        }
        (a, b) => Err(QueryError::TypeMismatch {
            op: op.symbol().to_string(),
            left: a.data_type().to_string(),
            right: b.data_type().to_string(),
        }),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Field(reference) => write!(f, "{}", reference),
            Expression::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {}", operand),
                UnaryOp::Negate => write!(f, "-{}", operand),
                UnaryOp::IsNull => write!(f, "{} IS NULL", operand),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", operand),
            },
            Expression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn row(a: Value, b: Value) -> Row {
        let fields: Arc<[Field]> = vec![
            Field::new(Some("t"), "a", DataType::Int),
            Field::new(Some("t"), "b", DataType::Int),
        ]
        .into();
        Row::new(fields, vec![a, b]).unwrap()
    }

    #[test]
    fn test_equal_symmetric_and_flipped() {
        let a = Expression::field("a");
        let one = Expression::constant(1);
        assert!(Expression::equals(a.clone(), one.clone())
            .equal(&Expression::equals(one.clone(), a.clone())));
        assert!(Expression::greater(a.clone(), one.clone())
            .equal(&Expression::less(one.clone(), a.clone())));
        assert!(!Expression::greater(a.clone(), one.clone())
            .equal(&Expression::greater(one.clone(), a.clone())));
        assert!(!Expression::minus(a.clone(), one.clone()).equal(&Expression::minus(one, a)));
    }

    #[test]
    fn test_conjunctions_flatten() {
        let e = Expression::and(
            Expression::and(Expression::field("a"), Expression::field("b")),
            Expression::or(Expression::field("c"), Expression::field("d")),
        );
        assert_eq!(e.conjunctions().len(), 3);
    }

    #[test]
    fn test_fold() {
        let e = Expression::and(
            Expression::constant(true),
            Expression::greater(
                Expression::field("a"),
                Expression::plus(Expression::constant(1), Expression::constant(2)),
            ),
        );
        let folded = e.fold();
        assert!(folded.equal(&Expression::greater(
            Expression::field("a"),
            Expression::constant(3)
        )));
        let division = Expression::divide(Expression::constant(1), Expression::constant(0));
        assert_eq!(division.fold(), division);
    }

    #[test]
    fn test_three_valued_logic() {
        let ctx = ExecutionContext::new();
        let r = row(Value::Null, Value::Int(2));
        let unknown = Expression::equals(Expression::field("a"), Expression::constant(1));
        assert_eq!(unknown.value_from(&ctx, &r).unwrap(), Value::Null);
        assert!(!unknown.holds(&ctx, &r).unwrap());
        let or = Expression::or(
            unknown.clone(),
            Expression::equals(Expression::field("b"), Expression::constant(2)),
        );
        assert!(or.holds(&ctx, &r).unwrap());
        let and = Expression::and(Expression::constant(false), unknown);
        assert_eq!(and.value_from(&ctx, &r).unwrap(), Value::Bool(false));
        let distinct = Expression::distinct_from(Expression::field("a"), Expression::null());
        assert!(!distinct.holds(&ctx, &r).unwrap());
    }

    #[test]
    fn test_arithmetic_errors() {
        let ctx = ExecutionContext::new();
        let div = Expression::divide(Expression::constant(4), Expression::constant(0));
        assert_eq!(div.value_in(&ctx).unwrap_err(), QueryError::DivisionByZero);
        let overflow = Expression::plus(Expression::constant(i64::MAX), Expression::constant(1));
        assert_eq!(overflow.value_in(&ctx).unwrap_err(), QueryError::IntegerOverflow);
        let mixed = Expression::times(Expression::constant(2), Expression::constant(1.5));
        assert_eq!(mixed.value_in(&ctx).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_qualify_keeps_outer_refs() {
        let fields = vec![Field::new(Some("t"), "a", DataType::Int)];
        let e = Expression::equals(Expression::field("a"), Expression::field("u.x"));
        let qualified = e.qualify(&fields).unwrap();
        assert_eq!(
            qualified.fields(),
            vec![FieldRef::parse("t.a"), FieldRef::parse("u.x")]
        );
    }

    #[test]
    fn test_outer_row_evaluation() {
        let outer = row(Value::Int(7), Value::Int(8));
        let ctx = ExecutionContext::new().with_outer_row(outer);
        let probe = Expression::plus(Expression::field("t.a"), Expression::constant(1));
        assert_eq!(probe.value_in(&ctx).unwrap(), Value::Int(8));
    }
}
