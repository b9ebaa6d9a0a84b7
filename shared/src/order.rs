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
use crate::error::Result;
use crate::expression::Expression;
use crate::field::{Field, FieldRef};
use crate::row::Row;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expression: Expression,
    /// Descending when true
    pub reverse: bool,
}

impl OrderTerm {
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            reverse: false,
        }
    }

    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            reverse: true,
        }
    }

    fn equal(&self, other: &OrderTerm) -> bool {
        self.reverse == other.reverse && self.expression.equal(&other.expression)
    }
}

/// Lexicographic sort key list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderExpression {
    pub terms: Vec<OrderTerm>,
}

impl OrderExpression {
    pub fn new(terms: Vec<OrderTerm>) -> Self {
        Self { terms }
    }

    pub fn asc(expressions: Vec<Expression>) -> Self {
        Self::new(expressions.into_iter().map(OrderTerm::asc).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn equal(&self, other: &OrderExpression) -> bool {
        self.terms.len() == other.terms.len()
            && self.terms.iter().zip(&other.terms).all(|(a, b)| a.equal(b))
    }

    /// `other` is a prefix of `self`, so rows ordered by `self` are also
    /// ordered by `other`.
    pub fn subsumes(&self, other: &OrderExpression) -> bool {
        other.terms.len() <= self.terms.len()
            && other.terms.iter().zip(&self.terms).all(|(a, b)| a.equal(b))
    }

    /// Every direction flipped
    pub fn reversed(&self) -> OrderExpression {
        Self::new(
            self.terms
                .iter()
                .map(|term| OrderTerm {
                    expression: term.expression.clone(),
                    reverse: !term.reverse,
                })
                .collect(),
        )
    }

    pub fn map<F>(&self, f: &mut F) -> OrderExpression
    where
        F: FnMut(&Expression) -> Option<Expression>,
    {
        Self::new(
            self.terms
                .iter()
                .map(|term| OrderTerm {
                    expression: term.expression.map(f),
                    reverse: term.reverse,
                })
                .collect(),
        )
    }

    pub fn try_map<F>(&self, f: &mut F) -> Result<OrderExpression>
    where
        F: FnMut(&Expression) -> Result<Option<Expression>>,
    {
        let mut terms = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            terms.push(OrderTerm {
                expression: term.expression.try_map(f)?,
                reverse: term.reverse,
            });
        }
        Ok(Self::new(terms))
    }

    pub fn alias(&self, from: &[Field], to: &[Field]) -> Result<OrderExpression> {
        let mut terms = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            terms.push(OrderTerm {
                expression: term.expression.alias(from, to)?,
                reverse: term.reverse,
            });
        }
        Ok(Self::new(terms))
    }

    pub fn qualify(&self, fields: &[Field]) -> Result<OrderExpression> {
        self.alias(fields, fields)
    }

    /// Folds each term and drops constant ones, which never affect the order
    pub fn fold(&self) -> OrderExpression {
        Self::new(
            self.terms
                .iter()
                .map(|term| OrderTerm {
                    expression: term.expression.fold(),
                    reverse: term.reverse,
                })
                .filter(|term| !matches!(term.expression, Expression::Constant(_)))
                .collect(),
        )
    }

    pub fn fields(&self) -> Vec<FieldRef> {
        let mut out: Vec<FieldRef> = Vec::new();
        for term in &self.terms {
            for reference in term.expression.fields() {
                if !out.contains(&reference) {
                    out.push(reference);
                }
            }
        }
        out
    }

    /// Evaluated sort key of `row`
    pub fn sort_key(&self, ctx: &ExecutionContext, row: &Row) -> Result<Vec<Value>> {
        self.terms
            .iter()
            .map(|term| term.expression.value_from(ctx, row))
            .collect()
    }

    /// Compares two sort keys produced by [`OrderExpression::sort_key`]
    pub fn compare_keys(&self, left: &[Value], right: &[Value]) -> Ordering {
        for ((term, l), r) in self.terms.iter().zip(left).zip(right) {
            let ordering = l.total_cmp(r);
            let ordering = if term.reverse {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for OrderExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|term| {
                format!(
                    "{} {}",
                    term.expression,
                    if term.reverse { "DESC" } else { "ASC" }
                )
            })
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
