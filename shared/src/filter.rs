/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Set operations over AND-conjunct sets.
//!
//! A filter is an `Option<Expression>` where `None` means "no predicate". Every
//! operation flattens its inputs into conjuncts and compares them with
//! [`Expression::equal`], dropping structural duplicates.

use crate::expression::Expression;

/// Flattened, deduplicated conjuncts of `filter`
pub fn conjunctions(filter: Option<&Expression>) -> Vec<Expression> {
    let mut out: Vec<Expression> = Vec::new();
    if let Some(filter) = filter {
        for conjunct in filter.conjunctions() {
            push_unique(&mut out, conjunct);
        }
    }
    out
}

/// ANDs conjuncts back together; empty input is `None`
pub fn and_all(conjuncts: Vec<Expression>) -> Option<Expression> {
    conjuncts.into_iter().reduce(Expression::and)
}

pub fn contains(conjuncts: &[Expression], expression: &Expression) -> bool {
    conjuncts.iter().any(|c| c.equal(expression))
}

pub fn conjunction_count(filter: Option<&Expression>) -> usize {
    conjunctions(filter).len()
}

pub fn union<'a, I>(filters: I) -> Option<Expression>
where
    I: IntoIterator<Item = Option<&'a Expression>>,
{
    let mut out: Vec<Expression> = Vec::new();
    for filter in filters.into_iter().flatten() {
        for conjunct in filter.conjunctions() {
            push_unique(&mut out, conjunct);
        }
    }
    and_all(out)
}

/// Conjuncts of `f` not present in `g`
pub fn difference(f: Option<&Expression>, g: Option<&Expression>) -> Option<Expression> {
    let remove = conjunctions(g);
    and_all(
        conjunctions(f)
            .into_iter()
            .filter(|c| !contains(&remove, c))
            .collect(),
    )
}

/// Conjuncts of `f` also present in `g`
pub fn intersection(f: Option<&Expression>, g: Option<&Expression>) -> Option<Expression> {
    let keep = conjunctions(g);
    and_all(
        conjunctions(f)
            .into_iter()
            .filter(|c| contains(&keep, c))
            .collect(),
    )
}

fn push_unique(out: &mut Vec<Expression>, conjunct: Expression) {
    if !contains(out, &conjunct) {
        out.push(conjunct);
    }
}
