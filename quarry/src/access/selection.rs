/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::strategy::AccessStrategy;
use crate::config::AccessConfig;
use crate::indexes::btree::extract_bounds;
use crate::indexes::{
    BTreeIndex, BTreeScanOptions, HashIndex, HashScanOptions, Index, ScanDirection, ScanOptions,
};
use crate::table::Table;
use log::{debug, trace};
use shared::error::Result;
use shared::expression::{BinaryOp, Expression};
use shared::filter;
use shared::order::OrderExpression;

/// Candidate produced for one index before scoring
struct Candidate {
    options: ScanOptions,
    consumed: Vec<Expression>,
    ordering: OrderExpression,
}

/// Picks the highest scoring way to read `table` for the given filter and
/// order. The table scan scores 0; a candidate must score strictly higher
/// to replace the current best, so ties keep the earlier index.
pub fn select_access_strategy<'t>(
    table: &'t Table,
    filter: Option<&Expression>,
    order: Option<&OrderExpression>,
    config: &AccessConfig,
) -> Result<AccessStrategy<'t>> {
    let conjuncts = filter::conjunctions(filter);
    let requested = order.filter(|order| !order.is_empty());

    let mut best = AccessStrategy::TableScan { table };
    let mut best_score = 0u32;

    for index in table.indexes() {
        if !partial_applies(index, &conjuncts) {
            trace!("index {}: partial condition not implied by filter", index.name());
            continue;
        }
        let candidate = match index.base() {
            Index::BTree(btree) => btree_candidate(table, btree, &conjuncts, requested)?,
            Index::Hash(hash) => match hash_candidate(table, hash, &conjuncts)? {
                Some(candidate) => candidate,
                None => continue,
            },
            Index::Partial(_) => continue,
        };

        let enforced = filter::union([index.filter(), filter::and_all(candidate.consumed).as_ref()]);
        let remaining = filter::difference(filter, enforced.as_ref());
        let absorbed = conjuncts.len() - filter::conjunction_count(remaining.as_ref());

        let mut score = config.filter_weight * absorbed as u32;
        if let Some(requested) = requested {
            if candidate.ordering.subsumes(requested) {
                score += config.order_bonus;
            }
        }
        trace!(
            "index {} on {}: score {} ({} conjuncts absorbed)",
            index.name(),
            table.name(),
            score,
            absorbed
        );

        if score > best_score {
            best_score = score;
            best = AccessStrategy::IndexScan {
                table,
                index,
                options: candidate.options,
                filter: enforced,
                ordering: candidate.ordering,
            };
        }
    }

    debug!("access for {}: {} (score {})", table.name(), best, best_score);
    Ok(best)
}

/// Every conjunct of a partial index condition must already be in the filter
fn partial_applies(index: &Index, conjuncts: &[Expression]) -> bool {
    filter::conjunctions(index.filter())
        .iter()
        .all(|conjunct| filter::contains(conjuncts, conjunct))
}

/// Bound and probe expressions may not read the table being scanned
fn is_external(table: &Table, expression: &Expression) -> Result<bool> {
    Ok(!expression.references_any(table.fields())?)
}

fn btree_candidate(
    table: &Table,
    index: &BTreeIndex,
    conjuncts: &[Expression],
    requested: Option<&OrderExpression>,
) -> Result<Candidate> {
    let (bounds, consumed) =
        extract_bounds(index.expressions(), conjuncts, |e| is_external(table, e))?;
    let forward = index.ordering();
    let (direction, ordering) = match requested {
        Some(requested) if !forward.subsumes(requested) && forward.reversed().subsumes(requested) => {
            (ScanDirection::Backward, forward.reversed())
        }
        _ => (ScanDirection::Forward, forward),
    };
    Ok(Candidate {
        options: ScanOptions::BTree(BTreeScanOptions { bounds, direction }),
        consumed,
        ordering,
    })
}

fn hash_candidate(
    table: &Table,
    index: &HashIndex,
    conjuncts: &[Expression],
) -> Result<Option<Candidate>> {
    for conjunct in conjuncts {
        let Expression::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } = conjunct
        else {
            continue;
        };
        let probe = if left.equal(index.expression()) && is_external(table, right)? {
            right
        } else if right.equal(index.expression()) && is_external(table, left)? {
            left
        } else {
            continue;
        };
        return Ok(Some(Candidate {
            options: ScanOptions::Hash(HashScanOptions {
                probe: probe.as_ref().clone(),
            }),
            consumed: vec![conjunct.clone()],
            ordering: OrderExpression::default(),
        }));
    }
    Ok(None)
}
