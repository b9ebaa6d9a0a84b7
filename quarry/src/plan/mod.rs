/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod access;
pub mod alias;
pub mod builder;
pub mod filter;
pub mod limit;
pub mod order;
pub mod projection;
pub mod protocol;
pub mod union;
pub mod values;

pub use access::AccessNode;
pub use alias::AliasNode;
pub use builder::PlanBuilder;
pub use filter::FilterNode;
pub use limit::{LimitNode, OffsetNode};
pub use order::OrderNode;
pub use projection::ProjectionNode;
pub use union::UnionNode;
pub use values::ValuesNode;

use crate::scanner::{collect_rows, FilteredScanner, Scanner};
use shared::context::ExecutionContext;
use shared::error::Result;
use shared::expression::Expression;
use shared::field::Field;
use shared::order::OrderExpression;
use shared::row::Row;
use std::sync::Arc;

/// A node of the plan tree.
///
/// Lifecycle: built, then parents push predicates and orders down with
/// `add_filter`/`add_order`, then `optimize` is called exactly once, after
/// which `scanner` may be called any number of times. Whoever pushes into a
/// child enforces whatever the child reports back through `filter`.
pub trait Node {
    fn name(&self) -> String;

    /// Output columns
    fn fields(&self) -> Arc<[Field]>;

    /// Offers a predicate the parent wants applied to this node's output
    fn add_filter(&mut self, filter: Expression) -> Result<()>;

    /// Offers an order the parent wants this node's output in
    fn add_order(&mut self, order: OrderExpression) -> Result<()>;

    fn optimize(&mut self) -> Result<()>;

    /// Pushed predicate this subtree does not enforce
    fn filter(&self) -> Option<Expression>;

    /// Pushed order this subtree does not guarantee
    fn ordering(&self) -> Option<OrderExpression>;

    /// Scanners of this node implement mark/restore
    fn supports_mark_restore(&self) -> bool;

    fn scanner<'s>(&'s self, ctx: &ExecutionContext) -> Result<Box<dyn Scanner + 's>>;
}

/// Optimizes `root` and drains one scanner over it
pub fn optimize_and_execute(root: &mut dyn Node) -> Result<Vec<Row>> {
    root.optimize()?;
    let ctx = ExecutionContext::new();
    let scanner = root.scanner(&ctx)?;
    let mut scanner = FilteredScanner::wrap(scanner, root.filter(), &ctx);
    collect_rows(scanner.as_mut())
}
