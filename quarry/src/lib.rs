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
pub mod config;
pub mod indexes;
pub mod joins;
pub mod plan;
pub mod scanner;
pub mod table;

pub use access::{select_access_strategy, AccessStrategy};
pub use config::{AccessConfig, JoinConfig, JoinStrategyKind, PlannerConfig};
pub use indexes::{Index, ScanOptions};
pub use joins::{JoinNode, JoinStrategy};
pub use plan::{optimize_and_execute, Node, PlanBuilder};
pub use scanner::{collect_rows, Scanner};
pub use table::Table;
