/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod context;
pub mod error;
pub mod expression;
pub mod field;
pub mod filter;
pub mod order;
pub mod row;
pub mod value;

pub use context::ExecutionContext;
pub use error::{QueryError, Result};
pub use expression::{BinaryOp, Expression, UnaryOp};
pub use field::{Field, FieldRef};
pub use order::{OrderExpression, OrderTerm};
pub use row::{Row, Tid};
pub use value::{DataType, Value};
