/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::row::Tid;
use crate::value::DataType;
use thiserror::Error;

/// Errors raised while planning or executing a query
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    // Plan time
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("ambiguous field reference `{0}`")]
    AmbiguousField(String),
    #[error("incompatible column types at position {position}: {left} vs {right}")]
    IncompatibleColumnTypes {
        position: usize,
        left: DataType,
        right: DataType,
    },
    #[error("invalid index `{name}`: {reason}")]
    InvalidIndex { name: String, reason: String },
    #[error("node `{0}` has not been optimized")]
    NotOptimized(String),
    #[error("node `{0}` was already optimized")]
    AlreadyOptimized(String),

    // Execution time
    #[error("type mismatch in {op}: {left} vs {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("index `{index}` on table `{table}` references missing row {tid}")]
    MissingRow {
        table: String,
        index: String,
        tid: Tid,
    },
    #[error("duplicate key {key} violates unique index `{index}`")]
    UniqueViolation { index: String, key: String },
    #[error("row is not stored in a table")]
    UnstoredRow,
    #[error("expected {expected} values, found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("scanner does not support mark/restore")]
    MarkRestoreUnsupported,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;
