/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};
use shared::error::{QueryError, Result};

/// Weights used when scoring access strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Added when a candidate already yields the requested order
    pub order_bonus: u32,
    /// Added per filter conjunct a candidate enforces
    pub filter_weight: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            order_bonus: 100,
            filter_weight: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategyKind {
    /// Hash join for equi-joins, nested loop otherwise
    #[default]
    Auto,
    NestedLoop,
    Hash,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub strategy: JoinStrategyKind,
}

/// Planner settings handed to the nodes that make choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub access: AccessConfig,
    pub join: JoinConfig,
}

impl PlannerConfig {
    /// Parses a JSON document; missing keys keep their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| QueryError::Config(err.to_string()))
    }

    pub fn with_join_strategy(mut self, strategy: JoinStrategyKind) -> Self {
        self.join.strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.access.order_bonus, 100);
        assert_eq!(config.access.filter_weight, 10);
        assert_eq!(config.join.strategy, JoinStrategyKind::Auto);
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            PlannerConfig::from_json(r#"{"access": {"filter_weight": 3}, "join": {"strategy": "nested_loop"}}"#)
                .unwrap();
        assert_eq!(config.access.order_bonus, 100);
        assert_eq!(config.access.filter_weight, 3);
        assert_eq!(config.join.strategy, JoinStrategyKind::NestedLoop);
        assert!(matches!(
            PlannerConfig::from_json(r#"{"join": {"strategy": "sideways"}}"#),
            Err(QueryError::Config(_))
        ));
    }
}
