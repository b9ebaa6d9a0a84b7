/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::error::{QueryError, Result};
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column descriptor produced by a plan node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub relation: Option<String>,
    pub name: String,
    pub data_type: DataType,
    /// Hidden helper column, not part of the user-visible output
    pub internal: bool,
}

impl Field {
    pub fn new(relation: Option<&str>, name: &str, data_type: DataType) -> Self {
        Self {
            relation: relation.map(str::to_string),
            name: name.to_string(),
            data_type,
            internal: false,
        }
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn with_relation(&self, relation: Option<&str>) -> Self {
        Self {
            relation: relation.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn reference(&self) -> FieldRef {
        FieldRef {
            relation: self.relation.clone(),
            name: self.name.clone(),
        }
    }

    /// An unqualified reference matches by name only
    pub fn matches(&self, reference: &FieldRef) -> bool {
        if self.name != reference.name {
            return false;
        }
        match &reference.relation {
            None => true,
            Some(relation) => self.relation.as_deref() == Some(relation.as_str()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference())
    }
}

/// Reference to a column by (optional relation, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    pub relation: Option<String>,
    pub name: String,
}

impl FieldRef {
    pub fn new(relation: Option<&str>, name: &str) -> Self {
        Self {
            relation: relation.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Parses `rel.name` or `name`
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((relation, name)) => Self::new(Some(relation), name),
            None => Self::new(None, text),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.relation.is_some()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}.{}", relation, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Finds the position of `reference` in `fields`.
///
/// `Ok(None)` when nothing matches; more than one match is an error.
pub fn resolve(fields: &[Field], reference: &FieldRef) -> Result<Option<usize>> {
    let mut found = None;
    for (position, field) in fields.iter().enumerate() {
        if field.matches(reference) {
            if found.is_some() {
                return Err(QueryError::AmbiguousField(reference.to_string()));
            }
            found = Some(position);
        }
    }
    Ok(found)
}

/// Like [`resolve`] but a missing field is an error
pub fn resolve_required(fields: &[Field], reference: &FieldRef) -> Result<usize> {
    resolve(fields, reference)?.ok_or_else(|| QueryError::UnknownField(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<Field> {
        vec![
            Field::new(Some("t"), "a", DataType::Int),
            Field::new(Some("u"), "a", DataType::Int),
            Field::new(Some("u"), "b", DataType::Text),
        ]
    }

    #[test]
    fn test_resolve_qualified() {
        assert_eq!(resolve(&fields(), &FieldRef::parse("u.a")).unwrap(), Some(1));
        assert_eq!(resolve(&fields(), &FieldRef::parse("b")).unwrap(), Some(2));
        assert_eq!(resolve(&fields(), &FieldRef::parse("t.b")).unwrap(), None);
    }

    #[test]
    fn test_resolve_ambiguous() {
        let err = resolve(&fields(), &FieldRef::parse("a")).unwrap_err();
        assert_eq!(err, QueryError::AmbiguousField("a".to_string()));
    }

    #[test]
    fn test_resolve_required_unknown() {
        let err = resolve_required(&fields(), &FieldRef::parse("z")).unwrap_err();
        assert_eq!(err, QueryError::UnknownField("z".to_string()));
    }
}
