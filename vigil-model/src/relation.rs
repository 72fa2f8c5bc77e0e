//! Explicit lazy relation slots and the parent link.
//!
//! Relation loading is deliberate: a [`LazyRelation`] is either loaded or
//! not, and resolving one takes an explicit loader closure. There is no
//! interception or implicit fetch on property access.

use crate::error::RelationLoadError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_types::EntityUid;

/// Whether a [`LazyLoadDirective`]'s name list selects relations to
/// materialize or relations to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LazyLoadDirection {
    /// Eagerly materialize only the named relations.
    Include,
    /// Eagerly materialize everything except the named relations.
    Exclude,
}

/// Controls which declared relations a loader materializes up front.
///
/// Relations left out stay [`LazyRelation::NotLoaded`] until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyLoadDirective {
    pub direction: LazyLoadDirection,
    pub names: Vec<String>,
}

impl LazyLoadDirective {
    /// Materialize only the named relations.
    #[must_use]
    pub fn include<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            direction: LazyLoadDirection::Include,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Materialize everything except the named relations.
    #[must_use]
    pub fn exclude<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            direction: LazyLoadDirection::Exclude,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Materialize every declared relation.
    #[must_use]
    pub fn eager_all() -> Self {
        Self::exclude(Vec::<String>::new())
    }

    /// Whether the loader should materialize `relation` up front.
    #[must_use]
    pub fn should_materialize(&self, relation: &str) -> bool {
        let named = self.names.iter().any(|n| n == relation);
        match self.direction {
            LazyLoadDirection::Include => named,
            LazyLoadDirection::Exclude => !named,
        }
    }
}

impl Default for LazyLoadDirective {
    fn default() -> Self {
        Self::eager_all()
    }
}

/// One relation slot on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum LazyRelation {
    /// Declared but not yet materialized.
    NotLoaded,
    /// Materialized relation data.
    Loaded(Value),
}

impl LazyRelation {
    #[must_use]
    pub fn not_loaded() -> Self {
        Self::NotLoaded
    }

    #[must_use]
    pub fn loaded(value: Value) -> Self {
        Self::Loaded(value)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// The materialized value, if loaded.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Loaded(v) => Some(v),
            Self::NotLoaded => None,
        }
    }

    /// Returns the value, resolving it through `load` on first access.
    ///
    /// A successful resolution replaces the slot with `Loaded`; a failed
    /// one leaves it `NotLoaded` so a later attempt can retry.
    pub fn resolve_with<F>(&mut self, name: &str, load: F) -> Result<&Value, RelationLoadError>
    where
        F: FnOnce() -> Result<Value, String>,
    {
        if let Self::NotLoaded = self {
            let value = load().map_err(|reason| RelationLoadError {
                name: name.to_string(),
                reason,
            })?;
            *self = Self::Loaded(value);
        }
        match self {
            Self::Loaded(v) => Ok(v),
            Self::NotLoaded => unreachable!("slot was just loaded"),
        }
    }
}

impl Default for LazyRelation {
    fn default() -> Self {
        Self::NotLoaded
    }
}

/// Link-type entities point at at most one parent at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub type_name: String,
    pub uid: EntityUid,
}

impl ParentLink {
    #[must_use]
    pub fn new(type_name: impl Into<String>, uid: EntityUid) -> Self {
        Self {
            type_name: type_name.into(),
            uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn include_materializes_only_named() {
        let directive = LazyLoadDirective::include(["Author"]);
        assert!(directive.should_materialize("Author"));
        assert!(!directive.should_materialize("Comments"));
    }

    #[test]
    fn exclude_materializes_all_but_named() {
        let directive = LazyLoadDirective::exclude(["Comments"]);
        assert!(directive.should_materialize("Author"));
        assert!(!directive.should_materialize("Comments"));
    }

    #[test]
    fn resolve_loads_once() {
        let mut slot = LazyRelation::not_loaded();
        let mut calls = 0;
        for _ in 0..2 {
            let value = slot
                .resolve_with("Comments", || {
                    calls += 1;
                    Ok(json!(["first", "second"]))
                })
                .unwrap()
                .clone();
            assert_eq!(value, json!(["first", "second"]));
        }
        assert_eq!(calls, 1);
        assert!(slot.is_loaded());
    }

    #[test]
    fn failed_resolve_stays_not_loaded() {
        let mut slot = LazyRelation::not_loaded();
        let err = slot
            .resolve_with("Comments", || Err("backend offline".into()))
            .unwrap_err();
        assert_eq!(err.name, "Comments");
        assert!(!slot.is_loaded());
    }
}
