//! Lightweight entity projections for display layers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_types::{EntityUid, RecordKey};

/// A minimal projection of an entity: identity plus the fields a display
/// surface actually shows. Built where materializing the full entity graph
/// would be wasteful, e.g. combo-box and list rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub uid: EntityUid,
    pub type_name: String,
    pub key: RecordKey,
    /// Display-relevant field values, keyed by property name.
    pub display_fields: Map<String, Value>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn new(uid: EntityUid, type_name: impl Into<String>, key: RecordKey) -> Self {
        Self {
            uid,
            type_name: type_name.into(),
            key,
            display_fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.display_fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.display_fields.get(name)
    }
}
