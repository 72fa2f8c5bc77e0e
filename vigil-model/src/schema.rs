//! Versioned entity type descriptions.
//!
//! An [`EntityTypeVersion`] is immutable once registered; schema evolution
//! adds a new version rather than editing one in place. Property
//! descriptors carry optional UI-context configuration so display layers
//! can ask for "the properties that matter in context X" without a second
//! schema source.

use serde::{Deserialize, Serialize};

/// The value shape a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Text,
    Number,
    Bool,
    DateTime,
    /// Arbitrary structured data, stored as-is.
    Json,
    /// A related entity or collection, materialized through a lazy slot.
    Relation,
}

/// UI-context-scoped display configuration for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyUiConfig {
    /// The UI context this configuration applies to, e.g. `"catalog"`.
    pub context: String,
    pub label: String,
    pub display_order: u32,
}

/// Describes one property of an entity type version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    name: String,
    kind: PropertyKind,
    required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ui: Vec<PropertyUiConfig>,
}

impl PropertyDescriptor {
    fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            ui: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Text)
    }

    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Number)
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Bool)
    }

    #[must_use]
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::DateTime)
    }

    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Json)
    }

    #[must_use]
    pub fn relation(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Relation)
    }

    /// Marks the property as required: a record binding this type version
    /// must supply a value for it.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds display configuration for one UI context.
    #[must_use]
    pub fn with_ui(
        mut self,
        context: impl Into<String>,
        label: impl Into<String>,
        display_order: u32,
    ) -> Self {
        self.ui.push(PropertyUiConfig {
            context: context.into(),
            label: label.into(),
            display_order,
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.kind == PropertyKind::Relation
    }

    /// Whether this property has configuration for the given UI context.
    #[must_use]
    pub fn visible_in(&self, context: &str) -> bool {
        self.ui.iter().any(|c| c.context == context)
    }

    #[must_use]
    pub fn ui_config(&self, context: &str) -> Option<&PropertyUiConfig> {
        self.ui.iter().find(|c| c.context == context)
    }
}

/// One immutable version of an entity type's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeVersion {
    type_name: String,
    version: u32,
    key_properties: Vec<String>,
    has_uid: bool,
    link_type: bool,
    properties: Vec<PropertyDescriptor>,
}

impl EntityTypeVersion {
    #[must_use]
    pub fn new(type_name: impl Into<String>, version: u32) -> Self {
        Self {
            type_name: type_name.into(),
            version,
            key_properties: Vec::new(),
            has_uid: true,
            link_type: false,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Names a key property. Key values come from the record key fields,
    /// not the uid.
    #[must_use]
    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        self.key_properties.push(name.into());
        self
    }

    /// Marks this type as a link type (child side of a parent link).
    #[must_use]
    pub fn link_type(mut self) -> Self {
        self.link_type = true;
        self
    }

    /// Declares that instances carry no runtime uid.
    #[must_use]
    pub fn without_uid(mut self) -> Self {
        self.has_uid = false;
        self
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn has_uid(&self) -> bool {
        self.has_uid
    }

    #[must_use]
    pub fn has_keys(&self) -> bool {
        !self.key_properties.is_empty()
    }

    #[must_use]
    pub fn is_link_type(&self) -> bool {
        self.link_type
    }

    #[must_use]
    pub fn key_properties(&self) -> &[String] {
        &self.key_properties
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn required_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_required())
    }

    pub fn relation_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_relation())
    }

    /// Properties relevant to a UI context. `None` means the unscoped
    /// full set; `Some(ctx)` keeps only properties configured for `ctx`,
    /// ordered by their configured display order.
    #[must_use]
    pub fn properties_for_context(&self, context: Option<&str>) -> Vec<&PropertyDescriptor> {
        match context {
            None => self.properties.iter().collect(),
            Some(ctx) => {
                let mut scoped: Vec<&PropertyDescriptor> = self
                    .properties
                    .iter()
                    .filter(|p| p.visible_in(ctx))
                    .collect();
                scoped.sort_by_key(|p| p.ui_config(ctx).map_or(u32::MAX, |c| c.display_order));
                scoped
            }
        }
    }
}
