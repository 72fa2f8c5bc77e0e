//! Builds entities and descriptors from records.
//!
//! A loader is bound to one registered type and always works against the
//! registry's latest version of it. Construction drives the full
//! initialization lifecycle; binding maps record fields onto entity
//! properties and reports which names actually changed.

use crate::error::{LoadError, RegistryError};
use crate::registry::EntityRegistry;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use vigil_model::{
    Entity, EntityDescriptor, EntityTypeVersion, EventChannel, HandlerResult, InitializedArgs,
    LazyLoadDirective, LazyRelation,
};
use vigil_types::{EntityUid, Record, SubscriptionId};

/// How a bind treats the entity it writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// First population during construction; no property events fire.
    Initial,
    /// Re-bind of a live entity; `property_changed` fires per changed name.
    Refresh,
}

/// Factory for entities and display descriptors of one type.
pub struct EntityLoader {
    registry: EntityRegistry,
    type_name: String,
    initialized: Mutex<EventChannel<InitializedArgs>>,
}

impl EntityLoader {
    /// Binds a loader to a registered type.
    pub fn for_type(
        registry: EntityRegistry,
        type_name: &str,
    ) -> Result<Self, RegistryError> {
        if !registry.is_registered(type_name) {
            return Err(RegistryError::TypeNotRegistered(type_name.to_string()));
        }
        Ok(Self {
            registry,
            type_name: type_name.to_string(),
            initialized: Mutex::new(EventChannel::new()),
        })
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Subscribes to construction completions. The channel fires once per
    /// entity this loader builds, after the entity settled at rest.
    pub fn on_initialized<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut InitializedArgs) -> HandlerResult + Send + Sync + 'static,
    {
        self.initialized_channel().subscribe(handler)
    }

    pub fn unsubscribe_initialized(&self, id: SubscriptionId) -> bool {
        self.initialized_channel().unsubscribe(id)
    }

    /// Builds a full entity from a record.
    ///
    /// Assigns the uid from the registry's per-type counter, binds scalar
    /// fields, sets up relation slots per the lazy directive, installs
    /// required-property validators and drives the entity through
    /// initialization to `Idle`. Fires the loader's `initialized` channel
    /// before returning.
    pub fn create_entity(
        &self,
        record: &Record,
        lazy: &LazyLoadDirective,
    ) -> Result<Entity, LoadError> {
        let version = self.current_version()?;
        self.check_type(record)?;
        check_required(record, &version)?;

        let uid = if version.has_uid() {
            self.registry.generate_instance_uid(&self.type_name)?
        } else {
            EntityUid::UNASSIGNED
        };
        let mut entity = Entity::new(uid, &self.type_name, record.key.clone());
        entity.begin_initialize();
        entity.apply_updates(&scalar_updates(record, &version), false)?;

        for property in version.relation_properties() {
            let name = property.name();
            match record.field(name) {
                Some(value) if lazy.should_materialize(name) => {
                    entity.materialize_relation(name, value.clone());
                }
                _ => entity.add_relation_slot(name),
            }
        }

        for property in version.required_properties() {
            let name = property.name().to_string();
            entity.events.add_validator(move |view| {
                if view.property(&name).is_some() {
                    Ok(())
                } else {
                    Err(format!("required property '{name}' is missing"))
                }
            });
        }

        entity.complete_initialize();
        debug!(
            entity = %entity.entity_ref(),
            version = version.version(),
            "constructed entity"
        );
        let mut args = InitializedArgs {
            entity: entity.entity_ref(),
        };
        self.initialized_channel().publish(&mut args)?;
        Ok(entity)
    }

    /// Builds a display descriptor straight from a record, without
    /// constructing an entity. The uid stays unassigned; descriptors
    /// are projections, not instances.
    pub fn create_descriptor(
        &self,
        record: &Record,
        ui_context: Option<&str>,
    ) -> Result<EntityDescriptor, LoadError> {
        let version = self.current_version()?;
        self.check_type(record)?;
        let mut descriptor =
            EntityDescriptor::new(EntityUid::UNASSIGNED, &self.type_name, record.key.clone());
        for property in version.properties_for_context(ui_context) {
            if property.is_relation() {
                continue;
            }
            if let Some(value) = record.field(property.name()) {
                descriptor
                    .display_fields
                    .insert(property.name().to_string(), value.clone());
            }
        }
        Ok(descriptor)
    }

    /// Builds a display descriptor for a live entity, carrying its uid.
    pub fn describe(
        &self,
        entity: &Entity,
        ui_context: Option<&str>,
    ) -> Result<EntityDescriptor, LoadError> {
        let version = self.current_version()?;
        let mut descriptor =
            EntityDescriptor::new(entity.uid(), entity.type_name(), entity.key().clone());
        for property in version.properties_for_context(ui_context) {
            if let Some(value) = entity.property(property.name()) {
                descriptor
                    .display_fields
                    .insert(property.name().to_string(), value.clone());
            }
        }
        Ok(descriptor)
    }

    /// Maps a record's fields onto an existing entity.
    ///
    /// Returns the names that actually changed, in field order. Binding
    /// the same record twice with [`BindMode::Refresh`] leaves the entity
    /// unchanged and returns an empty list the second time. Loaded
    /// relation slots are refreshed from the record; not-loaded slots
    /// stay lazy.
    pub fn bind(
        &self,
        record: &Record,
        mode: BindMode,
        entity: &mut Entity,
    ) -> Result<Vec<String>, LoadError> {
        let version = self.current_version()?;
        self.check_type(record)?;
        if entity.type_name() != self.type_name {
            return Err(LoadError::TypeMismatch {
                record_type: entity.type_name().to_string(),
                loader_type: self.type_name.clone(),
            });
        }
        check_required(record, &version)?;

        let fire = matches!(mode, BindMode::Refresh);
        let mut changed = entity.apply_updates(&scalar_updates(record, &version), fire)?;

        for property in version.relation_properties() {
            let name = property.name();
            if let Some(value) = record.field(name) {
                if let Some(slot) = entity.relation_mut(name) {
                    if slot.is_loaded() && slot.value() != Some(value) {
                        *slot = LazyRelation::loaded(value.clone());
                        changed.push(name.to_string());
                    }
                }
            }
        }
        Ok(changed)
    }

    fn current_version(&self) -> Result<Arc<EntityTypeVersion>, RegistryError> {
        self.registry
            .type_version(&self.type_name)
            .ok_or_else(|| RegistryError::TypeNotRegistered(self.type_name.clone()))
    }

    fn check_type(&self, record: &Record) -> Result<(), LoadError> {
        if record.type_name != self.type_name {
            return Err(LoadError::TypeMismatch {
                record_type: record.type_name.clone(),
                loader_type: self.type_name.clone(),
            });
        }
        Ok(())
    }

    fn initialized_channel(&self) -> MutexGuard<'_, EventChannel<InitializedArgs>> {
        self.initialized.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EntityLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityLoader")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Record fields that map onto scalar properties. Declared relation
/// fields are handled through relation slots, never the property map.
fn scalar_updates(record: &Record, version: &EntityTypeVersion) -> Map<String, Value> {
    record
        .fields
        .iter()
        .filter(|(name, _)| version.property(name).is_none_or(|p| !p.is_relation()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn check_required(record: &Record, version: &EntityTypeVersion) -> Result<(), LoadError> {
    for property in version.required_properties() {
        if !record.has_field(property.name()) {
            return Err(LoadError::SchemaMismatch {
                key: record.key.to_string(),
                type_name: version.type_name().to_string(),
                version: version.version(),
                property: property.name().to_string(),
            });
        }
    }
    Ok(())
}
