//! The entity type registry.
//!
//! Registration happens once at startup; afterwards the registry is
//! read-heavy and shared across threads. Reads snapshot an `Arc` of the
//! immutable type table, so registration swapping in a new table never
//! disturbs an in-flight read. Uid counters are shared between snapshots:
//! re-registering a type neither resets nor reuses ids.

use crate::error::RegistryError;
use crate::loader::EntityLoader;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use vigil_model::{EntityTypeVersion, PropertyDescriptor};
use vigil_types::EntityUid;

#[derive(Debug, Clone)]
struct TypeEntry {
    /// Ascending by version number; the last one is current.
    versions: Vec<Arc<EntityTypeVersion>>,
    /// Next instance uid. Starts at 1; zero stays the unassigned marker.
    uid_counter: Arc<AtomicU64>,
}

impl TypeEntry {
    fn new() -> Self {
        Self {
            versions: Vec::new(),
            uid_counter: Arc::new(AtomicU64::new(1)),
        }
    }

    fn latest(&self) -> Option<&Arc<EntityTypeVersion>> {
        self.versions.last()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    types: HashMap<String, TypeEntry>,
}

#[derive(Debug, Default)]
struct RegistryShared {
    table: RwLock<Arc<RegistryInner>>,
}

/// Process-wide table of registered entity types.
///
/// Cheaply cloneable; every clone shares the same type table and uid
/// counters. Explicitly constructed and passed down; there is no global
/// instance.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    shared: Arc<RegistryShared>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one type version.
    ///
    /// Versions accumulate; registering an already-present version number
    /// for a type is rejected rather than edited in place.
    pub fn register(&self, version: EntityTypeVersion) -> Result<(), RegistryError> {
        let mut guard = self
            .shared
            .table
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut types = guard.types.clone();
        let entry = types
            .entry(version.type_name().to_string())
            .or_insert_with(TypeEntry::new);
        if entry.versions.iter().any(|v| v.version() == version.version()) {
            return Err(RegistryError::DuplicateVersion {
                type_name: version.type_name().to_string(),
                version: version.version(),
            });
        }
        debug!(
            type_name = version.type_name(),
            version = version.version(),
            "registered entity type"
        );
        entry.versions.push(Arc::new(version));
        entry.versions.sort_by_key(|v| v.version());
        *guard = Arc::new(RegistryInner { types });
        Ok(())
    }

    /// The latest registered version of a type.
    #[must_use]
    pub fn type_version(&self, name: &str) -> Option<Arc<EntityTypeVersion>> {
        self.snapshot()
            .types
            .get(name)
            .and_then(TypeEntry::latest)
            .cloned()
    }

    /// A specific registered version of a type.
    #[must_use]
    pub fn type_version_at(&self, name: &str, version: u32) -> Option<Arc<EntityTypeVersion>> {
        self.snapshot()
            .types
            .get(name)
            .and_then(|entry| entry.versions.iter().find(|v| v.version() == version))
            .cloned()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.snapshot().types.contains_key(name)
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().types.keys().cloned().collect();
        names.sort();
        names
    }

    /// The latest version's properties, optionally scoped to a UI context.
    ///
    /// `None` returns the full unscoped set; `Some(ctx)` returns only
    /// properties configured for that context, in display order.
    pub fn type_properties(
        &self,
        name: &str,
        ui_context: Option<&str>,
    ) -> Result<Vec<PropertyDescriptor>, RegistryError> {
        let version = self
            .type_version(name)
            .ok_or_else(|| RegistryError::TypeNotRegistered(name.to_string()))?;
        Ok(version
            .properties_for_context(ui_context)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Whether instances of the type carry a runtime uid.
    pub fn has_uid(&self, name: &str) -> Result<bool, RegistryError> {
        self.type_version(name)
            .map(|v| v.has_uid())
            .ok_or_else(|| RegistryError::TypeNotRegistered(name.to_string()))
    }

    /// Whether the type declares key properties.
    pub fn has_keys(&self, name: &str) -> Result<bool, RegistryError> {
        self.type_version(name)
            .map(|v| v.has_keys())
            .ok_or_else(|| RegistryError::TypeNotRegistered(name.to_string()))
    }

    /// Draws the next instance uid for a type.
    ///
    /// Uids are strictly increasing per type for the life of the process
    /// and never zero.
    pub fn generate_instance_uid(&self, name: &str) -> Result<EntityUid, RegistryError> {
        let snapshot = self.snapshot();
        let entry = snapshot
            .types
            .get(name)
            .ok_or_else(|| RegistryError::TypeNotRegistered(name.to_string()))?;
        let raw = entry.uid_counter.fetch_add(1, Ordering::Relaxed);
        Ok(EntityUid::from_raw(raw))
    }

    /// Builds a loader bound to a registered type.
    pub fn loader(&self, name: &str) -> Result<Arc<EntityLoader>, RegistryError> {
        Ok(Arc::new(EntityLoader::for_type(self.clone(), name)?))
    }

    fn snapshot(&self) -> Arc<RegistryInner> {
        Arc::clone(&self.shared.table.read().unwrap_or_else(PoisonError::into_inner))
    }
}
