//! The observed entity collection.

use crate::source::SourceContext;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use vigil_model::Entity;
use vigil_types::{EntityUid, RecordKey};

/// An ordered collection of live entities of one type, together with the
/// source context that defines membership.
///
/// Readers take a shared lock and see fully reconciled state; the
/// observer holds the write lock for the duration of each reconciliation.
pub struct ObservedCollection {
    type_name: String,
    source: SourceContext,
    entities: RwLock<Vec<Entity>>,
}

impl ObservedCollection {
    #[must_use]
    pub fn new(type_name: impl Into<String>, source: SourceContext) -> Self {
        Self {
            type_name: type_name.into(),
            source,
            entities: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn source(&self) -> &SourceContext {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.read().iter().any(|e| e.key() == key)
    }

    /// Record keys of the current members, in collection order.
    #[must_use]
    pub fn keys(&self) -> Vec<RecordKey> {
        self.read().iter().map(|e| e.key().clone()).collect()
    }

    /// Uids of the current members, in collection order.
    #[must_use]
    pub fn uids(&self) -> Vec<EntityUid> {
        self.read().iter().map(Entity::uid).collect()
    }

    /// Appends an entity outside reconciliation, e.g. to seed a
    /// single-entity observation with a previously bound instance.
    pub fn adopt(&self, entity: Entity) {
        self.write().push(entity);
    }

    /// Runs `f` against the member list under the read lock.
    pub fn with_entities<R>(&self, f: impl FnOnce(&[Entity]) -> R) -> R {
        f(&self.read())
    }

    /// Runs `f` against the member with the given key, if present.
    pub fn with_entity<R>(&self, key: &RecordKey, f: impl FnOnce(&Entity) -> R) -> Option<R> {
        self.read().iter().find(|e| e.key() == key).map(f)
    }

    /// Runs `f` against the member with the given key under the write
    /// lock, e.g. to subscribe to its channels or mutate a property.
    pub fn with_entity_mut<R>(
        &self,
        key: &RecordKey,
        f: impl FnOnce(&mut Entity) -> R,
    ) -> Option<R> {
        self.write().iter_mut().find(|e| e.key() == key).map(f)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ObservedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedCollection")
            .field("type_name", &self.type_name)
            .field("source", &self.source)
            .field("len", &self.len())
            .finish()
    }
}
