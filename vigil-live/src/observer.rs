//! Live query result observer - reconciles an observed collection
//! against the query engine's change feed.
//!
//! Handles record-level notifications: insert, update, delete. Membership
//! is decided locally by re-evaluating the record against the source
//! context; the observer never goes back to the backing store inside a
//! reconciliation pass.

use crate::collection::ObservedCollection;
use crate::error::{LiveResult, RegistryError};
use crate::loader::{BindMode, EntityLoader};
use crate::registry::EntityRegistry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use vigil_model::{
    Entity, EntityDescriptor, EventChannel, HandlerResult, LazyLoadDirective,
};
use vigil_types::{ChangeKind, Record, RecordKey, SubscriptionId};

/// What the observer treats as "in the live set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserveMode {
    /// Membership follows the source context's predicate.
    Query,
    /// Observes exactly one previously bound entity: the record evaluates
    /// true while that entity is present and not deleted.
    Single(RecordKey),
}

/// One reconciliation outcome surfaced to display layers.
#[derive(Debug, Clone)]
pub enum CollectionChange {
    /// A record entered the live set; a new entity was appended.
    Added(EntityDescriptor),
    /// A member was re-bound in place. `changed` holds the property names
    /// that actually changed, in bind order.
    Updated {
        descriptor: EntityDescriptor,
        changed: Vec<String>,
    },
    /// A member left the live set or its record was deleted.
    Removed {
        key: RecordKey,
        descriptor: EntityDescriptor,
    },
}

/// Arguments published on the observer's `collection_changed` channel.
#[derive(Debug, Clone)]
pub struct CollectionChangedArgs {
    pub change: CollectionChange,
}

/// Subscribes to a change feed and keeps one [`ObservedCollection`]
/// consistent with it.
pub struct LiveQueryObserver {
    loader: Arc<EntityLoader>,
    collection: Arc<ObservedCollection>,
    ui_context: Option<String>,
    mode: ObserveMode,
    collection_changed: Mutex<EventChannel<CollectionChangedArgs>>,
    /// Serializes reconciliation passes arriving on delivery threads.
    apply_lock: Mutex<()>,
}

impl LiveQueryObserver {
    /// Creates a query-mode observer: membership follows the collection's
    /// source context.
    pub fn new(
        loader: Arc<EntityLoader>,
        registry: &EntityRegistry,
        collection: Arc<ObservedCollection>,
        ui_context: Option<String>,
    ) -> Result<Self, RegistryError> {
        Self::build(loader, registry, collection, ui_context, ObserveMode::Query)
    }

    /// Creates a single-entity observer bound to one record key.
    pub fn for_single(
        loader: Arc<EntityLoader>,
        registry: &EntityRegistry,
        collection: Arc<ObservedCollection>,
        ui_context: Option<String>,
        key: RecordKey,
    ) -> Result<Self, RegistryError> {
        Self::build(
            loader,
            registry,
            collection,
            ui_context,
            ObserveMode::Single(key),
        )
    }

    fn build(
        loader: Arc<EntityLoader>,
        registry: &EntityRegistry,
        collection: Arc<ObservedCollection>,
        ui_context: Option<String>,
        mode: ObserveMode,
    ) -> Result<Self, RegistryError> {
        assert_eq!(
            loader.type_name(),
            collection.type_name(),
            "loader type and collection type differ"
        );
        if !registry.is_registered(collection.type_name()) {
            return Err(RegistryError::TypeNotRegistered(
                collection.type_name().to_string(),
            ));
        }
        Ok(Self {
            loader,
            collection,
            ui_context,
            mode,
            collection_changed: Mutex::new(EventChannel::new()),
            apply_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn collection(&self) -> &Arc<ObservedCollection> {
        &self.collection
    }

    #[must_use]
    pub fn ui_context(&self) -> Option<&str> {
        self.ui_context.as_deref()
    }

    #[must_use]
    pub fn mode(&self) -> &ObserveMode {
        &self.mode
    }

    /// Subscribes to reconciliation outcomes.
    pub fn on_collection_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut CollectionChangedArgs) -> HandlerResult + Send + Sync + 'static,
    {
        self.changed_channel().subscribe(handler)
    }

    pub fn unsubscribe_collection_changed(&self, id: SubscriptionId) -> bool {
        self.changed_channel().unsubscribe(id)
    }

    /// Whether the record belongs in the live set right now.
    #[must_use]
    pub fn evaluate(&self, record: &Record) -> bool {
        let entities = self.collection.read();
        self.evaluate_locked(record, &entities)
    }

    fn evaluate_locked(&self, record: &Record, entities: &[Entity]) -> bool {
        match &self.mode {
            ObserveMode::Query => self.collection.source().matches(record),
            ObserveMode::Single(key) => {
                record.key == *key && entities.iter().any(|e| e.key() == key && !e.is_deleted())
            }
        }
    }

    /// Applies one change notification to the collection.
    ///
    /// Notifications for the same key must be delivered in order; this
    /// method serializes concurrent callers, so cross-key notifications
    /// may arrive from any thread.
    pub fn on_record_changed(&self, record: &Record, kind: ChangeKind) -> LiveResult<()> {
        let _serialize = self
            .apply_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if record.type_name != self.collection.type_name() {
            warn!(
                "Skipping {} record {} for unobserved type {}",
                kind, record.key, record.type_name
            );
            return Ok(());
        }
        debug!("Applying {} to record {}", kind, record.key);
        match kind {
            ChangeKind::Inserted => self.apply_inserted(record),
            ChangeKind::Updated => self.apply_updated(record),
            ChangeKind::Deleted => self.apply_deleted(record),
        }
    }

    fn apply_inserted(&self, record: &Record) -> LiveResult<()> {
        {
            let entities = self.collection.read();
            if !self.evaluate_locked(record, &entities) {
                debug!("Record {} does not satisfy the source; skipping", record.key);
                return Ok(());
            }
            if entities.iter().any(|e| e.key() == &record.key) {
                debug!("Record {} already present; skipping insert", record.key);
                return Ok(());
            }
        }
        let entity = self
            .loader
            .create_entity(record, &LazyLoadDirective::default())?;
        let descriptor = self.loader.describe(&entity, self.ui_context.as_deref())?;
        self.collection.write().push(entity);
        debug!("Added record {} to the live set", record.key);
        self.fire(CollectionChange::Added(descriptor))
    }

    fn apply_updated(&self, record: &Record) -> LiveResult<()> {
        let mut entities = self.collection.write();
        let Some(index) = entities.iter().position(|e| e.key() == &record.key) else {
            drop(entities);
            // A record updated into the predicate enters the live set.
            if self.evaluate(record) {
                debug!("Record {} updated into the source; inserting", record.key);
                return self.apply_inserted(record);
            }
            debug!("Update for absent non-member {}; skipping", record.key);
            return Ok(());
        };

        if entities[index].is_deleted() {
            let entity = entities.remove(index);
            let descriptor = self.loader.describe(&entity, self.ui_context.as_deref())?;
            drop(entities);
            debug!("Member {} is deleted; removing from the live set", record.key);
            return self.fire(CollectionChange::Removed {
                key: record.key.clone(),
                descriptor,
            });
        }

        let snapshot = entities[index].snapshot_properties();
        let changed = match self
            .loader
            .bind(record, BindMode::Refresh, &mut entities[index])
        {
            Ok(changed) => changed,
            Err(err) => {
                // Leave the collection as it was before this pass.
                entities[index].restore_properties(snapshot);
                return Err(err.into());
            }
        };

        if !self.evaluate_locked(record, &entities) {
            let entity = entities.remove(index);
            let descriptor = self.loader.describe(&entity, self.ui_context.as_deref())?;
            drop(entities);
            debug!("Record {} left the source; removing", record.key);
            return self.fire(CollectionChange::Removed {
                key: record.key.clone(),
                descriptor,
            });
        }

        if changed.is_empty() {
            return Ok(());
        }
        let descriptor = self
            .loader
            .describe(&entities[index], self.ui_context.as_deref())?;
        drop(entities);
        debug!(
            "Re-bound record {} ({} properties changed)",
            record.key,
            changed.len()
        );
        self.fire(CollectionChange::Updated {
            descriptor,
            changed,
        })
    }

    fn apply_deleted(&self, record: &Record) -> LiveResult<()> {
        let mut entities = self.collection.write();
        let Some(index) = entities.iter().position(|e| e.key() == &record.key) else {
            drop(entities);
            debug!("Delete for absent key {}; nothing to do", record.key);
            return Ok(());
        };
        let entity = entities.remove(index);
        let descriptor = self.loader.describe(&entity, self.ui_context.as_deref())?;
        drop(entities);
        debug!("Removed record {} from the live set", record.key);
        self.fire(CollectionChange::Removed {
            key: record.key.clone(),
            descriptor,
        })
    }

    fn fire(&self, change: CollectionChange) -> LiveResult<()> {
        let mut args = CollectionChangedArgs { change };
        self.changed_channel().publish(&mut args)?;
        Ok(())
    }

    fn changed_channel(&self) -> MutexGuard<'_, EventChannel<CollectionChangedArgs>> {
        self.collection_changed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LiveQueryObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQueryObserver")
            .field("type_name", &self.collection.type_name())
            .field("ui_context", &self.ui_context)
            .field("mode", &self.mode)
            .finish()
    }
}
