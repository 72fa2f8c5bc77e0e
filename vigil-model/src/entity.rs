//! The mutable domain object and its guarded lifecycle operations.
//!
//! An [`Entity`] owns its property map, relation slots, channel set and
//! lifecycle state. Mutations go through the guarded operations here so
//! every transition fires its channel and illegal transitions are caught
//! at the call site. Entities are deliberately not `Clone`: exactly one
//! collection owns an instance at a time.

use crate::error::{DeleteError, DeleteResult, SaveError, SaveResult};
use crate::events::{
    DeletingArgs, EntityEvents, EntityRef, EntityView, PropertyChangedArgs, SavingArgs,
    ValidatedArgs, ValidatingArgs, ValidationOutcome, Veto,
};
use crate::lifecycle::LifecycleState;
use crate::relation::{LazyRelation, ParentLink};
use crate::session::{PersistenceSession, PersistenceSessionBundle};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use vigil_types::{EntityUid, RecordKey};

/// A live domain object bound from a record.
pub struct Entity {
    uid: EntityUid,
    type_name: String,
    key: RecordKey,
    properties: Map<String, Value>,
    relations: BTreeMap<String, LazyRelation>,
    parent_link: Option<ParentLink>,
    state: LifecycleState,
    /// Lifecycle channels and validators for this instance.
    pub events: EntityEvents,
}

impl Entity {
    /// Constructs an entity in the `New` state. Loaders drive it through
    /// initialization; see [`Entity::begin_initialize`].
    #[must_use]
    pub fn new(uid: EntityUid, type_name: impl Into<String>, key: RecordKey) -> Self {
        Self {
            uid,
            type_name: type_name.into(),
            key,
            properties: Map::new(),
            relations: BTreeMap::new(),
            parent_link: None,
            state: LifecycleState::New,
            events: EntityEvents::new(),
        }
    }

    // ── Identity & views ─────────────────────────────────────────────

    #[must_use]
    pub fn uid(&self) -> EntityUid {
        self.uid
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state.is_terminal()
    }

    /// Identity snapshot for event arguments.
    #[must_use]
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            uid: self.uid,
            type_name: self.type_name.clone(),
            key: self.key.clone(),
        }
    }

    /// Read-only view for validators.
    #[must_use]
    pub fn view(&self) -> EntityView<'_> {
        EntityView {
            uid: self.uid,
            type_name: &self.type_name,
            key: &self.key,
            properties: &self.properties,
            state: self.state,
        }
    }

    // ── Properties ───────────────────────────────────────────────────

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Clones the property map, e.g. to restore after a failed re-bind.
    #[must_use]
    pub fn snapshot_properties(&self) -> Map<String, Value> {
        self.properties.clone()
    }

    /// Overwrites the property map without firing events or transitions.
    /// Used to roll an entity back to a snapshot.
    pub fn restore_properties(&mut self, snapshot: Map<String, Value>) {
        self.properties = snapshot;
    }

    /// Replaces one property value.
    ///
    /// Runs the `Idle -> PropertyChanging -> Idle` cycle and fires
    /// `property_changed` after the value is in place. Returns whether the
    /// value actually changed; setting an equal value is a no-op and fires
    /// nothing.
    pub fn set_property(
        &mut self,
        name: &str,
        value: Value,
    ) -> Result<bool, crate::error::HandlerFault> {
        if self.properties.get(name) == Some(&value) {
            return Ok(false);
        }
        self.enter(LifecycleState::PropertyChanging);
        self.properties.insert(name.to_string(), value);
        self.enter(LifecycleState::Idle);
        let mut args = PropertyChangedArgs {
            entity: self.entity_ref(),
            property: name.to_string(),
        };
        self.events.property_changed.publish(&mut args)?;
        Ok(true)
    }

    /// Applies a batch of property values, returning the names that
    /// actually changed, in the batch's field order.
    ///
    /// Unchanged values are skipped. With `fire` set, one
    /// `property_changed` fires per changed name after the whole batch is
    /// in place; loaders pass `fire = false` during initial binding.
    pub fn apply_updates(
        &mut self,
        updates: &Map<String, Value>,
        fire: bool,
    ) -> Result<Vec<String>, crate::error::HandlerFault> {
        let changed: Vec<String> = updates
            .iter()
            .filter(|(name, value)| self.properties.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();
        if changed.is_empty() {
            return Ok(changed);
        }
        let cycle = self.state == LifecycleState::Idle;
        if cycle {
            self.enter(LifecycleState::PropertyChanging);
        }
        for name in &changed {
            if let Some(value) = updates.get(name) {
                self.properties.insert(name.clone(), value.clone());
            }
        }
        if cycle {
            self.enter(LifecycleState::Idle);
        }
        if fire {
            for name in &changed {
                let mut args = PropertyChangedArgs {
                    entity: self.entity_ref(),
                    property: name.clone(),
                };
                self.events.property_changed.publish(&mut args)?;
            }
        }
        Ok(changed)
    }

    // ── Relations & parent link ──────────────────────────────────────

    /// Declares a relation slot, initially not loaded.
    pub fn add_relation_slot(&mut self, name: impl Into<String>) {
        self.relations.insert(name.into(), LazyRelation::not_loaded());
    }

    /// Declares a relation slot with materialized data.
    pub fn materialize_relation(&mut self, name: impl Into<String>, value: Value) {
        self.relations.insert(name.into(), LazyRelation::loaded(value));
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&LazyRelation> {
        self.relations.get(name)
    }

    /// Mutable slot access, for [`LazyRelation::resolve_with`].
    pub fn relation_mut(&mut self, name: &str) -> Option<&mut LazyRelation> {
        self.relations.get_mut(name)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    #[must_use]
    pub fn parent_link(&self) -> Option<&ParentLink> {
        self.parent_link.as_ref()
    }

    /// Links this entity to a parent. Link-type entities carry at most
    /// one parent at a time; linking while linked is an error.
    pub fn link_parent(&mut self, link: ParentLink) -> Result<(), crate::error::AlreadyLinked> {
        if let Some(existing) = &self.parent_link {
            return Err(crate::error::AlreadyLinked {
                existing_type: existing.type_name.clone(),
                existing_uid: existing.uid.get(),
            });
        }
        self.parent_link = Some(link);
        Ok(())
    }

    pub fn unlink_parent(&mut self) -> Option<ParentLink> {
        self.parent_link.take()
    }

    // ── Lifecycle operations ─────────────────────────────────────────

    /// Starts initialization. Only legal from `New`.
    pub fn begin_initialize(&mut self) {
        self.enter(LifecycleState::Initializing);
    }

    /// Finishes initialization and settles at `Idle`. The loader fires
    /// its `initialized` channel after this returns.
    pub fn complete_initialize(&mut self) {
        self.enter(LifecycleState::Initialized);
        self.enter(LifecycleState::Idle);
    }

    /// Runs a standalone validation pass and settles back at `Idle`,
    /// whether or not a channel subscriber faulted along the way.
    pub fn validate(&mut self) -> Result<ValidationOutcome, crate::error::HandlerFault> {
        let result = self.validation_pass();
        self.enter(LifecycleState::Idle);
        result
    }

    /// Validates, asks `saving` subscribers, then runs the session.
    ///
    /// Fails with `Validation` when any validator reports a failure (the
    /// session is not invoked), with `Canceled` when a subscriber vetoes
    /// (likewise), with `Handler` on a subscriber fault, and with
    /// `Session` when queued persistence work fails. On success the
    /// entity passes through `Saved` and rests at `Idle`.
    pub fn save(&mut self, session: &mut PersistenceSession) -> SaveResult<()> {
        let outcome = match self.validation_pass() {
            Ok(outcome) => outcome,
            Err(fault) => {
                self.enter(LifecycleState::Idle);
                return Err(SaveError::Handler(fault));
            }
        };
        if !outcome.is_valid() {
            self.enter(LifecycleState::Idle);
            return Err(SaveError::Validation {
                failures: outcome.failures,
            });
        }

        self.enter(LifecycleState::Saving);
        let mut args = SavingArgs {
            entity: self.entity_ref(),
            veto: Veto::new(),
        };
        if let Err(fault) = self.events.saving.publish(&mut args) {
            self.enter(LifecycleState::Idle);
            return Err(SaveError::Handler(fault));
        }
        if args.veto.is_canceled() {
            let message = args.veto.message().unwrap_or_default().to_string();
            debug!(entity = %args.entity, %message, "save canceled by subscriber");
            self.enter(LifecycleState::Idle);
            return Err(SaveError::Canceled { message });
        }

        if let Err(err) = session.run() {
            self.enter(LifecycleState::Idle);
            return Err(SaveError::Session(err));
        }
        self.enter(LifecycleState::Saved);
        self.enter(LifecycleState::Idle);
        debug!(entity = %self.entity_ref(), "entity saved");
        Ok(())
    }

    /// Asks `deleting` subscribers, then executes the session bundle.
    ///
    /// Subscribers receive the bundle behind `Arc<Mutex<..>>` and may
    /// enqueue companion work into its before/after sessions. A veto
    /// discards the whole bundle and the entity stays alive. On success
    /// the entity is `Deleted` and accepts no further operations.
    pub fn delete(&mut self, bundle: PersistenceSessionBundle) -> DeleteResult<()> {
        self.enter(LifecycleState::Deleting);
        let sessions = Arc::new(Mutex::new(bundle));
        let mut args = DeletingArgs {
            entity: self.entity_ref(),
            sessions: Arc::clone(&sessions),
            veto: Veto::new(),
        };
        if let Err(fault) = self.events.deleting.publish(&mut args) {
            lock_bundle(&sessions).discard();
            self.enter(LifecycleState::Idle);
            return Err(DeleteError::Handler(fault));
        }
        if args.veto.is_canceled() {
            let message = args.veto.message().unwrap_or_default().to_string();
            debug!(entity = %args.entity, %message, "delete canceled by subscriber");
            lock_bundle(&sessions).discard();
            self.enter(LifecycleState::Idle);
            return Err(DeleteError::Canceled { message });
        }

        let result = lock_bundle(&sessions).execute();
        match result {
            Err(err) => {
                self.enter(LifecycleState::Idle);
                Err(DeleteError::Session(err))
            }
            Ok(()) => {
                self.enter(LifecycleState::Deleted);
                debug!(entity = %args.entity, "entity deleted");
                Ok(())
            }
        }
    }

    fn validation_pass(&mut self) -> Result<ValidationOutcome, crate::error::HandlerFault> {
        self.enter(LifecycleState::Validating);
        let mut validating = ValidatingArgs {
            entity: self.entity_ref(),
        };
        self.events.validating.publish(&mut validating)?;

        let outcome = {
            let view = self.view();
            self.events.run_validators(&view)
        };

        self.enter(LifecycleState::Validated);
        let mut validated = ValidatedArgs {
            entity: self.entity_ref(),
            outcome: outcome.clone(),
        };
        self.events.validated.publish(&mut validated)?;
        Ok(outcome)
    }

    /// Moves to `next`, panicking on an illegal transition. Driving an
    /// entity against the lifecycle graph is a caller bug, not a
    /// recoverable condition.
    fn enter(&mut self, next: LifecycleState) {
        assert!(
            self.state.can_transition_to(next),
            "illegal entity transition: {} -> {} on {}#{}",
            self.state,
            next,
            self.type_name,
            self.uid
        );
        self.state = next;
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("uid", &self.uid)
            .field("type_name", &self.type_name)
            .field("key", &self.key)
            .field("state", &self.state)
            .field("properties", &self.properties.len())
            .field("relations", &self.relations.len())
            .field("parent_link", &self.parent_link)
            .finish()
    }
}

fn lock_bundle(
    sessions: &Arc<Mutex<PersistenceSessionBundle>>,
) -> std::sync::MutexGuard<'_, PersistenceSessionBundle> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}
