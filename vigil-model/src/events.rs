//! Event argument types and the per-entity channel set.
//!
//! Every lifecycle notification carries an [`EntityRef`] identity snapshot
//! rather than a borrow of the entity, so handlers can hold onto it and
//! channels can be published while the entity is mutably borrowed.

use crate::channel::EventChannel;
use crate::lifecycle::LifecycleState;
use crate::session::PersistenceSessionBundle;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex};
use vigil_types::{EntityUid, RecordKey};

/// Identity snapshot of an entity at the moment an event fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub uid: EntityUid,
    pub type_name: String,
    pub key: RecordKey,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.type_name, self.uid, self.key)
    }
}

/// A read-only view of an entity handed to validators.
///
/// Borrows the property map instead of cloning it; validators run inside
/// the entity's own validation pass and never outlive it.
#[derive(Debug, Clone, Copy)]
pub struct EntityView<'a> {
    pub uid: EntityUid,
    pub type_name: &'a str,
    pub key: &'a RecordKey,
    pub properties: &'a Map<String, Value>,
    pub state: LifecycleState,
}

impl EntityView<'_> {
    /// Looks up a property value by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Looks up a property and reads it as a string.
    #[must_use]
    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// A validator inspects an entity and reports at most one failure message.
pub type Validator = Box<dyn Fn(&EntityView<'_>) -> Result<(), String> + Send + Sync>;

/// The collected result of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub failures: Vec<String>,
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Cancellation slot carried by `Saving` and `Deleting` arguments.
///
/// Any subscriber may cancel; later subscribers still run and still see
/// the flag. The first cancellation's message is the one reported.
#[derive(Debug, Clone, Default)]
pub struct Veto {
    canceled: bool,
    message: Option<String>,
}

impl Veto {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the operation. The message of the first call sticks.
    pub fn cancel(&mut self, message: impl Into<String>) {
        if !self.canceled {
            self.canceled = true;
            self.message = Some(message.into());
        }
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// The first cancellation message, if any subscriber canceled.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Published once per entity after construction completes.
#[derive(Debug, Clone)]
pub struct InitializedArgs {
    pub entity: EntityRef,
}

/// Published after a property value has been replaced.
#[derive(Debug, Clone)]
pub struct PropertyChangedArgs {
    pub entity: EntityRef,
    /// Name of the property that changed.
    pub property: String,
}

/// Published when a validation pass begins, before any validator runs.
#[derive(Debug, Clone)]
pub struct ValidatingArgs {
    pub entity: EntityRef,
}

/// Published after every validator ran, whatever the outcome.
#[derive(Debug, Clone)]
pub struct ValidatedArgs {
    pub entity: EntityRef,
    pub outcome: ValidationOutcome,
}

/// Published while a save is pending; subscribers may veto it.
#[derive(Debug)]
pub struct SavingArgs {
    pub entity: EntityRef,
    pub veto: Veto,
}

/// Published while a delete is pending.
///
/// Subscribers may veto, and may enqueue cleanup work into the shared
/// session bundle. The bundle only runs if no subscriber cancels.
#[derive(Debug)]
pub struct DeletingArgs {
    pub entity: EntityRef,
    pub sessions: Arc<Mutex<PersistenceSessionBundle>>,
    pub veto: Veto,
}

/// The full channel set owned by one entity, plus its validators.
pub struct EntityEvents {
    pub property_changed: EventChannel<PropertyChangedArgs>,
    pub validating: EventChannel<ValidatingArgs>,
    pub validated: EventChannel<ValidatedArgs>,
    pub saving: EventChannel<SavingArgs>,
    pub deleting: EventChannel<DeletingArgs>,
    validators: Vec<Validator>,
}

impl EntityEvents {
    #[must_use]
    pub fn new() -> Self {
        Self {
            property_changed: EventChannel::new(),
            validating: EventChannel::new(),
            validated: EventChannel::new(),
            saving: EventChannel::new(),
            deleting: EventChannel::new(),
            validators: Vec::new(),
        }
    }

    /// Registers a validator. Validators run in registration order and
    /// every one of them runs on each validation pass.
    pub fn add_validator<F>(&mut self, validator: F)
    where
        F: Fn(&EntityView<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Box::new(validator));
    }

    /// Runs every validator against the view, collecting all failures.
    #[must_use]
    pub fn run_validators(&self, view: &EntityView<'_>) -> ValidationOutcome {
        let failures = self
            .validators
            .iter()
            .filter_map(|v| v(view).err())
            .collect();
        ValidationOutcome { failures }
    }

    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }
}

impl Default for EntityEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityEvents")
            .field("property_changed", &self.property_changed)
            .field("validating", &self.validating)
            .field("validated", &self.validated)
            .field("saving", &self.saving)
            .field("deleting", &self.deleting)
            .field("validators", &self.validators.len())
            .finish()
    }
}
