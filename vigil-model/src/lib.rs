//! Entity model: lifecycle, events, schema and persistence sessions.
//!
//! This crate holds the domain-object layer. An [`Entity`] moves through
//! an explicit lifecycle graph ([`LifecycleState`]); each transition fires
//! a synchronous [`EventChannel`] whose subscribers may observe, and for
//! save/delete may cancel, the operation. Type shape comes from immutable
//! [`EntityTypeVersion`] descriptions; deferred persistence work travels
//! in [`PersistenceSession`] queues.

mod channel;
mod descriptor;
mod entity;
mod error;
mod events;
mod lifecycle;
mod relation;
mod schema;
mod session;

pub use channel::{EventChannel, HandlerResult};
pub use descriptor::EntityDescriptor;
pub use entity::Entity;
pub use error::{
    AlreadyLinked, DeleteError, DeleteResult, HandlerFault, RelationLoadError, SaveError,
    SaveResult, SessionError,
};
pub use events::{
    DeletingArgs, EntityEvents, EntityRef, EntityView, InitializedArgs, PropertyChangedArgs,
    SavingArgs, ValidatedArgs, ValidatingArgs, ValidationOutcome, Validator, Veto,
};
pub use lifecycle::LifecycleState;
pub use relation::{LazyLoadDirection, LazyLoadDirective, LazyRelation, ParentLink};
pub use schema::{EntityTypeVersion, PropertyDescriptor, PropertyKind, PropertyUiConfig};
pub use session::{PersistenceSession, PersistenceSessionBundle, SessionStatus};
