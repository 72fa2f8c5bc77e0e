//! Live layer: type registry, entity loading and query result observation.
//!
//! The flow through this crate: an [`EntityRegistry`] resolves an
//! [`EntityLoader`] for a registered type; the loader builds entities and
//! display descriptors from records; entities live in an
//! [`ObservedCollection`] whose membership a [`LiveQueryObserver`] keeps
//! consistent with the query engine's change feed.

mod collection;
mod error;
mod loader;
mod observer;
mod registry;
mod source;

pub use collection::ObservedCollection;
pub use error::{LiveError, LiveResult, LoadError, RegistryError};
pub use loader::{BindMode, EntityLoader};
pub use observer::{
    CollectionChange, CollectionChangedArgs, LiveQueryObserver, ObserveMode,
};
pub use registry::EntityRegistry;
pub use source::{RecordFilter, SourceContext};
