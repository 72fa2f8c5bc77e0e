//! Error types for the live layer.

use thiserror::Error;
use vigil_model::HandlerFault;

/// Result type for observer operations.
pub type LiveResult<T> = Result<T, LiveError>;

/// Errors that can occur while registering or resolving entity types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("entity type '{0}' is not registered")]
    TypeNotRegistered(String),

    #[error("entity type '{type_name}' already has version {version}")]
    DuplicateVersion { type_name: String, version: u32 },
}

/// Errors that can occur while building or binding entities.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The record belongs to a different type than the loader serves.
    #[error("record type '{record_type}' does not match loader type '{loader_type}'")]
    TypeMismatch {
        record_type: String,
        loader_type: String,
    },

    /// The record lacks a property the type version declares required.
    #[error("record '{key}' lacks required property '{property}' of {type_name} v{version}")]
    SchemaMismatch {
        key: String,
        type_name: String,
        version: u32,
        property: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An initialized or property-changed subscriber faulted.
    #[error(transparent)]
    Handler(#[from] HandlerFault),
}

/// Errors that can occur while reconciling a change notification.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A collection-changed subscriber faulted.
    #[error(transparent)]
    Handler(#[from] HandlerFault),
}
