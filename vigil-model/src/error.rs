//! Error types for the model layer.

use thiserror::Error;

/// Result type for save operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// Result type for delete operations.
pub type DeleteResult<T> = Result<T, DeleteError>;

/// A subscriber handler failed during a publish.
///
/// Faults are not swallowed: the first faulting handler aborts the publish
/// and the fault travels back to whoever initiated the operation. Side
/// effects of handlers that already ran are not rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler fault: {0}")]
pub struct HandlerFault(String);

impl HandlerFault {
    /// Creates a fault with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// The reason reported by the handler.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur while saving an entity.
#[derive(Debug, Error)]
pub enum SaveError {
    /// One or more validators rejected the entity; Saving never fired.
    #[error("validation failed: {}", .failures.join("; "))]
    Validation { failures: Vec<String> },

    /// A Saving subscriber vetoed the operation; the session did not run.
    #[error("save canceled: {message}")]
    Canceled { message: String },

    /// A subscriber handler faulted mid-publish.
    #[error(transparent)]
    Handler(#[from] HandlerFault),

    /// The persistence session failed while applying queued work.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors that can occur while deleting an entity.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// A Deleting subscriber vetoed the operation; no session executed.
    #[error("delete canceled: {message}")]
    Canceled { message: String },

    /// A subscriber handler faulted mid-publish.
    #[error(transparent)]
    Handler(#[from] HandlerFault),

    /// The session bundle failed while applying queued work.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A persistence session work item failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session '{label}' failed: {reason}")]
pub struct SessionError {
    /// Which session of the bundle failed (e.g. "main", "before").
    pub label: String,
    /// The failure reported by the work item.
    pub reason: String,
}

/// A lazy relation's loader call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("relation '{name}' failed to load: {reason}")]
pub struct RelationLoadError {
    /// The relation that was being resolved.
    pub name: String,
    /// The failure reported by the loader call.
    pub reason: String,
}

/// An entity is already linked to a parent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entity is already linked to parent {existing_type} #{existing_uid}")]
pub struct AlreadyLinked {
    /// Type name of the current parent link.
    pub existing_type: String,
    /// Uid of the current parent link.
    pub existing_uid: u64,
}
