//! Core type definitions for Vigil.
//!
//! This crate defines the fundamental, domain-agnostic types used throughout
//! the live entity runtime:
//! - Entity and record identifiers (per-type integer uids, stable record keys)
//! - Subscription and source identifiers (UUID v7)
//! - Records delivered by the query engine and their change kinds
//!
//! All domain-specific types (type versions, entities, observers, etc.)
//! belong in `vigil-model` and `vigil-live`, not here.

mod ids;
mod record;

pub use ids::{EntityUid, RecordKey, SourceId, SubscriptionId};
pub use record::{ChangeKind, Record};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown change kind: {0}")]
    UnknownChangeKind(String),
}
