//! Entity lifecycle states and transition legality.
//!
//! ## States
//!
//! ```text
//! New ──▶ Initializing ──▶ Initialized ──▶ Idle ⇄ PropertyChanging
//!                                           │
//!                                           ▼
//!        Validating ──▶ Validated ──▶ Saving ──▶ Saved ──▶ Idle
//!            │              │            │
//!            ▼ (fault)      ▼ (invalid)  ▼ (canceled/failed)
//!           Idle           Idle         Idle
//!
//!        Idle ──▶ Deleting ──▶ Deleted (terminal)
//!                     │
//!                     ▼ (canceled/failed)
//!                    Idle
//! ```
//!
//! The enum-with-validated-transitions approach is used rather than
//! typestate types: the rest states and the failure edges back to `Idle`
//! would require a type per state and conversions at every edge. Illegal
//! transitions are a caller bug and are rejected with a panic, not a
//! `Result`; see [`Entity::state`](crate::Entity::state) callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Freshly constructed; no properties bound yet.
    New,
    /// A loader is binding the initial record.
    Initializing,
    /// Construction complete; Initialized has fired.
    Initialized,
    /// At rest; mutations and operations may begin here.
    Idle,
    /// A property value is being replaced.
    PropertyChanging,
    /// Validators are about to run.
    Validating,
    /// All validators ran; outcome published.
    Validated,
    /// Saving subscribers are deciding; the session has not run.
    Saving,
    /// The persistence session ran successfully.
    Saved,
    /// Deleting subscribers are deciding; no session has run.
    Deleting,
    /// The entity is gone (terminal).
    Deleted,
}

impl LifecycleState {
    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Whether a mutating operation (property change, save, delete) may
    /// begin from this state.
    #[must_use]
    pub fn at_rest(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the transition `self -> next` is legal.
    #[must_use]
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (New, Initializing)
                | (Initializing, Initialized)
                | (Initialized, Idle)
                | (Idle, PropertyChanging)
                | (PropertyChanging, Idle)
                | (Idle, Validating)
                | (Validating, Validated)
                | (Validating, Idle)
                | (Validated, Saving)
                | (Validated, Idle)
                | (Saving, Saved)
                | (Saving, Idle)
                | (Saved, Idle)
                | (Idle, Deleting)
                | (Deleting, Deleted)
                | (Deleting, Idle)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Initializing => "INITIALIZING",
            Self::Initialized => "INITIALIZED",
            Self::Idle => "IDLE",
            Self::PropertyChanging => "PROPERTY_CHANGING",
            Self::Validating => "VALIDATING",
            Self::Validated => "VALIDATED",
            Self::Saving => "SAVING",
            Self::Saved => "SAVED",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_is_terminal() {
        assert!(LifecycleState::Deleted.is_terminal());
        assert!(!LifecycleState::Deleting.is_terminal());
        assert!(!LifecycleState::Idle.is_terminal());
    }

    #[test]
    fn nothing_leaves_deleted() {
        use LifecycleState::*;
        for next in [
            New,
            Initializing,
            Initialized,
            Idle,
            PropertyChanging,
            Validating,
            Validated,
            Saving,
            Saved,
            Deleting,
            Deleted,
        ] {
            assert!(!Deleted.can_transition_to(next), "Deleted -> {next}");
        }
    }

    #[test]
    fn idle_reaches_only_rest_exits() {
        use LifecycleState::*;
        assert!(Idle.can_transition_to(PropertyChanging));
        assert!(Idle.can_transition_to(Validating));
        assert!(Idle.can_transition_to(Deleting));
        assert!(!Idle.can_transition_to(Saving));
        assert!(!Idle.can_transition_to(Saved));
        assert!(!Idle.can_transition_to(Deleted));
    }

    #[test]
    fn failure_edges_return_to_idle() {
        use LifecycleState::*;
        assert!(Validating.can_transition_to(Idle));
        assert!(Validated.can_transition_to(Idle));
        assert!(Saving.can_transition_to(Idle));
        assert!(Deleting.can_transition_to(Idle));
    }

    #[test]
    fn display_is_upper_snake() {
        assert_eq!(LifecycleState::PropertyChanging.to_string(), "PROPERTY_CHANGING");
        assert_eq!(LifecycleState::Deleted.to_string(), "DELETED");
    }
}
