//! Persistence session work queues.
//!
//! Sessions hold deferred persistence work as queued closures; nothing
//! touches a backend until [`PersistenceSessionBundle::execute`] runs. The
//! bundle brackets a main session with before/after companions so delete
//! subscribers can attach cleanup that travels with the operation.

use crate::error::SessionError;
use std::fmt;
use tracing::{debug, warn};

type SessionOp = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// Where a session ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Queued work has not run.
    Pending,
    /// Every work item ran successfully.
    Applied,
    /// The session (or a sibling in its bundle) failed or was discarded.
    RolledBack,
}

/// One ordered queue of persistence work.
pub struct PersistenceSession {
    label: String,
    ops: Vec<SessionOp>,
    status: SessionStatus,
}

impl PersistenceSession {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ops: Vec::new(),
            status: SessionStatus::Pending,
        }
    }

    /// Queues a work item. Items run in enqueue order.
    pub fn enqueue<F>(&mut self, op: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.ops.push(Box::new(op));
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Runs the queued work in order, stopping at the first failure.
    pub(crate) fn run(&mut self) -> Result<(), SessionError> {
        debug!(label = %self.label, ops = self.ops.len(), "running persistence session");
        for op in self.ops.drain(..) {
            if let Err(reason) = op() {
                warn!(label = %self.label, %reason, "persistence session failed");
                self.status = SessionStatus::RolledBack;
                return Err(SessionError {
                    label: self.label.clone(),
                    reason,
                });
            }
        }
        self.status = SessionStatus::Applied;
        Ok(())
    }

    pub(crate) fn mark_rolled_back(&mut self) {
        self.ops.clear();
        self.status = SessionStatus::RolledBack;
    }
}

impl fmt::Debug for PersistenceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceSession")
            .field("label", &self.label)
            .field("ops", &self.ops.len())
            .field("status", &self.status)
            .finish()
    }
}

/// Before/main/after sessions executed as one unit.
///
/// Execution order is before, then main, then after. The first failure
/// aborts the rest and every session in the bundle reports
/// [`SessionStatus::RolledBack`], whether or not its items had run.
#[derive(Debug)]
pub struct PersistenceSessionBundle {
    before: PersistenceSession,
    main: PersistenceSession,
    after: PersistenceSession,
}

impl PersistenceSessionBundle {
    #[must_use]
    pub fn new() -> Self {
        Self {
            before: PersistenceSession::new("before"),
            main: PersistenceSession::new("main"),
            after: PersistenceSession::new("after"),
        }
    }

    pub fn before_mut(&mut self) -> &mut PersistenceSession {
        &mut self.before
    }

    pub fn main_mut(&mut self) -> &mut PersistenceSession {
        &mut self.main
    }

    pub fn after_mut(&mut self) -> &mut PersistenceSession {
        &mut self.after
    }

    #[must_use]
    pub fn before(&self) -> &PersistenceSession {
        &self.before
    }

    #[must_use]
    pub fn main(&self) -> &PersistenceSession {
        &self.main
    }

    #[must_use]
    pub fn after(&self) -> &PersistenceSession {
        &self.after
    }

    /// Runs all three sessions in order.
    pub fn execute(&mut self) -> Result<(), SessionError> {
        let result = self
            .before
            .run()
            .and_then(|()| self.main.run())
            .and_then(|()| self.after.run());
        if result.is_err() {
            self.before.mark_rolled_back();
            self.main.mark_rolled_back();
            self.after.mark_rolled_back();
        }
        result
    }

    /// Drops all queued work without running it, e.g. after a canceled
    /// delete. Every session reports rollback.
    pub fn discard(&mut self) {
        self.before.mark_rolled_back();
        self.main.mark_rolled_back();
        self.after.mark_rolled_back();
    }

    /// Whether every session in the bundle applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.before.status() == SessionStatus::Applied
            && self.main.status() == SessionStatus::Applied
            && self.after.status() == SessionStatus::Applied
    }
}

impl Default for PersistenceSessionBundle {
    fn default() -> Self {
        Self::new()
    }
}
