//! Query source contexts.
//!
//! A source context is what defines membership of an observed collection:
//! the originating query's identity plus its filter predicate. The
//! predicate re-evaluates individual records as change notifications
//! arrive; the observer never goes back to the query engine for it.

use std::fmt;
use vigil_types::{Record, SourceId};

/// Membership predicate over records.
pub type RecordFilter = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Identity and membership predicate of one query source.
pub struct SourceContext {
    id: SourceId,
    name: String,
    filter: RecordFilter,
}

impl SourceContext {
    /// Creates a context with the given membership predicate.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            id: SourceId::new(),
            name: name.into(),
            filter: Box::new(filter),
        }
    }

    /// Creates a context that accepts every record.
    #[must_use]
    pub fn all(name: impl Into<String>) -> Self {
        Self::new(name, |_| true)
    }

    #[must_use]
    pub fn id(&self) -> SourceId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the record satisfies this source's predicate.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        (self.filter)(record)
    }
}

impl fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
