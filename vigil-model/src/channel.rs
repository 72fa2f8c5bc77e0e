//! Ordered, cancelable, multi-subscriber event channel.
//!
//! The channel is the single notification primitive of the runtime: every
//! lifecycle transition and every collection change publishes through one.
//! Handlers run synchronously on the publishing thread, in subscription
//! order, each receiving `&mut` access to the shared args value.
//!
//! Cancellation does not short-circuit: when a handler sets the cancel flag
//! on the args, the remaining handlers still run so that every interested
//! party observes the attempt. The publisher checks the final cancel state
//! after `publish` returns and aborts the guarded operation itself.
//!
//! A handler fault is different: the first `Err` aborts the publish
//! immediately and propagates to the caller. Side effects of handlers that
//! already ran are not rolled back.

use crate::error::HandlerFault;
use std::fmt;
use vigil_types::SubscriptionId;

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<(), HandlerFault>;

type Handler<A> = Box<dyn FnMut(&mut A) -> HandlerResult + Send + Sync>;

/// A typed, ordered list of subscriber callbacks.
pub struct EventChannel<A> {
    subscribers: Vec<(SubscriptionId, Handler<A>)>,
}

impl<A> EventChannel<A> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Appends a handler to the subscription order.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&mut A) -> HandlerResult + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Appends a handler that cannot fault.
    pub fn observe<F>(&mut self, mut handler: F) -> SubscriptionId
    where
        F: FnMut(&mut A) + Send + Sync + 'static,
    {
        self.subscribe(move |args| {
            handler(args);
            Ok(())
        })
    }

    /// Removes a handler. Returns whether it was subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Invokes every handler in subscription order with the shared args.
    ///
    /// Returns the first handler fault, skipping the handlers after it.
    /// The caller is responsible for inspecting the args' cancel state
    /// afterwards; a canceled publish is still an `Ok` publish.
    pub fn publish(&mut self, args: &mut A) -> HandlerResult {
        for (_, handler) in &mut self.subscribers {
            handler(args)?;
        }
        Ok(())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the channel has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<A> Default for EventChannel<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventChannel<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
