//! Lifecycle event broadcasting.
//!
//! Listeners subscribe with a predicate over [`LifecycleEvent`]s. One-shot
//! subscriptions are dropped after the first event they match; this is how
//! [`Registry::await_component`](crate::Registry::await_component) defers a
//! callback until a component loads.

use std::fmt;

use indexmap::IndexMap;
use modhost_core::{LifecycleEvent, LoadedComponent};

/// The registry's loaded components, keyed by registry name, in load order.
pub type LoadedMap = IndexMap<String, LoadedComponent>;

type Filter = Box<dyn Fn(&LifecycleEvent) -> bool>;
type Callback = Box<dyn FnMut(&LifecycleEvent, &LoadedMap)>;

/// Handle identifying a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    filter: Filter,
    callback: Callback,
    once: bool,
}

/// Publish/subscribe channel for lifecycle events.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl Broadcaster {
    /// Create a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event matching `filter`.
    pub fn subscribe(
        &mut self,
        filter: impl Fn(&LifecycleEvent) -> bool + 'static,
        callback: impl FnMut(&LifecycleEvent, &LoadedMap) + 'static,
    ) -> SubscriptionId {
        self.push(Box::new(filter), Box::new(callback), false)
    }

    /// Subscribe to the first event matching `filter`.
    pub fn subscribe_once(
        &mut self,
        filter: impl Fn(&LifecycleEvent) -> bool + 'static,
        callback: impl FnOnce(&LifecycleEvent, &LoadedMap) + 'static,
    ) -> SubscriptionId {
        let mut callback = Some(callback);
        self.push(
            Box::new(filter),
            Box::new(move |event, loaded| {
                if let Some(callback) = callback.take() {
                    callback(event, loaded);
                }
            }),
            true,
        )
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Deliver an event to every matching subscriber.
    ///
    /// Returns the number of callbacks that ran.
    pub fn emit(&mut self, event: &LifecycleEvent, loaded: &LoadedMap) -> usize {
        let mut fired = 0;
        self.subscribers.retain_mut(|subscriber| {
            if !(subscriber.filter)(event) {
                return true;
            }
            (subscriber.callback)(event, loaded);
            fired += 1;
            !subscriber.once
        });

        if fired > 0 {
            tracing::trace!(target: "modhost", event = %event, fired, "broadcast lifecycle event");
        }
        fired
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    fn push(&mut self, filter: Filter, callback: Callback, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            callback,
            once,
        });
        id
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
