//! Synchronous, single-threaded publish/subscribe.
//!
//! Publishing invokes every subscriber of that event kind, in registration
//! order, before returning. There is no queue: a handler that publishes
//! another event runs that event's subscribers to completion first
//! (depth-first delivery).
//!
//! The subscriber list may change while an event is being delivered:
//! - a handler unsubscribed mid-dispatch is skipped if it was not yet invoked;
//! - a handler subscribed mid-dispatch only sees later events.

use crate::events::{Event, EventKind, Topic};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&Event)>;

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl Registry {
    fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }
}

/// Cheaply cloneable handle to a shared bus
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.registry.borrow().subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every event of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.subscribers.push(Subscriber {
            id,
            kind,
            handler: Rc::new(handler),
        });
        tracing::trace!(event = %kind, ?id, "Subscribed");
        id
    }

    /// Register a handler that receives the typed payload of topic `T`
    pub fn on<T, F>(&self, handler: F) -> SubscriptionId
    where
        T: Topic,
        F: Fn(&T::Payload) + 'static,
    {
        self.subscribe(T::KIND, move |event| {
            if let Some(payload) = T::payload(event) {
                handler(payload);
            }
        })
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|s| s.id != id);
        let removed = registry.subscribers.len() != before;
        if removed {
            tracing::trace!(?id, "Unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every current subscriber of its kind
    pub fn publish(&self, event: Event) {
        let kind = event.kind();

        // Snapshot so handlers may (un)subscribe while we iterate
        let targets: Vec<(SubscriptionId, Handler)> = self
            .registry
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();

        tracing::trace!(event = %kind, subscribers = targets.len(), "Publishing");

        for (id, handler) in targets {
            if !self.registry.borrow().contains(id) {
                continue;
            }
            handler(&event);
        }
    }

    /// Publish the payload of topic `T`
    pub fn emit<T: Topic>(&self, payload: T::Payload) {
        self.publish(T::wrap(payload));
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry
            .borrow()
            .subscribers
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.registry.borrow_mut().subscribers.clear();
    }

    /// Non-owning handle for use inside handlers registered on this bus
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            registry: Rc::downgrade(&self.registry),
        }
    }
}

/// Weak counterpart of [`EventBus`].
///
/// Handlers that publish hold one of these; a strong handle would keep the
/// registry alive through its own subscriber list.
#[derive(Clone, Default)]
pub struct WeakEventBus {
    registry: Weak<RefCell<Registry>>,
}

impl WeakEventBus {
    pub fn upgrade(&self) -> Option<EventBus> {
        self.registry.upgrade().map(|registry| EventBus { registry })
    }
}
