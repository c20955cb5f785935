//! Synchronous publish/subscribe channel
//!
//! Handlers are keyed by event name and called in subscription order. The bus
//! is single-threaded: it is cheap to clone (shared `Rc` state) and must stay
//! on the thread that drives the frame.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let sub = bus.on("score:changed", |payload| {
//!     if let Some(score) = payload.downcast_ref::<u32>() {
//!         println!("score: {score}");
//!     }
//! });
//! bus.emit("score:changed", &100_u32);
//! sub.unsubscribe();
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

type Handler = Rc<dyn Fn(&dyn Any)>;

struct Slot {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct BusState {
    channels: FxHashMap<String, Vec<Slot>>,
    next_id: u64,
}

/// Name-keyed event bus with duck-typed payloads
#[derive(Clone, Default)]
pub struct EventBus {
    state: Rc<RefCell<BusState>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventBus")
            .field("channels", &state.channels.len())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `name`. The handler stays registered until the returned
    /// subscription is unsubscribed or the bus is cleared.
    pub fn on<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&dyn Any) + 'static,
    {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state
            .channels
            .entry(name.to_string())
            .or_default()
            .push(Slot {
                id,
                handler: Rc::new(handler),
            });

        Subscription {
            bus: Rc::downgrade(&self.state),
            name: name.to_string(),
            id,
        }
    }

    /// Swap the handler of an active subscription, keeping its position.
    /// Returns false if the subscription is no longer active.
    pub fn replace<F>(&self, subscription: &Subscription, handler: F) -> bool
    where
        F: Fn(&dyn Any) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let slot = state
            .channels
            .get_mut(&subscription.name)
            .and_then(|slots| slots.iter_mut().find(|s| s.id == subscription.id));
        match slot {
            Some(slot) => {
                slot.handler = Rc::new(handler);
                true
            }
            None => false,
        }
    }

    /// Call every current subscriber of `name` with `payload`.
    ///
    /// The subscriber list is captured before the first call: handlers added
    /// during the emit are not called, handlers removed during it still are.
    /// Returns the number of handlers called.
    pub fn emit(&self, name: &str, payload: &dyn Any) -> usize {
        let handlers: Vec<Handler> = {
            let state = self.state.borrow();
            match state.channels.get(name) {
                Some(slots) => slots.iter().map(|s| Rc::clone(&s.handler)).collect(),
                None => return 0,
            }
        };

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Number of subscribers of `name`
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.state
            .borrow()
            .channels
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Check if nobody is subscribed to anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().channels.values().all(Vec::is_empty)
    }

    /// Remove every subscriber
    pub fn clear(&self) {
        self.state.borrow_mut().channels.clear();
    }
}

/// Handle returned by [`EventBus::on`]
///
/// Dropping it does not unsubscribe; use [`ScopedSubscription`] for that.
#[derive(Debug)]
#[must_use = "a subscription that is never unsubscribed lives as long as the bus"]
pub struct Subscription {
    bus: Weak<RefCell<BusState>>,
    name: String,
    id: u64,
}

impl Subscription {
    /// Event name this subscription listens to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the handler. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(state) = self.bus.upgrade() else {
            return false;
        };
        let mut state = state.borrow_mut();
        let Some(slots) = state.channels.get_mut(&self.name) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|s| s.id != self.id);
        let removed = slots.len() != before;
        if slots.is_empty() {
            state.channels.remove(&self.name);
        }
        removed
    }

    /// Check if the handler is still registered
    pub fn is_active(&self) -> bool {
        self.bus.upgrade().is_some_and(|state| {
            state
                .borrow()
                .channels
                .get(&self.name)
                .is_some_and(|slots| slots.iter().any(|s| s.id == self.id))
        })
    }
}

/// A subscription tied to its owner's lifetime
///
/// [`update`](Self::update) subscribes on first use and replaces the handler
/// whenever the dependency value changes; an unchanged value keeps the
/// existing handler. Dropping the scope unsubscribes.
pub struct ScopedSubscription<D: PartialEq> {
    bus: EventBus,
    name: String,
    deps: Option<D>,
    active: Option<Subscription>,
}

impl<D: PartialEq> ScopedSubscription<D> {
    /// Create an inactive scope for `name`
    #[must_use]
    pub fn new(bus: &EventBus, name: impl Into<String>) -> Self {
        Self {
            bus: bus.clone(),
            name: name.into(),
            deps: None,
            active: None,
        }
    }

    /// Subscribe `handler` if `deps` differ from the last call.
    /// Returns true if the handler was (re)installed.
    pub fn update<F>(&mut self, deps: D, handler: F) -> bool
    where
        F: Fn(&dyn Any) + 'static,
    {
        if self.deps.as_ref() == Some(&deps) && self.is_active() {
            return false;
        }
        let live = self.is_active();
        self.deps = Some(deps);

        if live && let Some(active) = &self.active {
            self.bus.replace(active, handler);
        } else {
            self.active = Some(self.bus.on(&self.name, handler));
        }
        true
    }

    /// Check if a handler is currently installed
    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(Subscription::is_active)
    }

    /// Unsubscribe now instead of at drop
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            active.unsubscribe();
        }
        self.deps = None;
    }
}

impl<D: PartialEq> Drop for ScopedSubscription<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
