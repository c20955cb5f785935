//! Event bus for gameplay and physics signals
//!
//! - Name-keyed, synchronous fan-out in subscription order
//! - No replay of past events to late subscribers
//! - Optional typed layer binding each name to one payload type

mod bus;
mod typed;

pub use bus::{EventBus, ScopedSubscription, Subscription};
pub use typed::{
    CONTACT_EVENTS, CollisionEnter, CollisionExit, ContactEvent, EventKind, SensorEnter,
    SensorExit,
};
