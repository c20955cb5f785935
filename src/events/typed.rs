//! Compile-time checked event names
//!
//! An [`EventKind`] binds an event name to its payload type, so that
//! [`EventBus::emit_event`] and [`EventBus::on_event`] cannot disagree about
//! the payload shape. Hosts declare their own kinds the same way the
//! built-in contact events below are declared.

use std::any::Any;

use serde::Serialize;

use super::bus::{EventBus, ScopedSubscription, Subscription};
use crate::physics::RigidBodyHandle;

/// An event name together with its payload type
pub trait EventKind: 'static {
    /// Name the event is published under
    const NAME: &'static str;
    /// Payload carried by every emission
    type Payload: 'static;
}

/// Payload of the contact events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEvent {
    /// Node whose body reports the contact
    pub source_entity_id: String,
    /// Node on the other side of the contact
    pub target_entity_id: String,
    /// Simulation body of the target, `None` for instanced batches
    #[serde(skip)]
    pub target_body_ref: Option<RigidBodyHandle>,
}

/// A body started overlapping a sensor
pub enum SensorEnter {}
/// A body stopped overlapping a sensor
pub enum SensorExit {}
/// Two solid bodies started touching
pub enum CollisionEnter {}
/// Two solid bodies stopped touching
pub enum CollisionExit {}

impl EventKind for SensorEnter {
    const NAME: &'static str = "sensor:enter";
    type Payload = ContactEvent;
}

impl EventKind for SensorExit {
    const NAME: &'static str = "sensor:exit";
    type Payload = ContactEvent;
}

impl EventKind for CollisionEnter {
    const NAME: &'static str = "collision:enter";
    type Payload = ContactEvent;
}

impl EventKind for CollisionExit {
    const NAME: &'static str = "collision:exit";
    type Payload = ContactEvent;
}

/// Names of the built-in contact events
pub const CONTACT_EVENTS: [&str; 4] = [
    SensorEnter::NAME,
    SensorExit::NAME,
    CollisionEnter::NAME,
    CollisionExit::NAME,
];

fn typed_handler<E, F>(handler: F) -> impl Fn(&dyn Any) + 'static
where
    E: EventKind,
    F: Fn(&E::Payload) + 'static,
{
    move |payload: &dyn Any| match payload.downcast_ref::<E::Payload>() {
        Some(payload) => handler(payload),
        None => log::warn!("Ignoring '{}' emitted with a foreign payload type", E::NAME),
    }
}

impl EventBus {
    /// Emit a typed event
    pub fn emit_event<E: EventKind>(&self, payload: &E::Payload) -> usize {
        self.emit(E::NAME, payload)
    }

    /// Subscribe with a typed handler. Emissions under the same name with a
    /// different payload type are skipped with a warning.
    pub fn on_event<E, F>(&self, handler: F) -> Subscription
    where
        E: EventKind,
        F: Fn(&E::Payload) + 'static,
    {
        self.on(E::NAME, typed_handler::<E, F>(handler))
    }
}

impl<D: PartialEq> ScopedSubscription<D> {
    /// Create an inactive scope for a typed event
    #[must_use]
    pub fn for_event<E: EventKind>(bus: &EventBus) -> Self {
        Self::new(bus, E::NAME)
    }

    /// Typed variant of [`update`](Self::update)
    pub fn update_event<E, F>(&mut self, deps: D, handler: F) -> bool
    where
        E: EventKind,
        F: Fn(&E::Payload) + 'static,
    {
        self.update(deps, typed_handler::<E, F>(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    enum ScoreChanged {}

    impl EventKind for ScoreChanged {
        const NAME: &'static str = "score:changed";
        type Payload = u32;
    }

    fn contact(source: &str, target: &str) -> ContactEvent {
        ContactEvent {
            source_entity_id: source.to_string(),
            target_entity_id: target.to_string(),
            target_body_ref: None,
        }
    }

    #[test]
    fn test_typed_round_trip() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = bus.on_event::<CollisionEnter, _>(move |event| {
            sink.borrow_mut().push(event.source_entity_id.clone());
        });

        assert_eq!(bus.emit_event::<CollisionEnter>(&contact("ball", "floor")), 1);
        assert_eq!(bus.emit_event::<CollisionExit>(&contact("ball", "floor")), 0);
        assert_eq!(*seen.borrow(), vec!["ball"]);
    }

    #[test]
    fn test_foreign_payload_skipped() {
        let bus = EventBus::new();
        let total = Rc::new(RefCell::new(0_u32));
        let sink = Rc::clone(&total);
        let _sub = bus.on_event::<ScoreChanged, _>(move |score| *sink.borrow_mut() += score);

        bus.emit(ScoreChanged::NAME, &"not a number");
        bus.emit_event::<ScoreChanged>(&5);
        assert_eq!(*total.borrow(), 5);
    }

    #[test]
    fn test_untyped_listener_sees_typed_emit() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let _sub = bus.on("sensor:enter", move |payload| {
            *sink.borrow_mut() = payload.downcast_ref::<ContactEvent>().cloned();
        });

        bus.emit_event::<SensorEnter>(&contact("zone", "player"));
        assert_eq!(seen.borrow().as_ref().unwrap().target_entity_id, "player");
    }

    #[test]
    fn test_scoped_typed_subscription() {
        let bus = EventBus::new();
        let total = Rc::new(RefCell::new(0_u32));
        let mut scope = ScopedSubscription::for_event::<ScoreChanged>(&bus);

        let sink = Rc::clone(&total);
        scope.update_event::<ScoreChanged, _>(1, move |score| *sink.borrow_mut() += score);
        let sink = Rc::clone(&total);
        scope.update_event::<ScoreChanged, _>(2, move |score| *sink.borrow_mut() += score * 10);

        bus.emit_event::<ScoreChanged>(&1);
        assert_eq!(*total.borrow(), 10);
        drop(scope);
        assert_eq!(bus.subscriber_count(ScoreChanged::NAME), 0);
    }

    #[test]
    fn test_contact_payload_serializes_camel_case() {
        let value = serde_json::to_value(contact("a", "b")).unwrap();
        assert_eq!(value["sourceEntityId"], "a");
        assert_eq!(value["targetEntityId"], "b");
    }
}
