//! Observer bus (§4.6, §6 "Events").
//!
//! The validator never calls back into host code synchronously from deep
//! inside its own state machine without going through this module: listeners
//! are registered per event name, dispatch snapshots the listener list so a
//! listener is free to subscribe or unsubscribe from inside its own callback,
//! and any listener can halt further dispatch of the current event by
//! returning [`ListenerAction::Stop`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::ValidationError;
use crate::index::EventIndex;
use crate::progress::Progress;
use rngval_tree::NodeId;

/// The four event names a [`Validator`](crate::validator::Validator) fires.
/// There is no open-ended "custom event" channel: these are the whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Error,
    ResetErrors,
    StateUpdate,
    PossibleDueToWildcardChange,
}

impl EventName {
    const ALL: [EventName; 4] = [
        EventName::Error,
        EventName::ResetErrors,
        EventName::StateUpdate,
        EventName::PossibleDueToWildcardChange,
    ];

    fn as_str(self) -> &'static str {
        match self {
            EventName::Error => "error",
            EventName::ResetErrors => "reset-errors",
            EventName::StateUpdate => "state-update",
            EventName::PossibleDueToWildcardChange => "possible-due-to-wildcard-change",
        }
    }
}

/// The payload handed to a listener, tagged by the event that produced it.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Error(ValidationError),
    ResetErrors { at: EventIndex },
    StateUpdate(Progress),
    PossibleDueToWildcardChange { node: NodeId },
}

impl EventPayload {
    pub fn name(&self) -> EventName {
        match self {
            EventPayload::Error(_) => EventName::Error,
            EventPayload::ResetErrors { .. } => EventName::ResetErrors,
            EventPayload::StateUpdate(_) => EventName::StateUpdate,
            EventPayload::PossibleDueToWildcardChange { .. } => {
                EventName::PossibleDueToWildcardChange
            }
        }
    }
}

/// Returned from a listener callback to say whether it wants to keep
/// receiving this event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    Continue,
    Stop,
}

type Listener = Rc<RefCell<dyn FnMut(&EventPayload) -> ListenerAction>>;

struct Slot {
    id: u64,
    listener: Listener,
    one_shot: bool,
}

/// Opaque handle returned by [`EventBus::on`], usable with [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventBus {
    named: HashMap<&'static str, Vec<Slot>>,
    wildcard: Vec<Slot>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a single named event.
    pub fn on<F>(&mut self, name: EventName, f: F) -> ListenerId
    where
        F: FnMut(&EventPayload) -> ListenerAction + 'static,
    {
        self.insert(Some(name), f, false)
    }

    /// Subscribe to a single named event; the listener is removed after its
    /// first invocation regardless of the [`ListenerAction`] it returns.
    pub fn once<F>(&mut self, name: EventName, f: F) -> ListenerId
    where
        F: FnMut(&EventPayload) -> ListenerAction + 'static,
    {
        self.insert(Some(name), f, true)
    }

    /// Subscribe to every event name.
    pub fn on_any<F>(&mut self, f: F) -> ListenerId
    where
        F: FnMut(&EventPayload) -> ListenerAction + 'static,
    {
        self.insert(None, f, false)
    }

    fn insert<F>(&mut self, name: Option<EventName>, f: F, one_shot: bool) -> ListenerId
    where
        F: FnMut(&EventPayload) -> ListenerAction + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        let slot = Slot {
            id,
            listener: Rc::new(RefCell::new(f)),
            one_shot,
        };
        match name {
            Some(name) => self.named.entry(name.as_str()).or_default().push(slot),
            None => self.wildcard.push(slot),
        }
        ListenerId(id)
    }

    /// Remove a previously registered listener. No-op if already removed.
    pub fn off(&mut self, id: ListenerId) {
        for slots in self.named.values_mut() {
            slots.retain(|s| s.id != id.0);
        }
        self.wildcard.retain(|s| s.id != id.0);
    }

    /// Dispatch `payload` to every matching listener. Listeners registered or
    /// removed by this dispatch (including by the payload's own listeners)
    /// take effect starting with the *next* `emit`, never the current one:
    /// the slot list is snapshotted (cloned `Rc`s) up front.
    pub fn emit(&mut self, payload: EventPayload) {
        let name = payload.name();
        let mut snapshot: Vec<Slot> = self
            .named
            .get(name.as_str())
            .map(|v| v.iter().map(Slot::share).collect())
            .unwrap_or_default();
        snapshot.extend(self.wildcard.iter().map(Slot::share));

        let mut consumed_one_shot = Vec::new();
        for slot in &snapshot {
            let action = (slot.listener.borrow_mut())(&payload);
            if slot.one_shot {
                consumed_one_shot.push(slot.id);
            }
            if action == ListenerAction::Stop {
                break;
            }
        }
        for id in consumed_one_shot {
            self.off(ListenerId(id));
        }
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        self.named.get(name.as_str()).map_or(0, Vec::len) + self.wildcard.len()
    }
}

impl Slot {
    fn share(&self) -> Slot {
        Slot {
            id: self.id,
            listener: Rc::clone(&self.listener),
            one_shot: self.one_shot,
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("names", &EventName::ALL.map(EventName::as_str))
            .field("wildcard_listeners", &self.wildcard.len())
            .finish()
    }
}
