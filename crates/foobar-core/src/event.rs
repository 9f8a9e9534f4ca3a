//! Event bus
//!
//! Namespaced, synchronous publish/subscribe used by every component.
//! Types may carry a namespace (`"toggle.rules"`) so a group of listeners can
//! be removed together with `off(".rules")`.

use crate::component::Component;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Event listener, receives the event and the trigger arguments
pub type Listener = Rc<dyn Fn(&Event, &[Value])>;

/// Opaque owner tag, distinguishes otherwise identical registrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerOwner(pub usize);

/// A triggered event
pub struct Event {
    pub event_type: String,
    pub namespace: Option<String>,
    target: Option<Rc<dyn Component>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    /// Parse `"type"` or `"type.namespace"`
    pub fn new(name: &str) -> Self {
        let (event_type, namespace) = split_name(name);
        Self {
            event_type: event_type.to_string(),
            namespace: namespace.map(str::to_string),
            target: None,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn with_target(mut self, target: Rc<dyn Component>) -> Self {
        self.target = Some(target);
        self
    }

    /// Component that emitted the event
    pub fn target(&self) -> Option<&Rc<dyn Component>> {
        self.target.as_ref()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Skip the remaining listeners and any parent re-emit
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("namespace", &self.namespace)
            .field("target", &self.target.as_ref().map(|t| t.base().name().to_string()))
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}

struct Registration {
    event_type: String,
    namespace: Option<String>,
    listener: Listener,
    owner: Option<ListenerOwner>,
}

/// Listener table of one component
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<Vec<Registration>>,
    any: RefCell<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for each space separated type. Duplicates are
    /// ignored; returns true if anything was added.
    pub fn on(&self, types: &str, listener: Listener) -> bool {
        self.register(types, listener, None)
    }

    pub fn on_with_owner(&self, types: &str, listener: Listener, owner: ListenerOwner) -> bool {
        self.register(types, listener, Some(owner))
    }

    fn register(&self, types: &str, listener: Listener, owner: Option<ListenerOwner>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let mut added = false;
        for name in types.split_whitespace() {
            let (event_type, namespace) = split_name(name);
            if event_type.is_empty() {
                continue;
            }
            let duplicate = listeners.iter().any(|r| {
                r.event_type == event_type
                    && r.namespace.as_deref() == namespace
                    && r.owner == owner
                    && Rc::ptr_eq(&r.listener, &listener)
            });
            if duplicate {
                continue;
            }
            listeners.push(Registration {
                event_type: event_type.to_string(),
                namespace: namespace.map(str::to_string),
                listener: listener.clone(),
                owner,
            });
            added = true;
        }
        added
    }

    /// Remove registrations. Each space separated entry may be `type`,
    /// `type.ns` or `.ns`; `listener` and `owner` narrow the match further.
    /// Returns the number removed.
    pub fn off(&self, types: &str, listener: Option<&Listener>, owner: Option<ListenerOwner>) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        for name in types.split_whitespace() {
            let (event_type, namespace) = split_name(name);
            listeners.retain(|r| {
                let matches = (event_type.is_empty() || r.event_type == event_type)
                    && (namespace.is_none() || r.namespace.as_deref() == namespace)
                    && listener.is_none_or(|l| Rc::ptr_eq(&r.listener, l))
                    && (owner.is_none() || r.owner == owner);
                !matches
            });
        }
        before - listeners.len()
    }

    /// Remove everything registered with `owner`
    pub fn off_owner(&self, owner: ListenerOwner) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|r| r.owner != Some(owner));
        before - listeners.len()
    }

    /// Catch-all listener, runs after the typed ones
    pub fn on_any(&self, listener: Listener) -> bool {
        let mut any = self.any.borrow_mut();
        if any.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        any.push(listener);
        true
    }

    pub fn off_any(&self, listener: &Listener) -> bool {
        let mut any = self.any.borrow_mut();
        let before = any.len();
        any.retain(|l| !Rc::ptr_eq(l, listener));
        before != any.len()
    }

    /// Trigger each space separated type, returns the created events
    pub fn trigger(&self, types: &str, args: &[Value]) -> Vec<Event> {
        self.trigger_from(None, types, args)
    }

    /// Trigger with the emitting component as target
    pub fn trigger_from(&self, target: Option<Rc<dyn Component>>, types: &str, args: &[Value]) -> Vec<Event> {
        types
            .split_whitespace()
            .map(|name| {
                let mut event = Event::new(name);
                event.target = target.clone();
                self.dispatch(&event, args);
                event
            })
            .collect()
    }

    /// Deliver an existing event to this bus
    pub fn dispatch(&self, event: &Event, args: &[Value]) {
        if event.event_type.is_empty() {
            return;
        }
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|r| r.event_type == event.event_type)
            .filter(|r| event.namespace.is_none() || r.namespace == event.namespace)
            .map(|r| r.listener.clone())
            .collect();
        let any: Vec<Listener> = self.any.borrow().clone();

        for listener in matching.iter().chain(any.iter()) {
            if event.is_propagation_stopped() {
                return;
            }
            listener(event, args);
        }
    }

    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.listeners.borrow().iter().any(|r| r.event_type == event_type)
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len() + self.any.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
        self.any.borrow_mut().clear();
    }
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once('.') {
        Some((event_type, namespace)) if !namespace.is_empty() => (event_type, Some(namespace)),
        Some((event_type, _)) => (event_type, None),
        None => (name, None),
    }
}
