//! DOM Events
//!
//! Event objects and a listener table keyed by target and type. Dispatch
//! itself lives in the runtime so that listeners can borrow the document.

use crate::{Document, NodeId};
use std::cell::Cell;

/// DOM event types the bar runtime listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEventType {
    Click,
    MouseOut,
    Scroll,
    Resize,
    TransitionEnd,
    BeforeUnload,
}

impl DomEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::MouseOut => "mouseout",
            Self::Scroll => "scroll",
            Self::Resize => "resize",
            Self::TransitionEnd => "transitionend",
            Self::BeforeUnload => "beforeunload",
        }
    }

    /// Whether events of this type bubble through ancestors
    pub fn bubbles(&self) -> bool {
        matches!(self, Self::Click | Self::MouseOut | Self::TransitionEnd)
    }
}

/// Where a listener is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

/// DOM event
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub event_type: DomEventType,
    pub target: EventTarget,
    /// Property name for `transitionend`
    pub property_name: Option<String>,
    pub client_x: f32,
    pub client_y: f32,
    /// Element the pointer moved to for `mouseout`, None when it left the page
    pub related_target: Option<NodeId>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl DomEvent {
    fn new(event_type: DomEventType, target: EventTarget) -> Self {
        Self {
            event_type,
            target,
            property_name: None,
            client_x: 0.0,
            client_y: 0.0,
            related_target: None,
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    pub fn click(target: NodeId) -> Self {
        Self::new(DomEventType::Click, EventTarget::Node(target))
    }

    /// Pointer left `target` for `related_target` (None = outside the page)
    pub fn mouse_out(target: NodeId, client_x: f32, client_y: f32, related_target: Option<NodeId>) -> Self {
        Self {
            client_x,
            client_y,
            related_target,
            ..Self::new(DomEventType::MouseOut, EventTarget::Node(target))
        }
    }

    pub fn scroll() -> Self {
        Self::new(DomEventType::Scroll, EventTarget::Window)
    }

    pub fn resize() -> Self {
        Self::new(DomEventType::Resize, EventTarget::Window)
    }

    pub fn before_unload() -> Self {
        Self::new(DomEventType::BeforeUnload, EventTarget::Window)
    }

    pub fn transition_end(target: NodeId, property: &str) -> Self {
        Self {
            property_name: Some(property.to_string()),
            ..Self::new(DomEventType::TransitionEnd, EventTarget::Node(target))
        }
    }

    /// Target node, None for window events
    pub fn target_node(&self) -> Option<NodeId> {
        match self.target {
            EventTarget::Node(n) => Some(n),
            EventTarget::Window => None,
        }
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Targets visited during dispatch, innermost first
    pub fn propagation_path(&self, doc: &Document) -> Vec<EventTarget> {
        match self.target {
            EventTarget::Window => vec![EventTarget::Window],
            EventTarget::Node(node) if self.event_type.bubbles() => std::iter::once(node)
                .chain(doc.ancestors(node))
                .map(EventTarget::Node)
                .collect(),
            EventTarget::Node(node) => vec![EventTarget::Node(node)],
        }
    }
}

/// Handle returned by `EventListeners::add`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct ListenerEntry<L> {
    id: ListenerId,
    target: EventTarget,
    event_type: DomEventType,
    listener: L,
}

/// Listener table
#[derive(Debug)]
pub struct EventListeners<L> {
    entries: Vec<ListenerEntry<L>>,
    next_id: u64,
}

impl<L> Default for EventListeners<L> {
    fn default() -> Self {
        Self { entries: Vec::new(), next_id: 1 }
    }
}

impl<L: Clone> EventListeners<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: EventTarget, event_type: DomEventType, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(ListenerEntry { id, target, event_type, listener });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Remove every listener attached to `target`
    pub fn remove_target(&mut self, target: EventTarget) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.target != target);
        before - self.entries.len()
    }

    /// Snapshot of the listeners for one target and type, in registration order
    pub fn listeners_for(&self, target: EventTarget, event_type: DomEventType) -> Vec<L> {
        self.entries
            .iter()
            .filter(|e| e.target == target && e.event_type == event_type)
            .map(|e| e.listener.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_table() {
        let mut table: EventListeners<&'static str> = EventListeners::new();
        let node = NodeId(3);
        let a = table.add(EventTarget::Node(node), DomEventType::Click, "a");
        table.add(EventTarget::Node(node), DomEventType::Click, "b");
        table.add(EventTarget::Window, DomEventType::Scroll, "c");

        assert_eq!(table.listeners_for(EventTarget::Node(node), DomEventType::Click), vec!["a", "b"]);
        assert!(table.remove(a));
        assert!(!table.remove(a));
        assert_eq!(table.remove_target(EventTarget::Node(node)), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_propagation_path() {
        let mut doc = Document::new();
        let bar = doc.create_element("div");
        let button = doc.create_element("button");
        doc.append_child(doc.body(), bar);
        doc.append_child(bar, button);

        let path = DomEvent::click(button).propagation_path(&doc);
        assert_eq!(path[0], EventTarget::Node(button));
        assert_eq!(path[1], EventTarget::Node(bar));
        assert_eq!(path.last(), Some(&EventTarget::Node(NodeId::ROOT)));

        assert_eq!(DomEvent::scroll().propagation_path(&doc), vec![EventTarget::Window]);
    }

    #[test]
    fn test_flags() {
        let event = DomEvent::transition_end(NodeId(1), "height");
        assert_eq!(event.property_name.as_deref(), Some("height"));
        event.stop_propagation();
        event.prevent_default();
        assert!(event.is_propagation_stopped());
        assert!(event.is_default_prevented());
    }
}
