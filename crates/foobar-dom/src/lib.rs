//! FooBar DOM - host page substrate
//!
//! An in-memory document the bar runtime binds to: elements, classes,
//! attributes, inline styles, layout rectangles, a window, DOM events,
//! observers, declared CSS transitions and local storage.

mod classlist;
mod dataset;
mod document;
mod dom_events;
mod geometry;
mod intersection_observer;
mod mutation_observer;
mod node;
mod resize_observer;
mod selector;
mod storage;
mod style;

pub use classlist::DOMTokenList;
pub use dataset::DOMStringMap;
pub use document::{Document, TransitionRun, Window};
pub use dom_events::{DomEvent, DomEventType, EventListeners, EventTarget, ListenerId};
pub use geometry::Rect;
pub use intersection_observer::{IntersectionObserver, IntersectionObserverEntry, IntersectionObserverOptions};
pub use mutation_observer::{MutationObserver, MutationObserverInit, MutationRecord, MutationType};
pub use node::{ElementData, Node, NodeData};
pub use resize_observer::{ResizeObserver, ResizeObserverEntry};
pub use selector::{Selector, SelectorError};
pub use storage::{Storage, StorageError};
pub use style::{StyleMap, TransitionSpec, parse_px};

/// Node identifier (index into the document arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The document node
    pub const ROOT: NodeId = NodeId(0);

    /// Raw arena index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
