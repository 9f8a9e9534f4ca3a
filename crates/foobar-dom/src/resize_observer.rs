//! Resize Observer
//!
//! Reports elements whose offset size changed since the last check. The
//! first check after `observe` always reports, as in browsers.

use crate::{Document, NodeId};
use std::collections::BTreeMap;

/// Resize observer entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeObserverEntry {
    pub target: NodeId,
    pub width: f32,
    pub height: f32,
}

/// Resize observer
#[derive(Debug, Default)]
pub struct ResizeObserver {
    observed: BTreeMap<NodeId, Option<(f32, f32)>>,
}

impl ResizeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an element
    pub fn observe(&mut self, target: NodeId) {
        self.observed.insert(target, None);
    }

    /// Stop observing an element
    pub fn unobserve(&mut self, target: NodeId) {
        self.observed.remove(&target);
    }

    /// Disconnect all observations
    pub fn disconnect(&mut self) {
        self.observed.clear();
    }

    pub fn is_observing(&self, target: NodeId) -> bool {
        self.observed.contains_key(&target)
    }

    /// Compare current sizes against the last reported ones
    pub fn check(&mut self, doc: &Document) -> Vec<ResizeObserverEntry> {
        let mut entries = Vec::new();
        for (&node, last) in self.observed.iter_mut() {
            if !doc.is_connected(node) {
                continue;
            }
            let (width, height) = (doc.offset_width(node), doc.offset_height(node));
            let changed = match *last {
                Some((lw, lh)) => (lw - width).abs() > 0.01 || (lh - height).abs() > 0.01,
                None => true,
            };
            if changed {
                *last = Some((width, height));
                entries.push(ResizeObserverEntry { target: node, width, height });
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rect;

    #[test]
    fn test_resize_observer() {
        let mut doc = Document::new();
        let node = doc.create_element("div");
        doc.append_child(doc.body(), node);
        doc.set_rect(node, Rect::sized(100.0, 40.0));

        let mut observer = ResizeObserver::new();
        observer.observe(node);

        let entries = observer.check(&doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].height, 40.0);

        assert!(observer.check(&doc).is_empty());

        doc.set_style(node, "height", "60px");
        let entries = observer.check(&doc);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].height, 60.0);
    }
}
