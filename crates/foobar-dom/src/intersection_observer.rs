//! Intersection Observer
//!
//! Observe element visibility inside the scrolled viewport.

use crate::{Document, NodeId, Rect};
use std::collections::BTreeMap;

/// Intersection observer options
#[derive(Debug, Clone)]
pub struct IntersectionObserverOptions {
    /// Ratios that trigger an entry when crossed
    pub threshold: Vec<f32>,
}

impl Default for IntersectionObserverOptions {
    fn default() -> Self {
        Self { threshold: vec![0.0] }
    }
}

/// Intersection observer entry
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionObserverEntry {
    pub target: NodeId,
    pub bounding_rect: Rect,
    pub intersection_rect: Option<Rect>,
    pub intersection_ratio: f32,
    pub is_intersecting: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LastState {
    intersecting: bool,
    band: usize,
}

/// Intersection observer
#[derive(Debug, Default)]
pub struct IntersectionObserver {
    options: IntersectionObserverOptions,
    observed: BTreeMap<NodeId, Option<LastState>>,
}

impl IntersectionObserver {
    pub fn new(options: IntersectionObserverOptions) -> Self {
        let mut options = options;
        if options.threshold.is_empty() {
            options.threshold.push(0.0);
        }
        options.threshold.sort_by(f32::total_cmp);
        Self { options, observed: BTreeMap::new() }
    }

    pub fn observe(&mut self, target: NodeId) {
        self.observed.entry(target).or_insert(None);
    }

    pub fn unobserve(&mut self, target: NodeId) {
        self.observed.remove(&target);
    }

    pub fn disconnect(&mut self) {
        self.observed.clear();
    }

    /// Number of thresholds at or below `ratio`
    fn band(&self, ratio: f32) -> usize {
        self.options.threshold.iter().filter(|&&t| ratio >= t).count()
    }

    /// Compute entries for targets whose visibility crossed a threshold
    pub fn check(&mut self, doc: &Document) -> Vec<IntersectionObserverEntry> {
        let viewport = doc.window().viewport_rect();
        let mut updates = Vec::new();

        for (&node, last) in &self.observed {
            if !doc.is_connected(node) {
                continue;
            }
            let rect = doc.rect(node);
            let intersection = rect.intersection(&viewport);
            let ratio = match intersection {
                Some(i) if rect.area() > 0.0 => (i.area() / rect.area()).clamp(0.0, 1.0),
                Some(_) => 1.0,
                None => 0.0,
            };
            let state = LastState { intersecting: intersection.is_some(), band: self.band(ratio) };
            if *last != Some(state) {
                updates.push((
                    node,
                    state,
                    IntersectionObserverEntry {
                        target: node,
                        bounding_rect: rect,
                        intersection_rect: intersection,
                        intersection_ratio: ratio,
                        is_intersecting: state.intersecting,
                    },
                ));
            }
        }

        updates
            .into_iter()
            .map(|(node, state, entry)| {
                self.observed.insert(node, Some(state));
                entry
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_into_view() {
        let mut doc = Document::new();
        doc.window_mut().width = 1000.0;
        doc.window_mut().height = 600.0;
        let target = doc.create_element("section");
        doc.append_child(doc.body(), target);
        doc.set_rect(target, Rect::new(0.0, 1200.0, 1000.0, 200.0));

        let mut observer = IntersectionObserver::new(IntersectionObserverOptions::default());
        observer.observe(target);

        let first = observer.check(&doc);
        assert_eq!(first.len(), 1);
        assert!(!first[0].is_intersecting);

        doc.window_mut().scroll_y = 700.0;
        let entries = observer.check(&doc);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_intersecting);
        assert!((entries[0].intersection_ratio - 0.5).abs() < 0.001);

        assert!(observer.check(&doc).is_empty());
    }
}
