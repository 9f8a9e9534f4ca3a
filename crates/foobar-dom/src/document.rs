//! Document - High-level document API
//!
//! Owns the node arena and the window, and keeps two logs the runtime
//! drains after every turn: mutation records for observers and transition
//! runs that turn into `transitionend` events.

use crate::{
    ElementData, MutationRecord, Node, NodeId, Rect, Selector, SelectorError, TransitionSpec,
    parse_px,
};
use std::collections::HashMap;

/// Browser window state
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Viewport width in px
    pub width: f32,
    /// Viewport height in px
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
    /// Total scrollable document height
    pub document_height: f32,
    /// `prefers-reduced-motion: reduce`
    pub reduced_motion: bool,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            document_height: 800.0,
            reduced_motion: false,
        }
    }
}

impl Window {
    /// Visible part of the document
    pub fn viewport_rect(&self) -> Rect {
        Rect::new(self.scroll_x, self.scroll_y, self.width, self.height)
    }

    /// Distance between the bottom of the viewport and the end of the document
    pub fn distance_to_bottom(&self) -> f32 {
        (self.document_height - (self.scroll_y + self.height)).max(0.0)
    }
}

/// A transition started by a style or class change
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRun {
    pub node: NodeId,
    /// Property reported by the eventual `transitionend`
    pub property: String,
    pub duration_ms: u64,
}

/// HTML Document
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    html_element: NodeId,
    head_element: NodeId,
    body_element: NodeId,
    window: Window,
    mutations: Vec<MutationRecord>,
    transitions: Vec<TransitionRun>,
    suppressed: HashMap<NodeId, u32>,
    reflows: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with `<html>`, `<head>` and `<body>`
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node::document()],
            html_element: NodeId::ROOT,
            head_element: NodeId::ROOT,
            body_element: NodeId::ROOT,
            window: Window::default(),
            mutations: Vec::new(),
            transitions: Vec::new(),
            suppressed: HashMap::new(),
            reflows: 0,
        };
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(NodeId::ROOT, html);
        doc.append_child(html, head);
        doc.append_child(html, body);
        doc.html_element = html;
        doc.head_element = head;
        doc.body_element = body;
        doc.mutations.clear();
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get `<html>` element
    pub fn document_element(&self) -> NodeId {
        self.html_element
    }

    pub fn head(&self) -> NodeId {
        self.head_element
    }

    pub fn body(&self) -> NodeId {
        self.body_element
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(Node::as_element)
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.node_mut(id).and_then(Node::as_element_mut)
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push_node(Node::text(content))
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Element children only
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// All descendants of `id` in document order, `id` excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Whether `node` is `ancestor` or lives below it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// Whether the node is attached to the document
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == NodeId::ROOT || (self.node(id).is_some() && self.ancestors(id).last() == Some(&NodeId::ROOT))
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old_parent) = self.parent(child) {
            if let Some(p) = self.node_mut(old_parent) {
                p.children.retain(|&c| c != child);
            }
            if let Some(c) = self.node_mut(child) {
                c.parent = None;
            }
            self.mutations
                .push(MutationRecord::child_list(old_parent, Vec::new(), vec![child]));
        }
    }

    /// Append `child` to `parent`, moving it if already attached
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference` (or at the end)
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> bool {
        if self.node(parent).is_none() || self.node(child).is_none() || self.contains(child, parent) {
            return false;
        }
        self.detach(child);
        let Some(p) = self.node_mut(parent) else {
            return false;
        };
        let pos = reference
            .and_then(|r| p.children.iter().position(|&c| c == r))
            .unwrap_or(p.children.len());
        p.children.insert(pos, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        self.mutations
            .push(MutationRecord::child_list(parent, vec![child], Vec::new()));
        true
    }

    /// Remove a node from its parent; the node stays valid but disconnected
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
        self.suppressed.remove(&id);
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.node(n).and_then(Node::as_text))
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        let text = self.create_text(text);
        self.append_child(id, text);
    }

    // ------------------------------------------------------------------
    // Attributes and classes
    // ------------------------------------------------------------------

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn id_of(&self, id: NodeId) -> Option<&str> {
        self.element(id).and_then(|e| e.id.as_deref())
    }

    pub fn set_id(&mut self, id: NodeId, value: &str) {
        self.set_attribute(id, "id", value);
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id).and_then(|e| e.get_attr(name))
    }

    /// Set an attribute; `id` and `class` update the cached views
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let old = match name {
            "class" => {
                let Some(el) = self.element_mut(id) else { return };
                let old = el.classes.value();
                el.classes.set_value(value);
                if old == el.classes.value() {
                    return;
                }
                self.queue_transition(id, "class");
                Some(old)
            }
            "id" => {
                let Some(el) = self.element_mut(id) else { return };
                let old = el.id.replace(value.to_string());
                if old.as_deref() == Some(value) {
                    return;
                }
                old
            }
            _ => {
                let Some(el) = self.element_mut(id) else { return };
                let old = el.set_plain_attr(name, value);
                if old.as_deref() == Some(value) {
                    return;
                }
                old
            }
        };
        self.mutations.push(MutationRecord::attribute(id, name, old));
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let Some(el) = self.element_mut(id) else { return };
        let old = match name {
            "id" => el.id.take(),
            "class" => {
                let old = el.classes.value();
                el.classes.set_value("");
                Some(old).filter(|v| !v.is_empty())
            }
            _ => el.remove_plain_attr(name),
        };
        if old.is_some() {
            self.mutations.push(MutationRecord::attribute(id, name, old));
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.classes.contains(class))
    }

    /// Full class attribute value
    pub fn class_name(&self, id: NodeId) -> String {
        self.element(id).map(|e| e.classes.value()).unwrap_or_default()
    }

    /// Add space separated classes
    pub fn add_class(&mut self, id: NodeId, classes: &str) -> bool {
        self.mutate_classes(id, |list| list.add(&[classes]))
    }

    /// Remove space separated classes
    pub fn remove_class(&mut self, id: NodeId, classes: &str) -> bool {
        self.mutate_classes(id, |list| list.remove(&[classes]))
    }

    /// Toggle a class, returns the new state
    pub fn toggle_class(&mut self, id: NodeId, class: &str, force: Option<bool>) -> bool {
        let mut state = false;
        self.mutate_classes(id, |list| {
            let before = list.contains(class);
            state = list.toggle(class, force);
            before != state
        });
        state
    }

    fn mutate_classes(&mut self, id: NodeId, f: impl FnOnce(&mut crate::DOMTokenList) -> bool) -> bool {
        let Some(el) = self.element_mut(id) else { return false };
        let old = el.classes.value();
        if !f(&mut el.classes) {
            return false;
        }
        self.mutations
            .push(MutationRecord::attribute(id, "class", Some(old).filter(|v| !v.is_empty())));
        self.queue_transition(id, "class");
        true
    }

    // ------------------------------------------------------------------
    // Styles, geometry and transitions
    // ------------------------------------------------------------------

    pub fn style(&self, id: NodeId, prop: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.style.get(prop))
    }

    /// Set an inline style; an empty value removes it
    pub fn set_style(&mut self, id: NodeId, prop: &str, value: &str) {
        let Some(el) = self.element_mut(id) else { return };
        let old = el.style.css_text();
        if !el.style.set(prop, value) {
            return;
        }
        self.mutations
            .push(MutationRecord::attribute(id, "style", Some(old).filter(|v| !v.is_empty())));
        self.queue_transition(id, prop);
    }

    pub fn remove_style(&mut self, id: NodeId, prop: &str) {
        self.set_style(id, prop, "");
    }

    /// Layout box, as set by the embedder
    pub fn rect(&self, id: NodeId) -> Rect {
        self.element(id).map(|e| e.rect).unwrap_or_default()
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(el) = self.element_mut(id) {
            el.rect = rect;
        }
    }

    /// Rendered height: an explicit pixel `height` wins over the layout box
    pub fn offset_height(&self, id: NodeId) -> f32 {
        if self.style(id, "display") == Some("none") {
            return 0.0;
        }
        self.style(id, "height")
            .and_then(parse_px)
            .unwrap_or_else(|| self.rect(id).height)
    }

    /// Rendered width: an explicit pixel `width` wins over the layout box
    pub fn offset_width(&self, id: NodeId) -> f32 {
        if self.style(id, "display") == Some("none") {
            return 0.0;
        }
        self.style(id, "width")
            .and_then(parse_px)
            .unwrap_or_else(|| self.rect(id).width)
    }

    /// Declare the stylesheet transition for an element
    pub fn set_transition(&mut self, id: NodeId, spec: Option<TransitionSpec>) {
        if let Some(el) = self.element_mut(id) {
            el.transition = spec;
        }
    }

    /// Suppress (or restore) transitions for an element; calls nest
    pub fn suppress_transitions(&mut self, id: NodeId, suppress: bool) {
        let count = self.suppressed.entry(id).or_default();
        if suppress {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.suppressed.remove(&id);
            }
        }
    }

    pub fn transitions_suppressed(&self, id: NodeId) -> bool {
        self.suppressed.contains_key(&id) || self.style(id, "transition") == Some("none")
    }

    /// Force a synchronous style read, returns the layout box
    pub fn reflow(&mut self, id: NodeId) -> Rect {
        self.reflows += 1;
        self.rect(id)
    }

    /// Number of forced reflows so far
    pub fn reflow_count(&self) -> u64 {
        self.reflows
    }

    fn queue_transition(&mut self, id: NodeId, prop: &str) {
        if self.window.reduced_motion || self.transitions_suppressed(id) || !self.is_connected(id) {
            return;
        }
        let Some(spec) = self.element(id).and_then(|e| e.transition.clone()) else {
            return;
        };
        if spec.duration_ms == 0 || !spec.covers(prop) {
            return;
        }
        let property = match (spec.property.as_str(), prop) {
            ("all", "class") => "all".to_string(),
            ("all", p) => p.to_string(),
            (p, _) => p.to_string(),
        };
        self.transitions.push(TransitionRun { node: id, property, duration_ms: spec.duration_ms });
    }

    /// Drain the mutation log
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Drain the transitions started since the last call
    pub fn take_transitions(&mut self) -> Vec<TransitionRun> {
        std::mem::take(&mut self.transitions)
    }

    /// Transitions started since the last drain
    pub fn queued_transitions(&self) -> &[TransitionRun] {
        &self.transitions
    }

    pub fn has_pending_work(&self) -> bool {
        !self.mutations.is_empty() || !self.transitions.is_empty()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Get a connected element by id
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(NodeId::ROOT)
            .into_iter()
            .find(|&n| self.element(n).is_some_and(|e| e.id.as_deref() == Some(id)))
    }

    /// First descendant of `root` matching `selector`
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(root)
            .into_iter()
            .find(|&n| selector.matches(self, n)))
    }

    /// All descendants of `root` matching `selector`, in document order
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(root, &selector))
    }

    /// Like `query_selector_all` with a pre-parsed selector
    pub fn select_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&n| selector.matches(self, n))
            .collect()
    }

    pub fn matches(&self, id: NodeId, selector: &str) -> bool {
        Selector::parse(selector).is_ok_and(|s| s.matches(self, id))
    }

    /// Nearest inclusive ancestor matching `selector`
    pub fn closest(&self, id: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector).ok()?;
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| selector.matches(self, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MutationType;

    #[test]
    fn test_structure() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.document_element()), Some("html"));
        assert_eq!(doc.parent(doc.body()), Some(doc.document_element()));
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn test_append_and_remove() {
        let mut doc = Document::new();
        let bar = doc.create_element("div");
        doc.set_id(bar, "bar");
        assert!(!doc.is_connected(bar));
        assert!(doc.append_child(doc.body(), bar));
        assert_eq!(doc.get_element_by_id("bar"), Some(bar));

        doc.remove(bar);
        assert!(!doc.is_connected(bar));
        assert_eq!(doc.get_element_by_id("bar"), None);
        assert!(!doc.append_child(bar, bar));
    }

    #[test]
    fn test_insert_before_and_order() {
        let mut doc = Document::new();
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        let c = doc.create_element("p");
        let body = doc.body();
        doc.append_child(body, a);
        doc.append_child(body, c);
        doc.insert_before(body, b, Some(c));
        assert_eq!(doc.element_children(body), vec![a, b, c]);
    }

    #[test]
    fn test_class_mutations_are_recorded() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.append_child(doc.body(), el);
        doc.take_mutations();

        assert!(doc.add_class(el, "fbr-open"));
        assert!(!doc.add_class(el, "fbr-open"));
        let records = doc.take_mutations();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mutation_type, MutationType::Attributes);
        assert_eq!(records[0].attribute_name.as_deref(), Some("class"));
    }

    #[test]
    fn test_transitions_queue() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.append_child(doc.body(), el);
        doc.set_transition(el, Some(TransitionSpec::all(300)));

        doc.add_class(el, "fbr-open");
        doc.set_style(el, "top", "10px");
        let runs = doc.take_transitions();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].property, "top");

        doc.suppress_transitions(el, true);
        doc.remove_class(el, "fbr-open");
        assert!(doc.take_transitions().is_empty());
        doc.suppress_transitions(el, false);

        doc.window_mut().reduced_motion = true;
        doc.add_class(el, "fbr-open");
        assert!(doc.take_transitions().is_empty());
    }

    #[test]
    fn test_offset_height_prefers_inline_style() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.set_rect(el, Rect::sized(300.0, 48.0));
        assert_eq!(doc.offset_height(el), 48.0);
        doc.set_style(el, "height", "20px");
        assert_eq!(doc.offset_height(el), 20.0);
        doc.set_style(el, "display", "none");
        assert_eq!(doc.offset_height(el), 0.0);
    }

    #[test]
    fn test_queries() {
        let mut doc = Document::new();
        let bar = doc.create_element("div");
        doc.add_class(bar, "foobar");
        doc.append_child(doc.body(), bar);
        let btn = doc.create_element("button");
        doc.add_class(btn, "fbr-toggle");
        doc.append_child(bar, btn);

        assert_eq!(doc.query_selector(doc.root(), ".fbr-toggle").unwrap(), Some(btn));
        assert_eq!(doc.query_selector_all(doc.root(), "div, button").unwrap(), vec![bar, btn]);
        assert_eq!(doc.closest(btn, ".foobar"), Some(bar));
        assert!(doc.query_selector(doc.root(), "..").is_err());
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::new();
        let el = doc.create_element("span");
        doc.set_text_content(el, "3 days");
        assert_eq!(doc.text_content(el), "3 days");
        doc.set_text_content(el, "2 days");
        assert_eq!(doc.text_content(el), "2 days");
    }
}
