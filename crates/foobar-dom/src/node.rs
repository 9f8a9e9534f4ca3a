//! DOM Node
//!
//! Nodes live in the document arena and refer to each other by `NodeId`.
//! Element fields are public for reading; all mutation goes through
//! `Document` so that mutations and transitions are recorded.

use crate::{DOMStringMap, DOMTokenList, NodeId, Rect, StyleMap, TransitionSpec};

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    /// Parent node (None if root or detached)
    pub parent: Option<NodeId>,
    /// Children in document order
    pub children: Vec<NodeId>,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    /// Create a new element node
    pub fn element(tag: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData::new(tag)),
        }
    }

    /// Create a new text node
    pub fn text(content: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Text(content.to_string()),
        }
    }

    /// Create a document node
    pub fn document() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data: NodeData::Document,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    /// Document root
    Document,
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
}

/// Element-specific data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lower-case tag name
    pub tag: String,
    /// Cached id attribute
    pub id: Option<String>,
    /// Class list
    pub classes: DOMTokenList,
    /// Remaining attributes in insertion order (id/class/style excluded)
    pub attrs: Vec<(String, String)>,
    /// Inline style declarations
    pub style: StyleMap,
    /// Layout box in document coordinates
    pub rect: Rect,
    /// Transition declared by the stylesheet
    pub transition: Option<TransitionSpec>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: DOMTokenList::new(),
            attrs: Vec::new(),
            style: StyleMap::new(),
            rect: Rect::default(),
            transition: None,
        }
    }

    /// Get an attribute value, `id`/`class`/`style` included
    pub fn get_attr(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" => Some(self.classes.value()).filter(|v| !v.is_empty()),
            "style" => Some(self.style.css_text()).filter(|v| !v.is_empty()),
            _ => self
                .attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
        }
    }

    /// Set a plain attribute, returns the previous value
    pub(crate) fn set_plain_attr(&mut self, name: &str, value: &str) -> Option<String> {
        for (n, v) in self.attrs.iter_mut() {
            if n == name {
                return Some(std::mem::replace(v, value.to_string()));
            }
        }
        self.attrs.push((name.to_string(), value.to_string()));
        None
    }

    pub(crate) fn remove_plain_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(n, _)| n == name)?;
        Some(self.attrs.remove(pos).1)
    }

    /// camelCase view over the `data-*` attributes
    pub fn dataset(&self) -> DOMStringMap {
        DOMStringMap::from_attributes(self.attrs.iter().map(|(n, v)| (n.as_str(), v.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_attrs() {
        let mut el = ElementData::new("DIV");
        assert_eq!(el.tag, "div");
        assert_eq!(el.set_plain_attr("data-layout", "top"), None);
        assert_eq!(el.set_plain_attr("data-layout", "bottom").as_deref(), Some("top"));
        assert_eq!(el.get_attr("data-layout").as_deref(), Some("bottom"));
        assert_eq!(el.dataset().get("layout"), Some("bottom"));
        assert_eq!(el.remove_plain_attr("data-layout").as_deref(), Some("bottom"));
        assert_eq!(el.get_attr("class"), None);
    }

    #[test]
    fn test_node_kinds() {
        assert!(Node::element("p").is_element());
        assert_eq!(Node::text("hi").as_text(), Some("hi"));
        assert!(Node::document().as_element().is_none());
    }
}
