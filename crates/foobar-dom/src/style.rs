//! Inline styles and declared transitions

use std::collections::BTreeMap;

/// Inline `style` declarations of one element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap {
    props: BTreeMap<String, String>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.props.get(prop).map(|s| s.as_str())
    }

    /// Set a declaration, returns true if the value changed
    pub fn set(&mut self, prop: &str, value: &str) -> bool {
        if value.is_empty() {
            return self.remove(prop);
        }
        match self.props.get(prop) {
            Some(existing) if existing == value => false,
            _ => {
                self.props.insert(prop.to_string(), value.to_string());
                true
            }
        }
    }

    pub fn remove(&mut self, prop: &str) -> bool {
        self.props.remove(prop).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Serialize as a `style` attribute value
    pub fn css_text(&self) -> String {
        self.props
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Transition declared for an element by the page stylesheet
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSpec {
    /// Transitioned property, `all` matches any change
    pub property: String,
    pub duration_ms: u64,
}

impl TransitionSpec {
    pub fn new(property: &str, duration_ms: u64) -> Self {
        Self { property: property.to_string(), duration_ms }
    }

    pub fn all(duration_ms: u64) -> Self {
        Self::new("all", duration_ms)
    }

    /// Whether a change to `prop` runs this transition
    pub fn covers(&self, prop: &str) -> bool {
        self.property == "all" || self.property == prop || prop == "class"
    }
}

/// Parse a pixel length such as `12px`, `12.5px` or a bare `12`
pub fn parse_px(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f32>().ok().filter(|n| n.is_finite())
}
