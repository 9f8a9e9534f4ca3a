//! DOMStringMap (dataset)
//!
//! camelCase view over `data-*` attributes. Values are kept as raw strings;
//! callers decide whether to interpret them as JSON.

use std::collections::BTreeMap;

/// DOMStringMap for data-* attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DOMStringMap {
    data: BTreeMap<String, String>,
}

impl DOMStringMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an element's attribute list
    pub fn from_attributes<'a>(attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let data = attrs
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("data-")
                    .map(|key| (to_camel_case(key), value.to_string()))
            })
            .collect();
        Self { data }
    }

    /// Get value by camelCase key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert a camelCase key to its attribute name
    pub fn to_attribute_name(key: &str) -> String {
        format!("data-{}", to_kebab_case(key))
    }
}

/// Convert kebab-case to camelCase
fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '-' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// Convert camelCase to kebab-case
fn to_kebab_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            result.push('-');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}
