//! DOMTokenList (classList)
//!
//! Ordered, duplicate-free set of class tokens. Every mutating method
//! reports whether the list actually changed so the document only records
//! real mutations.

/// DOMTokenList for managing space-separated tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DOMTokenList {
    tokens: Vec<String>,
}

impl DOMTokenList {
    /// Create empty token list
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from space-separated string
    pub fn from_string(s: &str) -> Self {
        let mut list = Self::new();
        list.set_value(s);
        list
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check if token exists
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Add tokens, returns true if anything was added
    pub fn add(&mut self, tokens: &[&str]) -> bool {
        let mut changed = false;
        for token in tokens.iter().flat_map(|t| t.split_whitespace()) {
            if !self.contains(token) {
                self.tokens.push(token.to_string());
                changed = true;
            }
        }
        changed
    }

    /// Remove tokens, returns true if anything was removed
    pub fn remove(&mut self, tokens: &[&str]) -> bool {
        let before = self.tokens.len();
        let doomed: Vec<&str> = tokens.iter().flat_map(|t| t.split_whitespace()).collect();
        self.tokens.retain(|t| !doomed.contains(&t.as_str()));
        before != self.tokens.len()
    }

    /// Toggle token, returns the new state
    pub fn toggle(&mut self, token: &str, force: Option<bool>) -> bool {
        let state = force.unwrap_or(!self.contains(token));
        if state {
            self.add(&[token]);
        } else {
            self.remove(&[token]);
        }
        state
    }

    /// Replace token in place
    pub fn replace(&mut self, old_token: &str, new_token: &str) -> bool {
        if self.contains(new_token) {
            return self.remove(&[old_token]);
        }
        match self.tokens.iter().position(|t| t == old_token) {
            Some(pos) => {
                self.tokens[pos] = new_token.to_string();
                true
            }
            None => false,
        }
    }

    /// Get value as string
    pub fn value(&self) -> String {
        self.tokens.join(" ")
    }

    /// Set from string, dropping duplicates
    pub fn set_value(&mut self, value: &str) {
        self.tokens.clear();
        for token in value.split_whitespace() {
            if !self.contains(token) {
                self.tokens.push(token.to_string());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|s| s.as_str())
    }
}

impl std::fmt::Display for DOMTokenList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string_dedupes() {
        let list = DOMTokenList::from_string("foobar fbr-top  foobar");
        assert_eq!(list.len(), 2);
        assert_eq!(list.value(), "foobar fbr-top");
    }

    #[test]
    fn test_add_reports_change() {
        let mut list = DOMTokenList::new();
        assert!(list.add(&["fbr-open"]));
        assert!(!list.add(&["fbr-open"]));
        assert!(list.add(&["fbr-next fbr-active"]));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_toggle_force() {
        let mut list = DOMTokenList::new();
        assert!(list.toggle("fbr-open", None));
        assert!(list.toggle("fbr-open", Some(true)));
        assert!(!list.toggle("fbr-open", Some(false)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_replace() {
        let mut list = DOMTokenList::from_string("fbr-prev fbr-item");
        assert!(list.replace("fbr-prev", "fbr-next"));
        assert_eq!(list.value(), "fbr-next fbr-item");
        assert!(!list.replace("missing", "other"));
    }
}
