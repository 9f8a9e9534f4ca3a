//! Selectors
//!
//! The subset of CSS selectors the bar markup uses: comma separated lists
//! of compound selectors (`tag`, `*`, `#id`, `.class`, `[attr]`,
//! `[attr=value]`) joined by descendant or child combinators.

use crate::{Document, ElementData, NodeId};

/// Selector parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unterminated attribute selector")]
    UnterminatedAttribute,
}

/// Combinator joining two compound selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, el: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && *tag != el.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.classes.contains(c)) {
            return false;
        }
        self.attrs.iter().all(|a| match a {
            AttrMatch::Exists(name) => el.get_attr(name).is_some(),
            AttrMatch::Equals(name, value) => el.get_attr(name).as_deref() == Some(value.as_str()),
        })
    }
}

/// One complex selector; `parts[i].0` joins `parts[i - 1]` to `parts[i]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Complex>,
}

impl Selector {
    /// Parse a selector list
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser { chars: source.char_indices().collect(), pos: 0 };
        let mut groups = Vec::new();
        loop {
            groups.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(c) => return Err(parser.unexpected(c)),
            }
        }
        Ok(Self { source: source.to_string(), groups })
    }

    /// Original selector text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether `node` matches any selector in the list
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.groups
            .iter()
            .any(|g| !g.parts.is_empty() && match_from(doc, node, &g.parts, g.parts.len() - 1))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn match_from(doc: &Document, node: NodeId, parts: &[(Combinator, Compound)], idx: usize) -> bool {
    let Some(el) = doc.element(node) else {
        return false;
    };
    if !parts[idx].1.matches(el) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match parts[idx].0 {
        Combinator::Child => doc
            .parent(node)
            .is_some_and(|p| match_from(doc, p, parts, idx - 1)),
        Combinator::Descendant => {
            let mut current = doc.parent(node);
            while let Some(ancestor) = current {
                if match_from(doc, ancestor, parts, idx - 1) {
                    return true;
                }
                current = doc.parent(ancestor);
            }
            false
        }
    }
}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|&(o, _)| o).unwrap_or_default()
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected { found, offset: self.offset() }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        self.skip_ws();
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        loop {
            let compound = self.compound()?;
            if compound.is_empty() {
                return match self.peek() {
                    Some(c) if c != ',' => Err(self.unexpected(c)),
                    _ => Err(SelectorError::Empty),
                };
            }
            parts.push((combinator, compound));

            let had_ws = self.skip_ws();
            match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinator = Combinator::Child;
                }
                Some(',') | None => break,
                Some(_) if had_ws => combinator = Combinator::Descendant,
                Some(c) => return Err(self.unexpected(c)),
            }
        }
        Ok(Complex { parts })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
            compound.tag = Some("*".to_string());
        } else {
            let tag = self.ident();
            if !tag.is_empty() {
                compound.tag = Some(tag.to_ascii_lowercase());
            }
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.ident();
                    if id.is_empty() {
                        return Err(self.unexpected(self.peek().unwrap_or('#')));
                    }
                    compound.id = Some(id);
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.ident();
                    if class.is_empty() {
                        return Err(self.unexpected(self.peek().unwrap_or('.')));
                    }
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                _ => break,
            }
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrMatch, SelectorError> {
        self.skip_ws();
        let name = self.ident();
        self.skip_ws();
        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(AttrMatch::Exists(name))
            }
            Some('=') => {
                self.pos += 1;
                self.skip_ws();
                let value = match self.peek() {
                    Some(q @ ('"' | '\'')) => {
                        self.pos += 1;
                        let mut value = String::new();
                        loop {
                            match self.peek() {
                                None => return Err(SelectorError::UnterminatedAttribute),
                                Some(c) if c == q => {
                                    self.pos += 1;
                                    break;
                                }
                                Some(c) => {
                                    value.push(c);
                                    self.pos += 1;
                                }
                            }
                        }
                        value
                    }
                    _ => self.ident(),
                };
                self.skip_ws();
                if self.peek() != Some(']') {
                    return Err(SelectorError::UnterminatedAttribute);
                }
                self.pos += 1;
                Ok(AttrMatch::Equals(name, value))
            }
            None => Err(SelectorError::UnterminatedAttribute),
            Some(c) => Err(self.unexpected(c)),
        }
    }
}
