//! Constructor registries
//!
//! `ClassRegistry` maps names to constructors with a default config, a
//! priority and an optional base entry. `ComponentRegistry` adds selectors
//! and resolves constructors for elements of the page.
//!
//! Entries with a negative priority are base entries: they only take part
//! in element resolution when the caller allows it, and when one carries a
//! selector it alone decides which elements `create_all` visits.

use crate::component::ComponentInit;
use crate::config::{ComponentConfig, data_config, merge};
use crate::runtime::Runtime;
use foobar_dom::{NodeId, Selector};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Upper bound on base chain length
const MAX_CHAIN: usize = 32;

/// One registry entry
#[derive(Clone)]
pub struct RegisteredEntry<F> {
    pub name: String,
    pub ctor: F,
    pub selector: Option<Selector>,
    pub config: Value,
    pub priority: i32,
    pub base: Option<String>,
}

impl<F> RegisteredEntry<F> {
    pub fn is_base(&self) -> bool {
        self.priority < 0
    }
}

/// Name to constructor registry
pub struct ClassRegistry<F> {
    entries: RefCell<Vec<RegisteredEntry<F>>>,
}

impl<F> Default for ClassRegistry<F> {
    fn default() -> Self {
        Self { entries: RefCell::new(Vec::new()) }
    }
}

impl<F: Clone> ClassRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. Rejects blank names and unparsable selectors.
    /// Re-registering replaces everything but the first-seen priority.
    pub fn register(&self, name: &str, ctor: F, selector: Option<&str>, config: Value, priority: i32) -> bool {
        self.insert(name, ctor, selector, config, priority, None)
    }

    /// Register `name` deriving from the existing entry `base`
    pub fn extend(
        &self,
        name: &str,
        base: &str,
        ctor: F,
        selector: Option<&str>,
        config: Value,
        priority: i32,
    ) -> bool {
        if !self.contains(base) {
            tracing::warn!("cannot register `{name}`: unknown base `{base}`");
            return false;
        }
        self.insert(name, ctor, selector, config, priority, Some(base.to_string()))
    }

    fn insert(
        &self,
        name: &str,
        ctor: F,
        selector: Option<&str>,
        config: Value,
        priority: i32,
        base: Option<String>,
    ) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let selector = match selector.map(Selector::parse).transpose() {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!("cannot register `{name}`: {e}");
                return false;
            }
        };
        let config = if config.is_null() { Value::Object(Map::new()) } else { config };

        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => {
                existing.ctor = ctor;
                existing.selector = selector;
                existing.config = config;
                existing.base = base;
            }
            None => entries.push(RegisteredEntry {
                name: name.to_string(),
                ctor,
                selector,
                config,
                priority,
                base,
            }),
        }
        true
    }

    /// Replace the default config of `name`
    pub fn configure(&self, name: &str, config: Value) -> bool {
        match self.entries.borrow_mut().iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.config = config;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<RegisteredEntry<F>> {
        self.entries.borrow().iter().find(|e| e.name == name).cloned()
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| e.name != name);
        before != entries.len()
    }

    /// Entries by descending priority, registration order within a priority
    pub fn entries(&self) -> Vec<RegisteredEntry<F>> {
        let mut entries = self.entries.borrow().clone();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        entries
    }

    /// Names in resolution order, base entries excluded
    pub fn names(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| !e.is_base())
            .map(|e| e.name)
            .collect()
    }

    /// Default config of `name` merged along its base chain, root first
    pub fn resolve_config(&self, name: &str) -> Value {
        let mut chain = Vec::new();
        let mut next = Some(name.to_string());
        while let Some(current) = next.take() {
            if chain.len() >= MAX_CHAIN || chain.iter().any(|e: &RegisteredEntry<F>| e.name == current) {
                tracing::warn!("base chain of `{name}` loops at `{current}`");
                break;
            }
            let Some(entry) = self.get(&current) else { break };
            next = entry.base.clone();
            chain.push(entry);
        }
        let mut config = Value::Object(Map::new());
        for entry in chain.iter().rev() {
            merge(&mut config, &entry.config);
        }
        config
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Component constructor
pub type Constructor<C, P> = Rc<dyn Fn(ComponentInit<P>) -> Rc<C>>;

/// Per-call creation parameters
#[derive(Clone)]
pub struct CreateContext<P> {
    pub parent: P,
    /// Caller overrides, merged last
    pub overrides: Value,
    /// Parent supplied defaults keyed by entry name
    pub defaults: Value,
    /// Let base entries resolve elements
    pub allow_base: bool,
}

impl<P> CreateContext<P> {
    pub fn new(parent: P) -> Self {
        Self { parent, overrides: Value::Null, defaults: Value::Null, allow_base: false }
    }

    pub fn allow_base(mut self) -> Self {
        self.allow_base = true;
        self
    }

    pub fn with_overrides(mut self, overrides: Value) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Registry of page components resolved by selector
pub struct ComponentRegistry<C: ?Sized, P> {
    classes: ClassRegistry<Constructor<C, P>>,
}

impl<C: ?Sized, P> Default for ComponentRegistry<C, P> {
    fn default() -> Self {
        Self { classes: ClassRegistry::default() }
    }
}

impl<C: ?Sized + 'static, P: Clone + 'static> ComponentRegistry<C, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classes(&self) -> &ClassRegistry<Constructor<C, P>> {
        &self.classes
    }

    pub fn register(
        &self,
        name: &str,
        ctor: Constructor<C, P>,
        selector: Option<&str>,
        config: Value,
        priority: i32,
    ) -> bool {
        self.classes.register(name, ctor, selector, config, priority)
    }

    pub fn extend(
        &self,
        name: &str,
        base: &str,
        ctor: Constructor<C, P>,
        selector: Option<&str>,
        config: Value,
        priority: i32,
    ) -> bool {
        self.classes.extend(name, base, ctor, selector, config, priority)
    }

    pub fn configure(&self, name: &str, config: Value) -> bool {
        self.classes.configure(name, config)
    }

    /// Entry name whose selector matches `element`, most specific first
    pub fn resolve(&self, rt: &Runtime, element: NodeId, allow_base: bool) -> Option<String> {
        let doc = rt.document();
        self.classes
            .entries()
            .into_iter()
            .filter(|e| allow_base || !e.is_base())
            .find(|e| e.selector.as_ref().is_some_and(|s| s.matches(&doc, element)))
            .map(|e| e.name)
    }

    /// Final config for `name` on `element`: base chain, parent defaults,
    /// `data-*` attributes, then caller overrides
    pub fn merged_config(&self, rt: &Runtime, name: &str, element: NodeId, ctx: &CreateContext<P>) -> ComponentConfig {
        let mut config = ComponentConfig::from(self.classes.resolve_config(name));
        if let Some(defaults) = ctx.defaults.get(name) {
            config.merge(defaults);
        }
        let dataset = rt.document().element(element).map(|e| e.dataset());
        if let Some(dataset) = dataset {
            config.merge(&data_config(&dataset));
        }
        config.merge(&ctx.overrides);
        config
    }

    /// Create the component registered as `name` on `element`
    pub fn create(&self, rt: &Rc<Runtime>, name: &str, element: NodeId, ctx: &CreateContext<P>) -> Option<Rc<C>> {
        let entry = self.classes.get(name)?;
        let config = self.merged_config(rt, name, element, ctx);
        tracing::debug!("creating `{name}` on {element}");
        Some((entry.ctor)(ComponentInit {
            name: entry.name,
            element,
            config,
            parent: ctx.parent.clone(),
            runtime: rt.clone(),
        }))
    }

    /// Create whatever component matches `element`
    pub fn create_for(&self, rt: &Rc<Runtime>, element: NodeId, ctx: &CreateContext<P>) -> Option<Rc<C>> {
        let name = self.resolve(rt, element, ctx.allow_base)?;
        self.create(rt, &name, element, ctx)
    }

    /// Elements under `root` a `create_all` would visit, in document order
    pub fn scan(&self, rt: &Runtime, root: NodeId) -> Vec<NodeId> {
        let entries = self.classes.entries();
        let base: Vec<Selector> = entries
            .iter()
            .filter(|e| e.is_base())
            .filter_map(|e| e.selector.clone())
            .collect();
        let selectors = if base.is_empty() {
            entries.into_iter().filter_map(|e| e.selector).collect()
        } else {
            base
        };
        let doc = rt.document();
        doc.descendants(root)
            .into_iter()
            .filter(|&node| selectors.iter().any(|s| s.matches(&doc, node)))
            .collect()
    }

    /// Create one component per matching element under `root`
    pub fn create_all(&self, rt: &Rc<Runtime>, root: NodeId, ctx: &CreateContext<P>) -> Vec<Rc<C>> {
        self.scan(rt, root)
            .into_iter()
            .filter_map(|node| self.create_for(rt, node, ctx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foobar_dom::Document;
    use serde_json::json;

    #[derive(Debug)]
    struct Made {
        name: String,
        element: NodeId,
        config: ComponentConfig,
    }

    fn ctor() -> Constructor<Made, ()> {
        Rc::new(|init: ComponentInit<()>| {
            Rc::new(Made { name: init.name, element: init.element, config: init.config })
        })
    }

    #[test]
    fn test_register_rejects_blank_and_unknown_base() {
        let registry: ClassRegistry<u8> = ClassRegistry::new();
        assert!(!registry.register("  ", 1, None, Value::Null, 0));
        assert!(!registry.extend("child", "missing", 1, None, Value::Null, 0));
        assert!(registry.register("base", 1, None, Value::Null, -1));
        assert!(registry.extend("child", "base", 2, None, Value::Null, 0));
        assert!(!registry.register("bad", 1, Some("[data-x"), Value::Null, 0));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregistration_keeps_first_priority() {
        let registry: ClassRegistry<u8> = ClassRegistry::new();
        registry.register("a", 1, None, Value::Null, 5);
        registry.register("b", 1, None, Value::Null, 10);
        registry.register("a", 2, None, json!({"x": 1}), 0);
        assert_eq!(registry.names(), vec!["b", "a"]);
        let a = registry.get("a").map(|e| (e.ctor, e.priority, e.config));
        assert_eq!(a, Some((2, 5, json!({"x": 1}))));
    }

    #[test]
    fn test_base_chain_config() {
        let registry: ClassRegistry<u8> = ClassRegistry::new();
        registry.register("item", 0, None, json!({"options": {"timeout": 0, "a": 1}}), -1);
        registry.extend("countdown", "item", 0, None, json!({"options": {"timeout": 5}}), 0);
        assert_eq!(
            registry.resolve_config("countdown"),
            json!({"options": {"timeout": 5, "a": 1}})
        );
    }

    fn page() -> (Rc<Runtime>, Vec<NodeId>) {
        let mut doc = Document::new();
        let body = doc.body();
        let mut items = Vec::new();
        for class in ["fbr-item", "fbr-item fbr-countdown", "other", "fbr-item"] {
            let el = doc.create_element("div");
            doc.set_attribute(el, "class", class);
            doc.append_child(body, el);
            items.push(el);
        }
        doc.set_attribute(items[0], "data-timeout", "2500");
        (Runtime::new(doc), items)
    }

    fn registry() -> ComponentRegistry<Made, ()> {
        let registry = ComponentRegistry::new();
        registry.register("item", ctor(), Some(".fbr-item"), json!({"options": {"timeout": 0}}), -1);
        registry.extend("countdown", "item", ctor(), Some(".fbr-item.fbr-countdown"), Value::Null, 0);
        registry
    }

    #[test]
    fn test_create_all_in_dom_order() {
        let (rt, items) = page();
        let registry = registry();
        let root = rt.document().body();

        let made = registry.create_all(&rt, root, &CreateContext::new(()).allow_base());
        let names: Vec<&str> = made.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["item", "countdown", "item"]);
        assert_eq!(made[2].element, items[3]);

        // without base entries only the countdown resolves
        let made = registry.create_all(&rt, root, &CreateContext::new(()));
        assert_eq!(made.len(), 1);
    }

    #[test]
    fn test_config_merge_order() {
        let (rt, items) = page();
        let registry = registry();
        let ctx = CreateContext::new(())
            .allow_base()
            .with_defaults(json!({"item": {"options": {"timeout": 1000, "timeoutAction": "close"}}}))
            .with_overrides(json!({"options": {"timeoutAction": "dismiss"}}));

        let made = registry.create_for(&rt, items[0], &ctx).map(|m| m.config.clone());
        let options = made.map(|c| c.options().clone());
        assert_eq!(options, Some(json!({"timeout": 2500, "timeoutAction": "dismiss"})));
    }

    #[test]
    fn test_create_unknown_returns_none() {
        let (rt, items) = page();
        let registry = registry();
        assert!(registry.create(&rt, "nope", items[0], &CreateContext::new(())).is_none());
        assert!(registry.create_for(&rt, items[2], &CreateContext::new(()).allow_base()).is_none());
    }
}
