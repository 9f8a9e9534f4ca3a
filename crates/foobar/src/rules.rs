//! Toggle rules
//!
//! A rule opens or closes its bar when a condition is met: right away, after
//! a delay, at a scroll position, when an element scrolls into view or when
//! the pointer leaves the page. Rule kinds are a closed set; names resolve
//! to kinds through a registry that also carries each kind's defaults.

use crate::bar::Bar;
use crate::state::BarAction;
use foobar_core::{ClassRegistry, Component, ObserverId, Result, Runtime, TimerId, merge};
use foobar_dom::{
    DomEvent, DomEventType, EventTarget, IntersectionObserverEntry, IntersectionObserverOptions, ListenerId, NodeId,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Condition a rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Immediate,
    Transition,
    Delay,
    ScrollTop,
    ScrollBottom,
    ElementVisibility,
    ExitIntent,
}

/// What a rule does to its bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Open,
    Close,
}

impl RuleAction {
    pub fn target_state(self) -> bool {
        self == RuleAction::Open
    }

    fn event(self) -> &'static str {
        match self {
            RuleAction::Open => "open-rule",
            RuleAction::Close => "close-rule",
        }
    }
}

/// Comparison used by the scroll rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[default]
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "===", alias = "==")]
    Eq,
}

impl Comparison {
    pub fn test(self, left: f32, right: f32) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Gt => left > right,
            Comparison::Le => left <= right,
            Comparison::Ge => left >= right,
            Comparison::Eq => (left - right).abs() < f32::EPSILON,
        }
    }
}

/// Rule configuration after defaults are applied
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleConfig {
    pub name: String,
    pub priority: i32,
    pub once: bool,
    pub allow_transition: bool,
    /// ms for `delay` and the exit intent pre-delay, px for the scroll rules
    pub value: f32,
    pub cmp: Comparison,
    pub selector: Option<String>,
    pub threshold: f32,
    pub sensitivity: f32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            priority: 0,
            once: true,
            allow_transition: true,
            value: 0.0,
            cmp: Comparison::Ge,
            selector: None,
            threshold: 0.0,
            sensitivity: 0.0,
        }
    }
}

/// Registry of rule kinds with their default config
pub type RuleRegistry = ClassRegistry<RuleKind>;

/// Registry holding every built-in kind
pub fn default_rules() -> RuleRegistry {
    let registry = RuleRegistry::new();
    let kinds = [
        ("immediate", RuleKind::Immediate, json!({"allowTransition": false})),
        ("transition", RuleKind::Transition, json!({})),
        ("delay", RuleKind::Delay, json!({"value": 0})),
        ("scroll-top", RuleKind::ScrollTop, json!({"cmp": ">="})),
        ("scroll-bottom", RuleKind::ScrollBottom, json!({"cmp": "<="})),
        ("element-visibility", RuleKind::ElementVisibility, json!({"threshold": 0})),
        ("exit-intent", RuleKind::ExitIntent, json!({"sensitivity": 0, "value": 0})),
    ];
    for (name, kind, config) in kinds {
        registry.register(name, kind, None, config, 0);
    }
    registry
}

/// Rule configs from an `open`/`close` option: one object or a list.
/// Sorted by descending priority.
pub fn parse_rule_list(registry: &RuleRegistry, option: &Value) -> Vec<(RuleKind, RuleConfig)> {
    let raw: Vec<&Value> = match option {
        Value::Array(list) => list.iter().collect(),
        Value::Object(_) => vec![option],
        Value::String(name) if !name.is_empty() => return parse_rule_list(registry, &json!({"name": name})),
        _ => Vec::new(),
    };
    let mut rules: Vec<(RuleKind, RuleConfig)> = raw
        .into_iter()
        .filter_map(|raw| {
            let name = raw.get("name").and_then(Value::as_str)?;
            let Some(entry) = registry.get(name) else {
                tracing::warn!("unknown toggle rule `{name}`");
                return None;
            };
            let mut merged = registry.resolve_config(name);
            merge(&mut merged, raw);
            match serde_json::from_value::<RuleConfig>(merged) {
                Ok(config) => Some((entry.ctor, config)),
                Err(e) => {
                    tracing::warn!("malformed toggle rule `{name}`: {e}");
                    None
                }
            }
        })
        .collect();
    rules.sort_by(|a, b| b.1.priority.cmp(&a.1.priority));
    rules
}

/// Adjust rule lists to the remembered state: a bar remembered open gets an
/// immediate open rule first, a bar remembered closed loses the open rules
/// that would reopen it on load.
pub fn reconcile(registry: &RuleRegistry, open: &mut Vec<(RuleKind, RuleConfig)>, stored: Option<BarAction>) {
    match stored {
        Some(BarAction::Open) => {
            if !open.iter().any(|(kind, _)| *kind == RuleKind::Immediate) {
                let immediate = parse_rule_list(registry, &json!({"name": "immediate"}));
                for rule in immediate.into_iter().rev() {
                    open.insert(0, rule);
                }
            }
        }
        Some(BarAction::Closed) => {
            open.retain(|(kind, _)| !matches!(kind, RuleKind::Immediate | RuleKind::Transition));
        }
        _ => {}
    }
}

#[derive(Default)]
struct Handles {
    listeners: Vec<ListenerId>,
    timers: Vec<TimerId>,
    observers: Vec<ObserverId>,
}

/// A rule bound to a bar
pub struct ToggleRule {
    kind: RuleKind,
    config: RuleConfig,
    action: RuleAction,
    bar: Weak<Bar>,
    rt: Weak<Runtime>,
    this: Weak<ToggleRule>,
    handles: RefCell<Handles>,
    fired: Cell<bool>,
    destroyed: Cell<bool>,
}

impl ToggleRule {
    pub fn new(bar: &Rc<Bar>, action: RuleAction, kind: RuleKind, config: RuleConfig) -> Rc<Self> {
        let rt = Rc::downgrade(bar.runtime());
        Rc::new_cyclic(|this| Self {
            kind,
            config,
            action,
            bar: Rc::downgrade(bar),
            rt,
            this: this.clone(),
            handles: RefCell::new(Handles::default()),
            fired: Cell::new(false),
            destroyed: Cell::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn action(&self) -> RuleAction {
        self.action
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    pub fn allow_transition(&self) -> bool {
        self.config.allow_transition
    }

    /// Whether the rule has fired at least once
    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }

    /// Start watching the condition. Immediate and transition rules apply
    /// right away and the returned future resolves once the bar settled.
    pub async fn run(self: &Rc<Self>) -> Result<()> {
        let Some(rt) = self.rt.upgrade() else { return Ok(()) };
        match self.kind {
            RuleKind::Immediate | RuleKind::Transition => {
                self.fired.set(true);
                self.apply().await?;
            }
            RuleKind::Delay => {
                let weak = self.this.clone();
                let id = rt.set_timeout(self.config.value.max(0.0) as u64, move || {
                    if let Some(rule) = weak.upgrade() {
                        rule.fire();
                    }
                });
                self.handles.borrow_mut().timers.push(id);
            }
            RuleKind::ScrollTop | RuleKind::ScrollBottom => {
                if self.scroll_condition(&rt) {
                    self.fire();
                }
                if self.config.once && self.fired.get() {
                    return Ok(());
                }
                let weak = self.this.clone();
                let id = rt.add_listener(EventTarget::Window, DomEventType::Scroll, Rc::new(move |_: &DomEvent| {
                    let Some(rule) = weak.upgrade() else { return };
                    let Some(rt) = rule.rt.upgrade() else { return };
                    if rule.scroll_condition(&rt) {
                        rule.fire();
                    }
                }));
                self.handles.borrow_mut().listeners.push(id);
            }
            RuleKind::ElementVisibility => self.watch_visibility(&rt),
            RuleKind::ExitIntent => {
                let weak = self.this.clone();
                let delay = self.config.value.max(0.0) as u64;
                let id = rt.set_timeout(delay, move || {
                    if let Some(rule) = weak.upgrade() {
                        rule.watch_exit_intent();
                    }
                });
                self.handles.borrow_mut().timers.push(id);
            }
        }
        Ok(())
    }

    fn scroll_condition(&self, rt: &Runtime) -> bool {
        let doc = rt.document();
        let measured = match self.kind {
            RuleKind::ScrollTop => doc.window().scroll_y,
            _ => doc.window().distance_to_bottom(),
        };
        self.config.cmp.test(measured, self.config.value)
    }

    fn watch_visibility(&self, rt: &Rc<Runtime>) {
        let Some(selector) = self.config.selector.as_deref() else {
            tracing::warn!("element-visibility rule without a selector");
            return;
        };
        let targets = {
            let doc = rt.document();
            match doc.query_selector_all(doc.root(), selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    tracing::warn!("element-visibility selector `{selector}`: {e}");
                    return;
                }
            }
        };
        if targets.is_empty() {
            tracing::debug!("element-visibility: nothing matches `{selector}`");
            return;
        }
        let threshold = self.config.threshold;
        let options = IntersectionObserverOptions { threshold: vec![threshold] };
        let weak = self.this.clone();
        let id = rt.observe_intersection(&targets, options, Rc::new(move |entries: &[IntersectionObserverEntry]| {
            let visible = entries
                .iter()
                .any(|e| e.is_intersecting && e.intersection_ratio >= threshold);
            if let (true, Some(rule)) = (visible, weak.upgrade()) {
                rule.fire();
            }
        }));
        self.handles.borrow_mut().observers.push(id);
    }

    fn watch_exit_intent(&self) {
        let Some(rt) = self.rt.upgrade() else { return };
        if self.destroyed.get() {
            return;
        }
        let weak = self.this.clone();
        let id = rt.add_listener(EventTarget::Node(NodeId::ROOT), DomEventType::MouseOut, Rc::new(move |event: &DomEvent| {
            let Some(rule) = weak.upgrade() else { return };
            let Some(rt) = rule.rt.upgrade() else { return };
            let exited = match rule.config.selector.as_deref() {
                Some(selector) => {
                    let doc = rt.document();
                    event
                        .target_node()
                        .and_then(|target| doc.closest(target, selector))
                        .is_some_and(|area| !event.related_target.is_some_and(|to| doc.contains(area, to) || to == area))
                }
                None => event.related_target.is_none() && event.client_y <= rule.config.sensitivity,
            };
            if exited {
                rule.fire();
            }
        }));
        self.handles.borrow_mut().listeners.push(id);
    }

    /// The condition was met
    fn fire(&self) {
        if self.destroyed.get() {
            return;
        }
        if self.config.once && self.fired.get() {
            return;
        }
        self.fired.set(true);
        if self.config.once {
            self.disarm();
        }
        let (Some(rule), Some(rt)) = (self.this.upgrade(), self.rt.upgrade()) else { return };
        rt.spawn(async move {
            if let Err(e) = rule.apply().await {
                tracing::debug!("toggle rule `{}` not applied: {e}", rule.name());
            }
        });
    }

    /// Move the bar to the rule's target state. A no-op when it is already
    /// there; `open-rule`/`close-rule` is emitted only on change.
    pub async fn apply(&self) -> Result<bool> {
        let Some(bar) = self.bar.upgrade() else { return Ok(false) };
        let target = self.action.target_state();
        if self.destroyed.get() || bar.is_open() == target {
            return Ok(false);
        }
        let changed = bar.toggle(Some(target), !self.config.allow_transition).await?;
        if changed {
            bar.base().emit(self.action.event(), &[json!(self.config.name)]);
        }
        Ok(changed)
    }

    /// Drop every listener, timer and observer
    pub fn disarm(&self) {
        let handles = std::mem::take(&mut *self.handles.borrow_mut());
        let Some(rt) = self.rt.upgrade() else { return };
        for id in handles.listeners {
            rt.remove_listener(id);
        }
        for id in handles.timers {
            rt.clear_timeout(id);
        }
        for id in handles.observers {
            rt.disconnect(id);
        }
    }

    pub fn destroy(&self) {
        self.destroyed.set(true);
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparisons() {
        assert!(Comparison::Ge.test(500.0, 500.0));
        assert!(!Comparison::Gt.test(500.0, 500.0));
        assert!(Comparison::Le.test(10.0, 50.0));
        assert!(Comparison::Eq.test(3.0, 3.0));
        let cmp: Comparison = serde_json::from_value(json!("<")).unwrap_or_default();
        assert_eq!(cmp, Comparison::Lt);
    }

    #[test]
    fn test_parse_single_and_list() {
        let registry = default_rules();
        let single = parse_rule_list(&registry, &json!({"name": "scroll-top", "value": 500}));
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].0, RuleKind::ScrollTop);
        assert_eq!(single[0].1.value, 500.0);
        assert!(single[0].1.once && single[0].1.allow_transition);

        let list = parse_rule_list(
            &registry,
            &json!([{"name": "delay", "value": 100}, {"name": "bogus"}, {"name": "immediate", "priority": 5}]),
        );
        let kinds: Vec<RuleKind> = list.iter().map(|r| r.0).collect();
        assert_eq!(kinds, vec![RuleKind::Immediate, RuleKind::Delay]);
        assert!(!list[0].1.allow_transition);
    }

    #[test]
    fn test_kind_defaults() {
        let registry = default_rules();
        let bottom = parse_rule_list(&registry, &json!({"name": "scroll-bottom", "value": 100}));
        assert_eq!(bottom[0].1.cmp, Comparison::Le);
        let top = parse_rule_list(&registry, &json!({"name": "scroll-top", "cmp": "<", "once": false}));
        assert_eq!(top[0].1.cmp, Comparison::Lt);
        assert!(!top[0].1.once);
    }

    #[test]
    fn test_reconcile_with_stored_state() {
        let registry = default_rules();
        let mut open = parse_rule_list(&registry, &json!([{"name": "scroll-top", "value": 500}]));
        reconcile(&registry, &mut open, Some(BarAction::Open));
        assert_eq!(open[0].0, RuleKind::Immediate);
        assert_eq!(open.len(), 2);

        let mut open = parse_rule_list(&registry, &json!([{"name": "immediate"}, {"name": "transition"}, {"name": "delay"}]));
        reconcile(&registry, &mut open, Some(BarAction::Closed));
        let kinds: Vec<RuleKind> = open.iter().map(|r| r.0).collect();
        assert_eq!(kinds, vec![RuleKind::Delay]);
    }
}
