//! Bars
//!
//! A bar is a parent of items bound to one `.foobar` element. It opens and
//! closes through its toggle rules or its buttons, cycles through its items
//! and takes its place in the plugin's stacking pass.

use crate::item::Item;
use crate::layout::{BarMetrics, BarPosition};
use crate::options::{BarOptions, Classes, Family, Layout, TimeoutAction};
use crate::plugin::Plugin;
use crate::rules::{RuleAction, ToggleRule, parse_rule_list, reconcile};
use crate::state::BarAction;
use foobar_core::{
    Component, ComponentBase, ComponentInit, CreateContext, Error, Observation, ParentComponent,
    Result, Runtime, TransitionEnd, destroy,
};
use foobar_dom::{Document, DomEvent, DomEventType, EventTarget, ListenerId, NodeId};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Direction of an item change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Prev => "prev",
            Direction::Next => "next",
        }
    }
}

const TOGGLE_BUTTON: &str = ".fbr-toggle";
const DISMISS_BUTTON: &str = ".fbr-dismiss";
const PREV_BUTTON: &str = ".fbr-prev";
const NEXT_BUTTON: &str = ".fbr-next";

/// Custom property holding the toggle button clearance
pub const TOGGLE_OFFSET_PROPERTY: &str = "--fbr-toggle-offset";

/// A notification bar
pub struct Bar {
    base: ComponentBase,
    plugin: Weak<Plugin>,
    id: String,
    options: BarOptions,
    classes: Classes,
    items: ParentComponent<Item, Weak<Bar>>,
    observation: Observation,
    is_open: Cell<bool>,
    active: Cell<Option<usize>>,
    last_height: Cell<f32>,
    last_width: Cell<f32>,
    rules: RefCell<Vec<Rc<ToggleRule>>>,
    listeners: RefCell<Vec<ListenerId>>,
}

impl Bar {
    pub fn new(init: ComponentInit<Weak<Plugin>>) -> Rc<Self> {
        let options: BarOptions = init.config.options_as();
        let classes: Classes = init.config.classes_as();
        let plugin = init.parent.clone();
        let items = match plugin.upgrade() {
            Some(plugin) => ParentComponent::new(plugin.item_registry().clone()),
            None => ParentComponent::new(Rc::default()),
        };
        let id = {
            let doc = init.runtime.document();
            doc.id_of(init.element)
                .map(str::to_string)
                .unwrap_or_else(|| format!("foobar-{}", init.element.index()))
        };
        let observation = Observation::new(&init.runtime, init.element);
        Rc::new_cyclic(|this: &Weak<Bar>| {
            let parent: Weak<dyn Component> = plugin.clone();
            Bar {
                base: ComponentBase::new(this.clone(), &init).with_parent(parent),
                plugin,
                id,
                options,
                classes,
                items,
                observation,
                is_open: Cell::new(false),
                active: Cell::new(None),
                last_height: Cell::new(0.0),
                last_width: Cell::new(0.0),
                rules: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
            }
        })
    }

    /// Element id, the key of the remembered state
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn element(&self) -> NodeId {
        self.base.element()
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        self.base.runtime()
    }

    pub fn plugin(&self) -> Option<Rc<Plugin>> {
        self.plugin.upgrade()
    }

    pub fn options(&self) -> &BarOptions {
        &self.options
    }

    pub fn layout(&self) -> Layout {
        self.options.layout
    }

    pub fn is_open(&self) -> bool {
        self.is_open.get()
    }

    pub fn items(&self) -> Vec<Rc<Item>> {
        self.items.children()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Index of the active item
    pub fn active_index(&self) -> Option<usize> {
        self.active.get()
    }

    pub fn active_item(&self) -> Option<Rc<Item>> {
        self.active.get().and_then(|i| self.items.get(i))
    }

    pub fn rules(&self) -> Vec<Rc<ToggleRule>> {
        self.rules.borrow().clone()
    }

    pub fn last_height(&self) -> f32 {
        self.last_height.get()
    }

    pub fn last_width(&self) -> f32 {
        self.last_width.get()
    }

    fn alive(&self) -> Result<()> {
        if self.base.is_tearing_down() {
            return Err(Error::Destroyed { name: self.id.clone() });
        }
        Ok(())
    }

    fn remembers(&self) -> bool {
        self.options.remember && !self.options.preview
    }

    fn stored_action(&self) -> Option<BarAction> {
        if !self.remembers() {
            return None;
        }
        let plugin = self.plugin()?;
        plugin.stored_state(&self.id, self.options.state_lifetime_ms())?.action
    }

    /// Persist `action` with the active index. Restoring the state that is
    /// already stored keeps its `modified` time.
    fn remember(&self, action: Option<BarAction>) {
        if !self.remembers() {
            return;
        }
        let Some(plugin) = self.plugin() else { return };
        let active = self.active.get().unwrap_or(0);
        let stored = plugin.stored_state(&self.id, self.options.state_lifetime_ms());
        if stored.is_some_and(|s| s.action == action && s.active == active) {
            return;
        }
        plugin.store_state(&self.id, action, active);
    }

    // ------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------

    /// Open (`Some(true)`), close (`Some(false)`) or flip the bar. Resolves
    /// to false without touching anything when already in that state.
    pub async fn toggle(self: &Rc<Self>, state: Option<bool>, immediate: bool) -> Result<bool> {
        let target = state.unwrap_or(!self.is_open.get());
        if target == self.is_open.get() {
            return Ok(false);
        }
        self.alive()?;
        let immediate = immediate || self.options.disable_effects;
        let rt = self.runtime().clone();
        let el = self.element();

        self.observation.unobserve();
        self.is_open.set(target);
        if !target {
            if let Some(item) = self.active_item() {
                item.clear_timeout();
            }
        }

        let (open, closed) = (self.classes.open.clone(), self.classes.closed.clone());
        let flip = move |doc: &mut Document| {
            doc.toggle_class(el, &open, Some(target));
            doc.toggle_class(el, &closed, Some(!target));
        };
        let plugin = self.plugin();
        let outcome = if immediate {
            rt.transitions().cancel(el);
            rt.transitions().disable(el, flip);
            if let Some(plugin) = &plugin {
                plugin.layout(true);
            }
            Ok(TransitionEnd::Skipped)
        } else {
            let pending = rt.transitions().start(el, None, self.options.transition_timeout, flip);
            if let Some(plugin) = &plugin {
                plugin.layout(false);
            }
            pending.await
        };
        outcome?;
        self.alive()?;
        if self.is_open.get() != target {
            return Err(Error::TransitionCancelled);
        }

        if self.base.is_initialized() {
            self.observation.observe(true);
        }
        self.remember(Some(if target { BarAction::Open } else { BarAction::Closed }));
        if target {
            if let Some(item) = self.active_item() {
                item.start_timeout();
            }
        }
        tracing::debug!("bar `{}` {}", self.id, if target { "opened" } else { "closed" });
        self.base.emit("toggle", &[json!(target)]);
        self.base.emit(if target { "opened" } else { "closed" }, &[]);
        Ok(true)
    }

    pub async fn open(self: &Rc<Self>, immediate: bool) -> Result<bool> {
        self.toggle(Some(true), immediate).await
    }

    pub async fn close(self: &Rc<Self>, immediate: bool) -> Result<bool> {
        self.toggle(Some(false), immediate).await
    }

    /// Close for good: remembered as dismissed, destroyed and removed from
    /// the page.
    pub async fn dismiss(self: &Rc<Self>, immediate: bool) -> Result<()> {
        if self.base.is_tearing_down() {
            return Ok(());
        }
        let immediate = immediate || self.options.dismiss_immediate;
        match self.toggle(Some(false), immediate).await {
            Ok(_) | Err(Error::TransitionCancelled) => {}
            Err(Error::Destroyed { .. }) => return Ok(()),
            Err(e) => return Err(e),
        }
        if self.base.is_tearing_down() {
            return Ok(());
        }
        self.remember(Some(BarAction::Dismissed));
        self.base.emit("dismissed", &[]);

        let plugin = self.plugin();
        destroy(&**self);
        self.runtime().document_mut().remove(self.element());
        tracing::info!("bar `{}` dismissed", self.id);
        if let Some(plugin) = plugin {
            plugin.layout(immediate);
        }
        Ok(())
    }

    /// Run the timeout action of the active item
    pub(crate) async fn timeout_elapsed(self: &Rc<Self>, action: TimeoutAction) -> Result<()> {
        match action {
            TimeoutAction::Next => self.next().map(|_| ()),
            TimeoutAction::Prev => self.prev().map(|_| ()),
            TimeoutAction::Close => self.toggle(Some(false), false).await.map(|_| ()),
            TimeoutAction::Dismiss => self.dismiss(false).await,
        }
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    pub fn prev(self: &Rc<Self>) -> Result<bool> {
        let len = self.items.len();
        if len == 0 {
            return Err(Error::EmptyBar { id: self.id.clone() });
        }
        let current = self.active.get().unwrap_or(0);
        self.set_active((current + len - 1) % len, Some(Direction::Prev))
    }

    pub fn next(self: &Rc<Self>) -> Result<bool> {
        let len = self.items.len();
        if len == 0 {
            return Err(Error::EmptyBar { id: self.id.clone() });
        }
        let current = self.active.get().unwrap_or(0);
        self.set_active((current + 1) % len, Some(Direction::Next))
    }

    /// Activate the item at `index`, wrapping around
    pub fn goto(self: &Rc<Self>, index: usize) -> Result<bool> {
        let len = self.items.len();
        if len == 0 {
            return Err(Error::EmptyBar { id: self.id.clone() });
        }
        let index = index % len;
        let direction = match self.active.get() {
            Some(current) if index < current => Direction::Prev,
            _ => Direction::Next,
        };
        self.set_active(index, Some(direction))
    }

    pub fn goto_item(self: &Rc<Self>, item: &Rc<Item>) -> Result<bool> {
        match self.items.index_of(item) {
            Some(index) => self.goto(index),
            None => Ok(false),
        }
    }

    /// Make the item at `index` the only active one and fit the content
    /// area to it
    pub fn set_active(self: &Rc<Self>, index: usize, direction: Option<Direction>) -> Result<bool> {
        self.alive()?;
        let items = self.items.children();
        if items.is_empty() {
            return Err(Error::EmptyBar { id: self.id.clone() });
        }
        let index = index.min(items.len() - 1);
        if self.active.get() == Some(index) && items[index].is_active() {
            return Ok(false);
        }
        for (i, item) in items.iter().enumerate() {
            if i != index {
                item.deactivate();
            }
        }

        let el = self.element();
        {
            let mut doc = self.runtime().document_mut();
            doc.remove_class(el, &format!("{} {}", self.classes.prev, self.classes.next));
            if let Some(direction) = direction {
                let class = match direction {
                    Direction::Prev => &self.classes.prev,
                    Direction::Next => &self.classes.next,
                };
                doc.add_class(el, class);
            }
        }

        let item = &items[index];
        // the first activation only restores what was loaded
        let changed = self.active.get().is_some();
        item.activate();
        let height = item.measure();
        let content = self.content_area();
        if let Some(content) = content {
            self.runtime().document_mut().set_style(content, "height", &format!("{height}px"));
        }
        self.active.set(Some(index));
        if changed {
            self.remember(self.stored_action());
        }

        if self.is_open.get() {
            item.start_timeout();
        }
        if let Some(plugin) = self.plugin() {
            plugin.schedule_layout();
        }
        let direction = direction.map_or("none", Direction::as_str);
        self.base.emit("item-change", &[json!(index), json!(direction)]);
        Ok(true)
    }

    fn content_area(&self) -> Option<NodeId> {
        let selector = format!(".{}", self.classes.content);
        self.runtime().document().query_selector(self.element(), &selector).ok().flatten()
    }

    /// Parent element of the item markup
    fn items_root(&self) -> NodeId {
        let selector = format!(".{}", self.classes.items);
        self.runtime()
            .document()
            .query_selector(self.element(), &selector)
            .ok()
            .flatten()
            .unwrap_or_else(|| self.element())
    }

    /// Swap the item markup for `nodes` and rebuild the items, keeping the
    /// active index where possible
    pub async fn replace_items(self: &Rc<Self>, nodes: Vec<NodeId>) -> Result<()> {
        self.alive()?;
        let previous = self.active.get().unwrap_or(0);
        self.items.destroy_children();
        self.active.set(None);

        let root = self.items_root();
        {
            let mut doc = self.runtime().document_mut();
            for child in doc.children(root).to_vec() {
                doc.remove(child);
            }
            for node in nodes {
                doc.append_child(root, node);
            }
        }

        self.create_items().await?;
        let last = self.items.len().saturating_sub(1);
        self.set_active(previous.min(last), None)?;
        self.base.emit("items-replaced", &[json!(self.items.len())]);
        Ok(())
    }

    async fn create_items(self: &Rc<Self>) -> Result<()> {
        let ctx = CreateContext::new(Rc::downgrade(self)).allow_base();
        let root = self.items_root();
        let rt = self.runtime().clone();
        let created = self.items.create_children(&rt, root, &ctx).await;
        self.alive()?;
        if created.is_empty() {
            return Err(Error::EmptyBar { id: self.id.clone() });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Size and state for the stacking pass
    pub fn metrics(&self) -> BarMetrics {
        let layout = self.options.layout;
        let (height, width) = {
            let doc = self.runtime().document();
            (doc.offset_height(self.element()), doc.offset_width(self.element()))
        };
        self.last_height.set(height);
        self.last_width.set(width);
        let size = match layout.family() {
            Some(family) if !family.is_vertical() => width,
            _ => height,
        };
        BarMetrics { layout, open: self.is_open.get(), size, push: self.options.push }
    }

    /// Apply the place computed by the stacking pass
    pub fn position(&self, position: BarPosition) {
        let Some(family) = self.options.layout.family() else { return };
        let el = self.element();
        let mut doc = self.runtime().document_mut();
        let viewport = doc.window().height;
        let offset = position.offset + self.options.offset;
        let px = |value: f32| format!("{}px", value.max(0.0));

        match family {
            Family::Top | Family::Bottom => {
                let (edge, opposite) = if family == Family::Top {
                    ("top", position.bottom)
                } else {
                    ("bottom", position.top)
                };
                doc.set_style(el, edge, &px(offset));
                doc.set_style(el, "max-height", &px(viewport - offset - opposite));
            }
            Family::Left | Family::Right => {
                doc.set_style(el, family.edge(), &px(offset));
                doc.set_style(el, "top", &px(position.top));
                doc.set_style(el, "bottom", &px(position.bottom));
                doc.set_style(el, "max-height", &px(viewport - position.top - position.bottom));
            }
        }
        doc.set_style(el, TOGGLE_OFFSET_PROPERTY, &px(position.max_offset));
    }

    // ------------------------------------------------------------------
    // Rules and buttons
    // ------------------------------------------------------------------

    fn build_rules(self: &Rc<Self>, stored: Option<BarAction>) -> Vec<Rc<ToggleRule>> {
        let Some(plugin) = self.plugin() else { return Vec::new() };
        let registry = plugin.rule_registry();
        let mut open = parse_rule_list(registry, &self.options.open);
        let close = parse_rule_list(registry, &self.options.close);
        reconcile(registry, &mut open, stored);

        let open = open.into_iter().map(|(kind, cfg)| ToggleRule::new(self, RuleAction::Open, kind, cfg));
        let close = close.into_iter().map(|(kind, cfg)| ToggleRule::new(self, RuleAction::Close, kind, cfg));
        open.chain(close).collect()
    }

    /// Run the rules that must settle before the bar becomes visible
    async fn before_initialized(self: &Rc<Self>) -> Result<()> {
        for rule in self.rules().into_iter().filter(|r| !r.allow_transition()) {
            rule.run().await?;
        }
        Ok(())
    }

    /// Arm the remaining rules once the bar is rendered
    fn after_initialized(self: &Rc<Self>) {
        let rules: Vec<Rc<ToggleRule>> = self.rules().into_iter().filter(|r| r.allow_transition()).collect();
        if rules.is_empty() {
            return;
        }
        let bar = Rc::downgrade(self);
        self.runtime().spawn(async move {
            for rule in rules {
                if bar.upgrade().is_none_or(|b| b.base.is_tearing_down()) {
                    return;
                }
                if let Err(e) = rule.run().await {
                    tracing::debug!("toggle rule `{}` failed: {e}", rule.name());
                }
            }
        });
    }

    fn bind_buttons(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let id = self.runtime().add_listener(
            EventTarget::Node(self.element()),
            DomEventType::Click,
            Rc::new(move |event: &DomEvent| {
                let (Some(bar), Some(target)) = (weak.upgrade(), event.target_node()) else { return };
                bar.button_clicked(target);
            }),
        );
        self.listeners.borrow_mut().push(id);
    }

    fn button_clicked(self: &Rc<Self>, target: NodeId) {
        let button = {
            let doc = self.runtime().document();
            [TOGGLE_BUTTON, DISMISS_BUTTON, PREV_BUTTON, NEXT_BUTTON]
                .into_iter()
                .find(|selector| doc.closest(target, selector).is_some_and(|b| doc.contains(self.element(), b)))
        };
        let Some(button) = button else { return };
        let bar = self.clone();
        match button {
            PREV_BUTTON | NEXT_BUTTON => {
                let moved = if button == PREV_BUTTON { bar.prev() } else { bar.next() };
                if let Err(e) = moved {
                    tracing::debug!("item navigation failed: {e}");
                }
            }
            DISMISS_BUTTON if self.options.dismiss => self.runtime().spawn(async move {
                if let Err(e) = bar.dismiss(false).await {
                    tracing::debug!("dismiss failed: {e}");
                }
            }),
            DISMISS_BUTTON => self.runtime().spawn(async move {
                if let Err(e) = bar.toggle(Some(false), false).await {
                    tracing::debug!("close failed: {e}");
                }
            }),
            _ => self.runtime().spawn(async move {
                if let Err(e) = bar.toggle(None, false).await {
                    tracing::debug!("toggle failed: {e}");
                }
            }),
        }
    }
}

impl Component for Bar {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn before_setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async move {
            if self.stored_action() == Some(BarAction::Dismissed) && !self.options.preview {
                return Err(Error::Dismissed { id: self.id.clone() });
            }
            Ok(())
        }
        .boxed_local()
    }

    fn setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async move {
            let el = self.element();
            let layout_class = self.options.layout.class_name();
            let closed = self.classes.closed.clone();
            self.runtime().transitions().disable(el, |doc| {
                doc.add_class(el, &layout_class);
                doc.add_class(el, &closed);
            });

            self.create_items().await?;
            let stored = self.plugin().and_then(|p| {
                p.stored_state(&self.id, self.options.state_lifetime_ms())
                    .filter(|_| self.remembers())
            });
            let start = stored.map_or(0, |s| s.active).min(self.items.len() - 1);
            self.set_active(start, None)?;

            let rules = self.build_rules(stored.and_then(|s| s.action));
            *self.rules.borrow_mut() = rules;
            self.bind_buttons();
            self.before_initialized().await
        }
        .boxed_local()
    }

    fn after_setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async move {
            let el = self.element();
            self.runtime().document_mut().add_class(el, &self.classes.initialized);
            let plugin = self.plugin.clone();
            self.observation.on_size_change(move |_, _| {
                if let Some(plugin) = plugin.upgrade() {
                    plugin.schedule_layout();
                }
            });
            let plugin = self.plugin.clone();
            self.observation.on_class_change(move || {
                if let Some(plugin) = plugin.upgrade() {
                    plugin.schedule_layout();
                }
            });
            self.observation.observe(true);
            self.after_initialized();
            Ok(())
        }
        .boxed_local()
    }

    fn teardown(&self) {
        self.observation.unobserve();
        for rule in self.rules.borrow_mut().drain(..) {
            rule.destroy();
        }
        for id in self.listeners.borrow_mut().drain(..) {
            self.runtime().remove_listener(id);
        }
        self.items.destroy_children();
        self.active.set(None);
    }
}
