//! Plugin
//!
//! Root component of a page. Owns the bar, item and toggle rule registries,
//! every bar on the page, the remembered state and the stacking of bars
//! along the viewport edges.

use crate::bar::Bar;
use crate::item::{Countdown, Item};
use crate::layout::{BarMetrics, Offsets, breakpoint, stack};
use crate::options::{Classes, Family};
use crate::rules::{RuleRegistry, default_rules};
use crate::state::{BarAction, StateStore, StoredState};
use foobar_core::{
    Component, ComponentBase, ComponentConfig, ComponentInit, ComponentRegistry, CreateContext, Event, Listener,
    ParentComponent, Result, Runtime, TimerId, destroy, init,
};
use foobar_dom::{Document, DomEvent, DomEventType, EventTarget, ListenerId, NodeId};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Registry of bar constructors
pub type BarRegistry = ComponentRegistry<Bar, Weak<Plugin>>;

/// Registry of item constructors
pub type ItemRegistry = ComponentRegistry<Item, Weak<Bar>>;

/// Id of the WordPress admin toolbar
pub const ADMIN_BAR_ID: &str = "wpadminbar";

/// Width above which the admin toolbar is fixed to the top of the viewport
const ADMIN_BAR_FIXED_WIDTH: f32 = 600.0;

pub const BAR_SELECTOR: &str = ".foobar";
pub const ITEM_SELECTOR: &str = ".fbr-item";
pub const COUNTDOWN_SELECTOR: &str = ".fbr-item.fbr-countdown";

/// The bars of one page
pub struct Plugin {
    base: ComponentBase,
    this: Weak<Plugin>,
    bar_registry: Rc<BarRegistry>,
    item_registry: Rc<ItemRegistry>,
    rule_registry: RuleRegistry,
    bars: ParentComponent<Bar, Weak<Plugin>>,
    classes: Classes,
    stored: RefCell<StateStore>,
    offsets: Cell<Offsets>,
    push: Cell<Offsets>,
    breakpoint: Cell<usize>,
    offset_root: Cell<NodeId>,
    toolbar_offset: Cell<f32>,
    admin: Cell<bool>,
    layout_frame: Cell<Option<TimerId>>,
    listeners: RefCell<Vec<ListenerId>>,
}

impl Plugin {
    /// Plugin named `name` on the body of the runtime's document. The name
    /// doubles as the storage key of the remembered state.
    pub fn new(rt: &Rc<Runtime>, name: &str, config: Value) -> Rc<Self> {
        let (body, root, width) = {
            let doc = rt.document();
            (doc.body(), doc.document_element(), doc.window().width)
        };
        let config = ComponentConfig::from(config);
        let classes: Classes = config.classes_as();
        let stored = StateStore::load(&rt.storage(), name);
        let init = ComponentInit { name: name.to_string(), element: body, config, parent: (), runtime: rt.clone() };

        let bar_registry = Rc::new(BarRegistry::new());
        bar_registry.register("bar", Rc::new(Bar::new), Some(BAR_SELECTOR), json!({}), -1);

        let item_registry = Rc::new(ItemRegistry::new());
        item_registry.register(
            "item",
            Rc::new(|init: ComponentInit<Weak<Bar>>| Item::new(init, None)),
            Some(ITEM_SELECTOR),
            json!({}),
            -1,
        );
        item_registry.extend(
            "countdown",
            "item",
            Rc::new(|init: ComponentInit<Weak<Bar>>| {
                let countdown = Countdown::new(&init);
                Item::new(init, Some(Box::new(countdown)))
            }),
            Some(COUNTDOWN_SELECTOR),
            json!({ "options": { "duration": 60, "countdown": true } }),
            0,
        );

        let bars = ParentComponent::new(bar_registry.clone());
        Rc::new_cyclic(|this: &Weak<Plugin>| Plugin {
            base: ComponentBase::new(this.clone(), &init),
            this: this.clone(),
            bar_registry,
            item_registry,
            rule_registry: default_rules(),
            bars,
            classes,
            stored: RefCell::new(stored),
            offsets: Cell::new(Offsets::default()),
            push: Cell::new(Offsets::default()),
            breakpoint: Cell::new(breakpoint(width)),
            offset_root: Cell::new(root),
            toolbar_offset: Cell::new(0.0),
            admin: Cell::new(false),
            layout_frame: Cell::new(None),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        self.base.runtime()
    }

    pub fn bar_registry(&self) -> &Rc<BarRegistry> {
        &self.bar_registry
    }

    pub fn item_registry(&self) -> &Rc<ItemRegistry> {
        &self.item_registry
    }

    pub fn rule_registry(&self) -> &RuleRegistry {
        &self.rule_registry
    }

    /// Edge distances after the last stacking pass
    pub fn offsets(&self) -> Offsets {
        self.offsets.get()
    }

    /// Page content push applied by the last stacking pass
    pub fn push(&self) -> Offsets {
        self.push.get()
    }

    pub fn offset_root(&self) -> NodeId {
        self.offset_root.get()
    }

    pub fn toolbar_offset(&self) -> f32 {
        self.toolbar_offset.get()
    }

    // ------------------------------------------------------------------
    // Bars
    // ------------------------------------------------------------------

    /// Bar bound to the element with id `id`
    pub fn get(&self, id: &str) -> Option<Rc<Bar>> {
        self.bars.children().into_iter().find(|bar| bar.id() == id)
    }

    pub fn get_all(&self) -> Vec<Rc<Bar>> {
        self.bars.children()
    }

    /// Create and initialize the bar on the element with id `id`. None if
    /// there is no such bar element, it already has a bar or its
    /// initialization failed.
    pub async fn create(self: &Rc<Self>, id: &str) -> Option<Rc<Bar>> {
        if self.get(id).is_some() {
            return None;
        }
        let element = self.runtime().document().get_element_by_id(id)?;
        let bar = self.create_on(element).await;
        if bar.is_some() {
            self.layout(true);
        }
        bar
    }

    /// Create every bar on the page that does not exist yet
    pub async fn create_all(self: &Rc<Self>) -> Vec<Rc<Bar>> {
        let (rt, body) = (self.runtime().clone(), self.base.element());
        let existing: Vec<NodeId> = self.bars.children().iter().map(|b| b.element()).collect();
        let nodes: Vec<NodeId> = self
            .bar_registry
            .scan(&rt, body)
            .into_iter()
            .filter(|node| !existing.contains(node))
            .collect();
        let created: Vec<Rc<Bar>> = join_all(nodes.into_iter().map(|node| self.create_on(node)))
            .await
            .into_iter()
            .flatten()
            .collect();
        if !created.is_empty() {
            self.layout(true);
        }
        created
    }

    async fn create_on(self: &Rc<Self>, element: NodeId) -> Option<Rc<Bar>> {
        let rt = self.runtime().clone();
        let ctx = CreateContext::new(Rc::downgrade(self)).allow_base();
        let bar = self.bar_registry.create_for(&rt, element, &ctx)?;
        self.bars.adopt(&bar);
        match init(&bar).await {
            Ok(()) => Some(bar),
            Err(e) => {
                tracing::info!("bar on {element} not created: {e}");
                destroy(&*bar);
                None
            }
        }
    }

    pub fn destroy_all(&self) {
        self.bars.destroy_children();
        self.layout(true);
    }

    pub async fn dismiss_all(self: &Rc<Self>, immediate: bool) -> Result<()> {
        let bars = self.bars.children();
        let results = join_all(bars.iter().map(|bar| bar.dismiss(immediate))).await;
        results.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Registries and remembered state
    // ------------------------------------------------------------------

    /// Replace the registered default config of bar or item type `name`.
    /// False if neither registry knows it.
    pub fn configure(&self, name: &str, config: Value) -> bool {
        let bar = self.bar_registry.configure(name, config.clone());
        let item = self.item_registry.configure(name, config);
        bar || item
    }

    /// Remembered state of bar `id` unless it expired
    pub fn stored_state(&self, id: &str, lifetime_ms: Option<u64>) -> Option<StoredState> {
        let now = self.runtime().epoch_now();
        self.stored.borrow_mut().get(id, lifetime_ms, now)
    }

    /// Remember the state of bar `id` and write it through
    pub fn store_state(&self, id: &str, action: Option<BarAction>, active: usize) {
        let modified = self.runtime().epoch_now();
        self.stored.borrow_mut().set(id, StoredState { action, active, modified });
        self.save_state();
    }

    /// Drop the remembered state of bar `id`, or of every bar
    pub fn forget(&self, id: Option<&str>) {
        match id {
            Some(id) => {
                self.stored.borrow_mut().remove(id);
            }
            None => self.stored.borrow_mut().clear(),
        }
        self.save_state();
    }

    fn save_state(&self) {
        let result = self.stored.borrow().save(&mut self.runtime().storage_mut());
        if let Err(e) = result {
            tracing::warn!("could not save bar state: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Listen to plugin events, bar and item events bubble up to here
    pub fn on(&self, types: &str, listener: Listener) -> bool {
        self.base.on(types, listener)
    }

    pub fn off(&self, types: &str, listener: Option<&Listener>) -> usize {
        self.base.off(types, listener)
    }

    pub fn trigger(&self, types: &str, args: &[Value]) -> Vec<Event> {
        self.base.emit(types, args)
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Stack every bar and push the page content. `immediate` applies the
    /// push without its transition.
    pub fn layout(&self, immediate: bool) {
        if let Some(frame) = self.layout_frame.take() {
            self.runtime().clear_timeout(frame);
        }
        let bars: Vec<Rc<Bar>> = self.bars.children().into_iter().filter(|b| !b.base().is_tearing_down()).collect();
        let metrics: Vec<BarMetrics> = bars.iter().map(|bar| bar.metrics()).collect();
        let base = Offsets { top: self.toolbar_offset.get(), ..Offsets::default() };
        let stacking = stack(&metrics, base);
        for (bar, position) in bars.iter().zip(stacking.positions) {
            if let Some(position) = position {
                bar.position(position);
            }
        }
        self.offsets.set(stacking.offsets);
        self.apply_push(stacking.push, immediate);
        self.base.emit("layout", &[]);
    }

    /// Request a layout pass on the next frame; requests in between
    /// coalesce.
    pub fn schedule_layout(&self) {
        if self.layout_frame.get().is_some() || self.base.is_tearing_down() {
            return;
        }
        let plugin = self.this.clone();
        let frame = self.runtime().request_frame(move || {
            if let Some(plugin) = plugin.upgrade() {
                plugin.layout_frame.set(None);
                plugin.layout(false);
            }
        });
        self.layout_frame.set(Some(frame));
    }

    pub fn is_layout_pending(&self) -> bool {
        self.layout_frame.get().is_some()
    }

    fn apply_push(&self, push: Offsets, immediate: bool) {
        let root = self.offset_root.get();
        let property = if self.admin.get() { "padding" } else { "margin" };
        let apply = |doc: &mut Document| {
            for family in Family::ORDER {
                let name = format!("{property}-{}", family.edge());
                match push.get(family) {
                    value if value > 0.0 => doc.set_style(root, &name, &format!("{value}px")),
                    _ => doc.remove_style(root, &name),
                }
            }
        };
        if immediate {
            self.runtime().transitions().disable(root, |doc| {
                doc.remove_class(root, &self.classes.push_transition);
                apply(doc);
            });
        } else {
            let mut doc = self.runtime().document_mut();
            doc.add_class(root, &self.classes.push_transition);
            apply(&mut *doc);
        }
        self.push.set(push);
    }

    /// Re-derive the offset root and the toolbar offset from the page
    fn refresh_root(&self) {
        let previous = self.offset_root.get();
        let mut doc = self.runtime().document_mut();
        let toolbar = doc.get_element_by_id(ADMIN_BAR_ID);
        let admin = toolbar.is_some();
        let root = if admin { doc.body() } else { doc.document_element() };
        let toolbar_offset = match toolbar {
            Some(toolbar) if doc.window().width > ADMIN_BAR_FIXED_WIDTH => doc.offset_height(toolbar),
            _ => 0.0,
        };
        if root != previous || admin != self.admin.get() {
            let property = if self.admin.get() { "padding" } else { "margin" };
            for family in Family::ORDER {
                doc.remove_style(previous, &format!("{property}-{}", family.edge()));
            }
            doc.remove_class(previous, &self.classes.push_transition);
        }
        self.admin.set(admin);
        self.offset_root.set(root);
        self.toolbar_offset.set(toolbar_offset);
    }

    fn resized(&self) {
        let width = self.runtime().document().window().width;
        let band = breakpoint(width);
        if self.breakpoint.replace(band) != band {
            tracing::debug!("breakpoint changed to {band}");
            self.refresh_root();
            self.layout(true);
        } else {
            self.schedule_layout();
        }
    }

    fn listen(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let resize = self.runtime().add_listener(
            EventTarget::Window,
            DomEventType::Resize,
            Rc::new(move |_: &DomEvent| {
                if let Some(plugin) = weak.upgrade() {
                    plugin.resized();
                }
            }),
        );
        let weak = Rc::downgrade(self);
        let unload = self.runtime().add_listener(
            EventTarget::Window,
            DomEventType::BeforeUnload,
            Rc::new(move |_: &DomEvent| {
                if let Some(plugin) = weak.upgrade() {
                    plugin.save_state();
                }
            }),
        );
        self.listeners.borrow_mut().extend([resize, unload]);
    }
}

impl Component for Plugin {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async move {
            self.refresh_root();
            self.listen();
            let bars = self.create_all().await;
            tracing::info!("`{}` ready with {} bar(s)", self.name(), bars.len());
            Ok(())
        }
        .boxed_local()
    }

    fn teardown(&self) {
        if let Some(frame) = self.layout_frame.take() {
            self.runtime().clear_timeout(frame);
        }
        for id in self.listeners.borrow_mut().drain(..) {
            self.runtime().remove_listener(id);
        }
        self.bars.destroy_children();
        self.apply_push(Offsets::default(), true);
        self.save_state();
    }
}
