//! Component lifecycle
//!
//! A component is anything bound to one element of the page: it owns a
//! merged configuration, an event bus and a set of lifecycle flags.
//! Concrete types embed a [`ComponentBase`] and override the phase hooks.
//!
//! `init` is memoized, concurrent callers share one in-flight future.
//! Phases run `before_setup -> setup -> after_setup`; a failing phase resets
//! the flags so a later `init` starts afresh. `destroy` is synchronous,
//! terminal and idempotent.

use crate::config::ComponentConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus, Listener};
use crate::runtime::Runtime;
use foobar_dom::NodeId;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

/// Memoized outcome of `init`
pub type InitFuture = Shared<LocalBoxFuture<'static, Result<()>>>;

/// Lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleFlags {
    pub initializing: bool,
    pub initialized: bool,
    pub destroying: bool,
    pub destroyed: bool,
}

/// Everything a constructor receives
pub struct ComponentInit<P> {
    pub name: String,
    pub element: NodeId,
    pub config: ComponentConfig,
    pub parent: P,
    pub runtime: Rc<Runtime>,
}

/// A page component
pub trait Component: 'static {
    fn base(&self) -> &ComponentBase;

    fn before_setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async { Ok(()) }.boxed_local()
    }

    fn setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async { Ok(()) }.boxed_local()
    }

    fn after_setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async { Ok(()) }.boxed_local()
    }

    fn before_teardown(&self) {}

    fn teardown(&self) {}

    fn after_teardown(&self) {}
}

/// State shared by every component
pub struct ComponentBase {
    this: Weak<dyn Component>,
    parent: Option<Weak<dyn Component>>,
    name: String,
    element: NodeId,
    runtime: Rc<Runtime>,
    config: RefCell<ComponentConfig>,
    events: EventBus,
    bubble_events: Cell<bool>,
    flags: Cell<LifecycleFlags>,
    init_future: RefCell<Option<InitFuture>>,
}

impl ComponentBase {
    /// `this` is the weak self reference handed out by `Rc::new_cyclic`
    pub fn new<P>(this: Weak<dyn Component>, init: &ComponentInit<P>) -> Self {
        Self {
            this,
            parent: None,
            name: init.name.clone(),
            element: init.element,
            runtime: init.runtime.clone(),
            config: RefCell::new(init.config.clone()),
            events: EventBus::new(),
            bubble_events: Cell::new(true),
            flags: Cell::new(LifecycleFlags::default()),
            init_future: RefCell::new(None),
        }
    }

    /// Re-emit events on `parent` while bubbling is enabled
    pub fn with_parent(mut self, parent: Weak<dyn Component>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    pub fn this(&self) -> Option<Rc<dyn Component>> {
        self.this.upgrade()
    }

    pub fn parent(&self) -> Option<Rc<dyn Component>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn config(&self) -> Ref<'_, ComponentConfig> {
        self.config.borrow()
    }

    pub fn config_mut(&self) -> RefMut<'_, ComponentConfig> {
        self.config.borrow_mut()
    }

    pub fn options<T: DeserializeOwned + serde::Serialize + Default>(&self) -> T {
        self.config.borrow().options_as()
    }

    /// Configured class name, or `fallback`
    pub fn class(&self, key: &str, fallback: &str) -> String {
        self.config.borrow().class(key).unwrap_or(fallback).to_string()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn on(&self, types: &str, listener: Listener) -> bool {
        self.events.on(types, listener)
    }

    pub fn off(&self, types: &str, listener: Option<&Listener>) -> usize {
        self.events.off(types, listener, None)
    }

    pub fn set_bubble_events(&self, bubble: bool) {
        self.bubble_events.set(bubble);
    }

    pub fn flags(&self) -> LifecycleFlags {
        self.flags.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.flags.get().initialized
    }

    pub fn is_destroyed(&self) -> bool {
        self.flags.get().destroyed
    }

    /// Destroying or destroyed
    pub fn is_tearing_down(&self) -> bool {
        let flags = self.flags.get();
        flags.destroying || flags.destroyed
    }

    fn update_flags(&self, f: impl FnOnce(&mut LifecycleFlags)) {
        let mut flags = self.flags.get();
        f(&mut flags);
        self.flags.set(flags);
    }

    /// Trigger on this component and bubble to the parent. No-op once
    /// destroyed.
    pub fn emit(&self, types: &str, args: &[Value]) -> Vec<Event> {
        if self.is_destroyed() {
            return Vec::new();
        }
        let target = self.this();
        types
            .split_whitespace()
            .map(|name| {
                let mut event = Event::new(name);
                if let Some(target) = target.clone() {
                    event = event.with_target(target);
                }
                self.propagate(&event, args);
                event
            })
            .collect()
    }

    fn propagate(&self, event: &Event, args: &[Value]) {
        self.events.dispatch(event, args);
        if !self.bubble_events.get() || event.is_propagation_stopped() {
            return;
        }
        if let Some(parent) = self.parent() {
            let base = parent.base();
            if !base.is_destroyed() {
                base.propagate(event, args);
            }
        }
    }
}

/// Initialize `component`; repeated calls share the same future
pub fn init<C: Component + ?Sized>(component: &Rc<C>) -> InitFuture {
    let base = component.base();
    if base.is_destroyed() {
        let name = base.name().to_string();
        return async move { Err(Error::Destroyed { name }) }.boxed_local().shared();
    }
    if let Some(pending) = base.init_future.borrow().clone() {
        return pending;
    }
    let future = run_init(component.clone()).boxed_local().shared();
    *base.init_future.borrow_mut() = Some(future.clone());
    future
}

async fn run_init<C: Component + ?Sized>(component: Rc<C>) -> Result<()> {
    let base = component.base();
    base.update_flags(|f| f.initializing = true);
    base.emit("initializing", &[]);

    let phases = async {
        component.clone().before_setup().await?;
        ensure_alive(base)?;
        component.clone().setup().await?;
        ensure_alive(base)?;
        component.clone().after_setup().await?;
        ensure_alive(base)
    };

    match phases.await {
        Ok(()) => {
            base.update_flags(|f| {
                f.initializing = false;
                f.initialized = true;
            });
            tracing::debug!("{} initialized", base.name());
            base.emit("initialized", &[]);
            Ok(())
        }
        Err(e) => {
            base.update_flags(|f| {
                f.initializing = false;
                f.initialized = false;
            });
            base.init_future.borrow_mut().take();
            tracing::warn!("{} failed to initialize: {e}", base.name());
            base.emit("init-failed", &[json!(e.to_string())]);
            Err(e)
        }
    }
}

fn ensure_alive(base: &ComponentBase) -> Result<()> {
    if base.is_tearing_down() {
        return Err(Error::Destroyed { name: base.name().to_string() });
    }
    Ok(())
}

/// Tear `component` down. Terminal and idempotent.
pub fn destroy<C: Component + ?Sized>(component: &C) {
    let base = component.base();
    if base.is_tearing_down() {
        return;
    }
    base.update_flags(|f| f.destroying = true);
    base.emit("destroying", &[]);

    component.before_teardown();
    component.teardown();
    component.after_teardown();

    base.emit("destroyed", &[]);
    base.update_flags(|f| {
        *f = LifecycleFlags { destroyed: true, ..LifecycleFlags::default() };
    });
    base.init_future.borrow_mut().take();
    base.events.clear();
    tracing::debug!("{} destroyed", base.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use foobar_dom::Document;

    struct Sample {
        base: ComponentBase,
        fail_setup: Cell<bool>,
        setups: Cell<u32>,
        teardowns: Cell<u32>,
    }

    impl Component for Sample {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        fn setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
            async move {
                self.setups.set(self.setups.get() + 1);
                self.base.runtime().sleep(10).await;
                if self.fail_setup.get() {
                    return Err(Error::Setup {
                        name: self.base.name().to_string(),
                        phase: "setup",
                        reason: "boom".into(),
                    });
                }
                Ok(())
            }
            .boxed_local()
        }

        fn teardown(&self) {
            self.teardowns.set(self.teardowns.get() + 1);
        }
    }

    fn sample(rt: &Rc<Runtime>, parent: Option<Weak<dyn Component>>) -> Rc<Sample> {
        let init = ComponentInit {
            name: "sample".to_string(),
            element: rt.document().body(),
            config: ComponentConfig::default(),
            parent: (),
            runtime: rt.clone(),
        };
        Rc::new_cyclic(|this: &Weak<Sample>| {
            let mut base = ComponentBase::new(this.clone(), &init);
            if let Some(parent) = parent {
                base = base.with_parent(parent);
            }
            Sample { base, fail_setup: Cell::new(false), setups: Cell::new(0), teardowns: Cell::new(0) }
        })
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>) -> Listener {
        let log = log.clone();
        Rc::new(move |event: &Event, _: &[Value]| log.borrow_mut().push(event.event_type.clone()))
    }

    #[test]
    fn test_init_is_memoized() {
        let rt = Runtime::new(Document::new());
        let component = sample(&rt, None);
        let first = init(&component);
        let second = init(&component);
        let both = rt.block_on(async move { (first.await, second.await) });
        assert_eq!(both, Some((Ok(()), Ok(()))));
        assert_eq!(component.setups.get(), 1);
        assert!(component.base.is_initialized());
        assert_eq!(rt.block_on(init(&component)), Some(Ok(())));
        assert_eq!(component.setups.get(), 1);
    }

    #[test]
    fn test_failed_init_resets_and_retries() {
        let rt = Runtime::new(Document::new());
        let component = sample(&rt, None);
        let log = Rc::new(RefCell::new(Vec::new()));
        component.base.on("initializing initialized init-failed", recorder(&log));
        component.fail_setup.set(true);

        let result = rt.block_on(init(&component));
        assert!(matches!(result, Some(Err(Error::Setup { .. }))));
        assert_eq!(component.base.flags(), LifecycleFlags::default());

        component.fail_setup.set(false);
        assert_eq!(rt.block_on(init(&component)), Some(Ok(())));
        assert_eq!(component.setups.get(), 2);
        assert_eq!(*log.borrow(), vec!["initializing", "init-failed", "initializing", "initialized"]);
    }

    #[test]
    fn test_destroy_is_terminal() {
        let rt = Runtime::new(Document::new());
        let component = sample(&rt, None);
        let log = Rc::new(RefCell::new(Vec::new()));
        component.base.on("destroying destroyed", recorder(&log));

        destroy(&*component);
        destroy(&*component);
        assert_eq!(component.teardowns.get(), 1);
        assert_eq!(*log.borrow(), vec!["destroying", "destroyed"]);
        assert!(component.base.emit("anything", &[]).is_empty());
        assert!(matches!(rt.block_on(init(&component)), Some(Err(Error::Destroyed { .. }))));
    }

    #[test]
    fn test_destroy_during_init_fails_it() {
        let rt = Runtime::new(Document::new());
        let component = sample(&rt, None);
        let pending = init(&component);
        rt.advance(5);
        destroy(&*component);
        assert!(matches!(rt.block_on(pending), Some(Err(Error::Destroyed { .. }))));
    }

    #[test]
    fn test_emit_bubbles_to_parent() {
        let rt = Runtime::new(Document::new());
        let parent = sample(&rt, None);
        let parent_dyn: Rc<dyn Component> = parent.clone();
        let child = sample(&rt, Some(Rc::downgrade(&parent_dyn)));
        let log = Rc::new(RefCell::new(Vec::new()));
        parent.base.on("toggle", recorder(&log));

        child.base.emit("toggle", &[]);
        child.base.set_bubble_events(false);
        child.base.emit("toggle", &[]);
        assert_eq!(*log.borrow(), vec!["toggle"]);
    }
}
