//! Parent components
//!
//! `ParentComponent` owns the children a registry creates under an element
//! and keeps the list current from the children's own lifecycle events.
//! `Observation` watches an element for size and class changes and reports
//! them through throttled hooks.

use crate::component::{Component, destroy, init};
use crate::event::{Event, Listener};
use crate::registry::{ComponentRegistry, CreateContext};
use crate::runtime::{ObserverId, Runtime};
use crate::throttle::Throttle;
use foobar_dom::{MutationObserverInit, MutationRecord, NodeId, ResizeObserverEntry};
use futures::future::join_all;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Child list fed by a registry
pub struct ParentComponent<C: ?Sized, P> {
    registry: Rc<ComponentRegistry<C, P>>,
    children: Rc<RefCell<Vec<Rc<C>>>>,
}

impl<C: Component + ?Sized, P: Clone + 'static> ParentComponent<C, P> {
    pub fn new(registry: Rc<ComponentRegistry<C, P>>) -> Self {
        Self { registry, children: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn registry(&self) -> &Rc<ComponentRegistry<C, P>> {
        &self.registry
    }

    /// Track `child`: it joins the list when it starts initializing and
    /// leaves it once destroyed.
    pub fn adopt(&self, child: &Rc<C>) {
        let weak_child = Rc::downgrade(child);
        let list = Rc::downgrade(&self.children);
        let joined: Listener = Rc::new({
            let (weak_child, list) = (weak_child.clone(), list.clone());
            move |event: &Event, _: &[Value]| {
                if !emitted_by(event, &weak_child) {
                    return;
                }
                if let (Some(child), Some(list)) = (weak_child.upgrade(), list.upgrade()) {
                    let mut list = list.borrow_mut();
                    if !list.iter().any(|c| Rc::ptr_eq(c, &child)) {
                        list.push(child);
                    }
                }
            }
        });
        let left: Listener = Rc::new(move |event: &Event, _: &[Value]| {
            if !emitted_by(event, &weak_child) {
                return;
            }
            if let Some(list) = list.upgrade() {
                list.borrow_mut()
                    .retain(|c| !std::ptr::addr_eq(Rc::as_ptr(c), weak_child.as_ptr()));
            }
        });
        let events = child.base().events();
        events.on("initializing", joined);
        events.on("destroyed", left);
    }

    /// Create and initialize every child under `root`. Children whose
    /// `init` fails are destroyed; the survivors are returned.
    pub async fn create_children(&self, rt: &Rc<Runtime>, root: NodeId, ctx: &CreateContext<P>) -> Vec<Rc<C>> {
        let created = self.registry.create_all(rt, root, ctx);
        for child in &created {
            self.adopt(child);
        }
        let results = join_all(created.iter().map(init)).await;

        let mut alive = Vec::with_capacity(created.len());
        for (child, result) in created.into_iter().zip(results) {
            match result {
                Ok(()) => alive.push(child),
                Err(e) => {
                    tracing::warn!("dropping child `{}`: {e}", child.base().name());
                    destroy(&*child);
                }
            }
        }
        alive
    }

    pub fn children(&self) -> Vec<Rc<C>> {
        self.children.borrow().clone()
    }

    pub fn get(&self, index: usize) -> Option<Rc<C>> {
        self.children.borrow().get(index).cloned()
    }

    pub fn index_of(&self, child: &Rc<C>) -> Option<usize> {
        self.children.borrow().iter().position(|c| Rc::ptr_eq(c, child))
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    /// Destroy every child, the list ends up empty
    pub fn destroy_children(&self) {
        for child in self.children() {
            destroy(&*child);
        }
        self.children.borrow_mut().clear();
    }
}

/// Whether `event` was emitted by `child` itself rather than bubbled up
/// from one of its descendants
fn emitted_by<C: ?Sized>(event: &Event, child: &Weak<C>) -> bool {
    event
        .target()
        .is_none_or(|target| std::ptr::addr_eq(Rc::as_ptr(target), child.as_ptr()))
}

/// Default throttle of observer hooks
const DEFAULT_THROTTLE_MS: u64 = 100;

type SizeHook = Rc<dyn Fn(f32, f32)>;
type ClassHook = Rc<dyn Fn()>;

#[derive(Default)]
struct ObservationState {
    resize: Cell<Option<ObserverId>>,
    mutation: Cell<Option<ObserverId>>,
    skip_next_size: Cell<bool>,
    last_size: Cell<(f32, f32)>,
    size_throttle: RefCell<Option<Rc<Throttle>>>,
    class_throttle: RefCell<Option<Rc<Throttle>>>,
    on_size: RefCell<Option<SizeHook>>,
    on_class: RefCell<Option<ClassHook>>,
}

/// Size and class-attribute observation of one element
pub struct Observation {
    rt: Weak<Runtime>,
    element: NodeId,
    throttle_ms: u64,
    state: Rc<ObservationState>,
}

impl Observation {
    pub fn new(rt: &Rc<Runtime>, element: NodeId) -> Self {
        Self::with_throttle(rt, element, DEFAULT_THROTTLE_MS)
    }

    pub fn with_throttle(rt: &Rc<Runtime>, element: NodeId, throttle_ms: u64) -> Self {
        Self { rt: Rc::downgrade(rt), element, throttle_ms, state: Rc::new(ObservationState::default()) }
    }

    /// Hook called with the new width and height
    pub fn on_size_change(&self, hook: impl Fn(f32, f32) + 'static) {
        *self.state.on_size.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn on_class_change(&self, hook: impl Fn() + 'static) {
        *self.state.on_class.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn is_observing(&self) -> bool {
        self.state.resize.get().is_some()
    }

    /// Arm both observers. With `ignore_connect` the initial size report
    /// is swallowed. Returns false if already observing.
    pub fn observe(&self, ignore_connect: bool) -> bool {
        let Some(rt) = self.rt.upgrade() else { return false };
        if self.is_observing() {
            return false;
        }

        let weak = Rc::downgrade(&self.state);
        *self.state.size_throttle.borrow_mut() = Some(Rc::new(Throttle::new(&rt, self.throttle_ms, move || {
            let Some(state) = weak.upgrade() else { return };
            let hook = state.on_size.borrow().clone();
            if let Some(hook) = hook {
                let (width, height) = state.last_size.get();
                hook(width, height);
            }
        })));
        let weak = Rc::downgrade(&self.state);
        *self.state.class_throttle.borrow_mut() = Some(Rc::new(Throttle::new(&rt, self.throttle_ms, move || {
            let Some(state) = weak.upgrade() else { return };
            let hook = state.on_class.borrow().clone();
            if let Some(hook) = hook {
                hook();
            }
        })));

        self.state.skip_next_size.set(ignore_connect);
        let weak = Rc::downgrade(&self.state);
        let resize = rt.observe_resize(self.element, Rc::new(move |entries: &[ResizeObserverEntry]| {
            let Some(state) = weak.upgrade() else { return };
            let Some(entry) = entries.last() else { return };
            state.last_size.set((entry.width, entry.height));
            if state.skip_next_size.replace(false) {
                return;
            }
            let throttle = state.size_throttle.borrow().clone();
            if let Some(throttle) = throttle {
                throttle.call();
            }
        }));
        let weak = Rc::downgrade(&self.state);
        let mutation = rt.observe_mutations(self.element, MutationObserverInit::class_attribute(), Rc::new(move |_: &[MutationRecord]| {
            let Some(state) = weak.upgrade() else { return };
            let throttle = state.class_throttle.borrow().clone();
            if let Some(throttle) = throttle {
                throttle.call();
            }
        }));
        self.state.resize.set(Some(resize));
        self.state.mutation.set(Some(mutation));
        true
    }

    /// Disarm both observers and drop pending hook calls
    pub fn unobserve(&self) {
        let rt = self.rt.upgrade();
        for id in [self.state.resize.take(), self.state.mutation.take()].into_iter().flatten() {
            if let Some(rt) = &rt {
                rt.disconnect(id);
            }
        }
        self.state.size_throttle.borrow_mut().take();
        self.state.class_throttle.borrow_mut().take();
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.unobserve();
    }
}
