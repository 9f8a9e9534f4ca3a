//! Runtime
//!
//! The explicit page context every component receives: the document, the
//! event loop, DOM listeners, observers, in-flight transitions and local
//! storage. The embedder drives it with `advance`, `block_on` and the host
//! actions (`scroll_to`, `click`, ...), each of which runs the page until
//! it settles.

use crate::event_loop::{EventLoop, Sleep, TimerId};
use crate::transition::TransitionTable;
use foobar_dom::{
    Document, DomEvent, DomEventType, EventListeners, EventTarget, IntersectionObserver,
    IntersectionObserverEntry, IntersectionObserverOptions, ListenerId, MutationObserver,
    MutationObserverInit, MutationRecord, NodeId, ResizeObserver, ResizeObserverEntry, Storage,
};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

/// DOM event listener
pub type DomListener = Rc<dyn Fn(&DomEvent)>;

type ResizeCallback = Rc<dyn Fn(&[ResizeObserverEntry])>;
type MutationCallback = Rc<dyn Fn(&[MutationRecord])>;
type IntersectionCallback = Rc<dyn Fn(&[IntersectionObserverEntry])>;

/// Handle of a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Upper bound on settle iterations per turn; guards against layout feedback
const MAX_SETTLE_ROUNDS: usize = 64;

#[derive(Default)]
struct Observers {
    next_id: u64,
    resize: Vec<(ObserverId, ResizeObserver, ResizeCallback)>,
    mutation: Vec<(ObserverId, MutationObserver, MutationCallback)>,
    intersection: Vec<(ObserverId, IntersectionObserver, IntersectionCallback)>,
}

impl Observers {
    fn next_id(&mut self) -> ObserverId {
        self.next_id += 1;
        ObserverId(self.next_id)
    }
}

/// Page runtime
pub struct Runtime {
    this: Weak<Runtime>,
    document: RefCell<Document>,
    event_loop: Rc<EventLoop>,
    listeners: RefCell<EventListeners<DomListener>>,
    observers: RefCell<Observers>,
    storage: RefCell<Storage>,
    pub(crate) transition_table: TransitionTable,
    /// Generation per node so a restarted transition only ends once
    transition_generations: RefCell<HashMap<NodeId, u64>>,
    settling: Cell<bool>,
    /// Wall clock time in ms at virtual time zero
    epoch_ms: Cell<u64>,
}

impl Runtime {
    /// Runtime over `document` with in-memory storage
    pub fn new(document: Document) -> Rc<Self> {
        Self::with_storage(document, Storage::memory())
    }

    pub fn with_storage(document: Document, storage: Storage) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            document: RefCell::new(document),
            event_loop: Rc::new(EventLoop::new()),
            listeners: RefCell::new(EventListeners::new()),
            observers: RefCell::new(Observers::default()),
            storage: RefCell::new(storage),
            transition_table: TransitionTable::default(),
            transition_generations: RefCell::new(HashMap::new()),
            settling: Cell::new(false),
            epoch_ms: Cell::new(system_epoch_ms()),
        })
    }

    pub(crate) fn weak(&self) -> Weak<Runtime> {
        self.this.clone()
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.document.borrow_mut()
    }

    pub fn storage(&self) -> Ref<'_, Storage> {
        self.storage.borrow()
    }

    pub fn storage_mut(&self) -> RefMut<'_, Storage> {
        self.storage.borrow_mut()
    }

    /// Give the storage back, e.g. to hand it to the next page load
    pub fn replace_storage(&self, storage: Storage) -> Storage {
        self.storage.replace(storage)
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Current virtual time in ms
    pub fn now(&self) -> u64 {
        self.event_loop.now()
    }

    /// Wall clock time in ms since the unix epoch
    pub fn epoch_now(&self) -> u64 {
        self.epoch_ms.get() + self.now()
    }

    /// Pin the wall clock, e.g. to replay a later page load
    pub fn set_epoch(&self, epoch_ms: u64) {
        self.epoch_ms.set(epoch_ms.saturating_sub(self.now()));
    }

    pub fn set_timeout(&self, delay_ms: u64, callback: impl FnOnce() + 'static) -> TimerId {
        self.event_loop.set_timeout(delay_ms, callback)
    }

    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.event_loop.clear_timeout(id)
    }

    /// Run `callback` at the start of the next 16ms frame
    pub fn request_frame(&self, callback: impl FnOnce() + 'static) -> TimerId {
        let now = self.now();
        let next_frame = (now / 16 + 1) * 16;
        self.event_loop.set_timeout(next_frame - now, callback)
    }

    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.event_loop.spawn(future);
    }

    pub fn sleep(&self, ms: u64) -> Sleep {
        self.event_loop.sleep(ms)
    }

    /// Run everything runnable without moving the clock
    pub fn run_until_idle(&self) {
        if self.settling.replace(true) {
            return;
        }
        for _ in 0..MAX_SETTLE_ROUNDS {
            let ran = self.event_loop.run_until_stalled();
            let delivered = self.flush_document();
            if !ran && !delivered {
                self.settling.set(false);
                return;
            }
        }
        tracing::warn!("page did not settle after {MAX_SETTLE_ROUNDS} rounds");
        self.settling.set(false);
    }

    /// Move the virtual clock forward, firing due timers in order
    pub fn advance(&self, ms: u64) {
        let target = self.now() + ms;
        self.run_until_idle();
        while self.event_loop.fire_next(target) {
            self.run_until_idle();
        }
        self.event_loop.set_time(target);
        self.run_until_idle();
    }

    /// Drive `future` to completion, advancing virtual time through pending
    /// timers as needed. Returns None if it stalls with no timers left.
    pub fn block_on<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Option<T> {
        let output = Rc::new(RefCell::new(None));
        let slot = output.clone();
        self.spawn(async move {
            *slot.borrow_mut() = Some(future.await);
        });
        loop {
            self.run_until_idle();
            if let Some(value) = output.borrow_mut().take() {
                return Some(value);
            }
            let due = self.event_loop.next_due()?;
            let now = self.now();
            self.advance(due.saturating_sub(now));
        }
    }

    // ------------------------------------------------------------------
    // DOM events
    // ------------------------------------------------------------------

    pub fn add_listener(&self, target: EventTarget, event_type: DomEventType, listener: DomListener) -> ListenerId {
        self.listeners.borrow_mut().add(target, event_type, listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(id)
    }

    /// Dispatch an event along its propagation path
    pub fn dispatch(&self, event: &DomEvent) {
        let path = event.propagation_path(&self.document.borrow());
        for target in path {
            let listeners = self.listeners.borrow().listeners_for(target, event.event_type);
            for listener in listeners {
                listener(event);
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
    }

    /// Scroll the window and fire `scroll`
    pub fn scroll_to(&self, x: f32, y: f32) {
        {
            let mut doc = self.document.borrow_mut();
            let window = doc.window_mut();
            window.scroll_x = x.max(0.0);
            window.scroll_y = y.max(0.0);
        }
        self.dispatch(&DomEvent::scroll());
        self.run_until_idle();
    }

    /// Resize the viewport and fire `resize`
    pub fn resize_viewport(&self, width: f32, height: f32) {
        {
            let mut doc = self.document.borrow_mut();
            let window = doc.window_mut();
            window.width = width;
            window.height = height;
        }
        self.dispatch(&DomEvent::resize());
        self.run_until_idle();
    }

    pub fn click(&self, node: NodeId) {
        self.dispatch(&DomEvent::click(node));
        self.run_until_idle();
    }

    /// Pointer leaves `node` at the given client position
    pub fn mouse_out(&self, node: NodeId, client_x: f32, client_y: f32, related: Option<NodeId>) {
        self.dispatch(&DomEvent::mouse_out(node, client_x, client_y, related));
        self.run_until_idle();
    }

    /// Fire `beforeunload`
    pub fn unload(&self) {
        self.dispatch(&DomEvent::before_unload());
        self.run_until_idle();
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn observe_resize(&self, node: NodeId, callback: ResizeCallback) -> ObserverId {
        let mut observers = self.observers.borrow_mut();
        let id = observers.next_id();
        let mut observer = ResizeObserver::new();
        observer.observe(node);
        observers.resize.push((id, observer, callback));
        id
    }

    pub fn observe_mutations(&self, node: NodeId, init: MutationObserverInit, callback: MutationCallback) -> ObserverId {
        let mut observers = self.observers.borrow_mut();
        let id = observers.next_id();
        let mut observer = MutationObserver::new();
        observer.observe(node, init);
        observers.mutation.push((id, observer, callback));
        id
    }

    pub fn observe_intersection(
        &self,
        nodes: &[NodeId],
        options: IntersectionObserverOptions,
        callback: IntersectionCallback,
    ) -> ObserverId {
        let mut observers = self.observers.borrow_mut();
        let id = observers.next_id();
        let mut observer = IntersectionObserver::new(options);
        for &node in nodes {
            observer.observe(node);
        }
        observers.intersection.push((id, observer, callback));
        id
    }

    /// Disconnect any kind of observer
    pub fn disconnect(&self, id: ObserverId) {
        let mut observers = self.observers.borrow_mut();
        observers.resize.retain(|(i, _, _)| *i != id);
        observers.mutation.retain(|(i, _, _)| *i != id);
        observers.intersection.retain(|(i, _, _)| *i != id);
    }

    /// Deliver transition runs and observer records. Returns true if any
    /// callback or timer was produced.
    fn flush_document(&self) -> bool {
        let (runs, mutations) = {
            let mut doc = self.document.borrow_mut();
            (doc.take_transitions(), doc.take_mutations())
        };
        let mut delivered = !runs.is_empty();
        for run in runs {
            self.schedule_transition_end(run.node, run.property, run.duration_ms);
        }

        let mut batches: Vec<Box<dyn FnOnce()>> = Vec::new();
        {
            let doc = self.document.borrow();
            let mut observers = self.observers.borrow_mut();
            for (_, observer, callback) in observers.mutation.iter_mut() {
                for record in &mutations {
                    observer.record(&doc, record);
                }
                let records = observer.take_records();
                if !records.is_empty() {
                    let callback = callback.clone();
                    batches.push(Box::new(move || callback(&records)));
                }
            }
            for (_, observer, callback) in observers.resize.iter_mut() {
                let entries = observer.check(&doc);
                if !entries.is_empty() {
                    let callback = callback.clone();
                    batches.push(Box::new(move || callback(&entries)));
                }
            }
            for (_, observer, callback) in observers.intersection.iter_mut() {
                let entries = observer.check(&doc);
                if !entries.is_empty() {
                    let callback = callback.clone();
                    batches.push(Box::new(move || callback(&entries)));
                }
            }
        }

        delivered |= !batches.is_empty();
        for batch in batches {
            batch();
        }
        delivered
    }

    fn schedule_transition_end(&self, node: NodeId, property: String, duration_ms: u64) {
        let generation = {
            let mut generations = self.transition_generations.borrow_mut();
            let generation = generations.entry(node).or_default();
            *generation += 1;
            *generation
        };
        let weak = self.weak();
        self.event_loop.set_timeout(duration_ms, move || {
            let Some(rt) = weak.upgrade() else { return };
            let current = rt.transition_generations.borrow().get(&node).copied();
            if current != Some(generation) || !rt.document().is_connected(node) {
                return;
            }
            rt.dispatch(&DomEvent::transition_end(node, &property));
        });
    }
}

fn system_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use foobar_dom::{Rect, TransitionSpec};

    fn page() -> (Rc<Runtime>, NodeId) {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.append_child(doc.body(), el);
        (Runtime::new(doc), el)
    }

    #[test]
    fn test_click_bubbles_to_ancestors() {
        let (rt, el) = page();
        let body = rt.document().body();
        let hits = Rc::new(RefCell::new(Vec::new()));
        for target in [el, body] {
            let hits = hits.clone();
            rt.add_listener(EventTarget::Node(target), DomEventType::Click, Rc::new(move |_: &DomEvent| {
                hits.borrow_mut().push(target);
            }));
        }
        rt.click(el);
        assert_eq!(*hits.borrow(), vec![el, body]);
    }

    #[test]
    fn test_transition_end_is_delivered() {
        let (rt, el) = page();
        rt.document_mut().set_transition(el, Some(TransitionSpec::all(300)));
        let ended = Rc::new(Cell::new(0));
        let count = ended.clone();
        rt.add_listener(EventTarget::Node(el), DomEventType::TransitionEnd, Rc::new(move |_: &DomEvent| {
            count.set(count.get() + 1);
        }));

        rt.document_mut().add_class(el, "fbr-open");
        rt.advance(100);
        // restart mid-flight, only the second run ends
        rt.document_mut().remove_class(el, "fbr-open");
        rt.advance(250);
        assert_eq!(ended.get(), 0);
        rt.advance(100);
        assert_eq!(ended.get(), 1);
    }

    #[test]
    fn test_resize_observer_callback() {
        let (rt, el) = page();
        rt.document_mut().set_rect(el, Rect::sized(100.0, 30.0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let id = rt.observe_resize(el, Rc::new(move |entries: &[ResizeObserverEntry]| {
            log.borrow_mut().extend(entries.iter().map(|e| e.height));
        }));
        rt.run_until_idle();
        rt.document_mut().set_style(el, "height", "45px");
        rt.run_until_idle();
        rt.disconnect(id);
        rt.document_mut().set_style(el, "height", "50px");
        rt.run_until_idle();
        assert_eq!(*seen.borrow(), vec![30.0, 45.0]);
    }

    #[test]
    fn test_block_on_advances_time() {
        let (rt, _) = page();
        let sleep = rt.sleep(500);
        let value = rt.block_on(async move {
            sleep.await;
            7
        });
        assert_eq!(value, Some(7));
        assert_eq!(rt.now(), 500);
    }

    #[test]
    fn test_block_on_reports_stall() {
        let (rt, _) = page();
        let value = rt.block_on(futures::future::pending::<()>());
        assert_eq!(value, None);
    }

    #[test]
    fn test_epoch_follows_virtual_clock() {
        let (rt, _) = page();
        rt.set_epoch(1_000_000);
        rt.advance(250);
        assert_eq!(rt.epoch_now(), 1_000_250);
    }

    #[test]
    fn test_request_frame_aligns_to_frames() {
        let (rt, _) = page();
        rt.advance(5);
        let fired = Rc::new(Cell::new(0));
        let at = fired.clone();
        let clock = rt.clone();
        rt.request_frame(move || at.set(clock.now()));
        rt.advance(20);
        assert_eq!(fired.get(), 16);
    }
}
