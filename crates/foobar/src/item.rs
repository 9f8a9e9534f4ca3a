//! Items
//!
//! One message of a bar. Exactly one item of a bar is active; the active
//! item may auto advance after its `timeout` while the bar is open.

use crate::bar::Bar;
use crate::options::{Classes, ItemOptions};
use foobar_core::{Component, ComponentBase, ComponentInit, Event, Result, Timer, TimerId};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Extra behaviour plugged into an item by its registry entry
pub trait ItemExtension {
    fn setup(&self, _item: &Rc<Item>) -> Result<()> {
        Ok(())
    }

    fn activated(&self, _item: &Item) {}

    fn deactivated(&self, _item: &Item) {}

    fn teardown(&self, _item: &Item) {}
}

/// A bar item
pub struct Item {
    base: ComponentBase,
    bar: Weak<Bar>,
    options: ItemOptions,
    classes: Classes,
    is_active: Cell<bool>,
    last_content_height: Cell<f32>,
    timeout: Cell<Option<TimerId>>,
    extension: Option<Box<dyn ItemExtension>>,
}

impl Item {
    pub fn new(init: ComponentInit<Weak<Bar>>, extension: Option<Box<dyn ItemExtension>>) -> Rc<Self> {
        let options: ItemOptions = init.config.options_as();
        let classes: Classes = init.config.classes_as();
        let bar = init.parent.clone();
        Rc::new_cyclic(|this: &Weak<Item>| {
            let parent: Weak<dyn Component> = bar.clone();
            Item {
                base: ComponentBase::new(this.clone(), &init).with_parent(parent),
                bar,
                options,
                classes,
                is_active: Cell::new(false),
                last_content_height: Cell::new(0.0),
                timeout: Cell::new(None),
                extension,
            }
        })
    }

    pub fn bar(&self) -> Option<Rc<Bar>> {
        self.bar.upgrade()
    }

    pub fn options(&self) -> &ItemOptions {
        &self.options
    }

    pub fn is_active(&self) -> bool {
        self.is_active.get()
    }

    pub fn capabilities(&self) -> &[String] {
        &self.options.capabilities
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.options.capabilities.iter().any(|c| c == name)
    }

    /// Height measured at the last activation
    pub fn last_content_height(&self) -> f32 {
        self.last_content_height.get()
    }

    /// Measure the rendered height of the item
    pub fn measure(&self) -> f32 {
        let height = self.base.runtime().document().offset_height(self.base.element());
        self.last_content_height.set(height);
        height
    }

    pub(crate) fn activate(&self) {
        if self.is_active.replace(true) {
            return;
        }
        let el = self.base.element();
        self.base.runtime().document_mut().add_class(el, &self.classes.item_active);
        if let Some(extension) = &self.extension {
            extension.activated(self);
        }
        self.base.emit("activated", &[]);
    }

    pub(crate) fn deactivate(&self) {
        self.clear_timeout();
        if !self.is_active.replace(false) {
            return;
        }
        let el = self.base.element();
        self.base.runtime().document_mut().remove_class(el, &self.classes.item_active);
        if let Some(extension) = &self.extension {
            extension.deactivated(self);
        }
        self.base.emit("deactivated", &[]);
    }

    /// (Re)start the auto advance timeout
    pub(crate) fn start_timeout(&self) {
        self.clear_timeout();
        if self.options.timeout == 0 || !self.is_active() {
            return;
        }
        let action = self.options.timeout_action;
        let bar = self.bar.clone();
        let rt = self.base.runtime().clone();
        let id = self.base.runtime().set_timeout(self.options.timeout, move || {
            let Some(bar) = bar.upgrade() else { return };
            rt.spawn(async move {
                if let Err(e) = bar.timeout_elapsed(action).await {
                    tracing::debug!("item timeout action {action:?} failed: {e}");
                }
            });
        });
        self.timeout.set(Some(id));
    }

    pub(crate) fn clear_timeout(&self) {
        if let Some(id) = self.timeout.take() {
            self.base.runtime().clear_timeout(id);
        }
    }

    pub fn has_timeout(&self) -> bool {
        self.timeout.get().is_some_and(|id| self.base.runtime().event_loop().is_pending(id))
    }
}

impl Component for Item {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async move {
            if let Some(extension) = &self.extension {
                extension.setup(&self)?;
            }
            Ok(())
        }
        .boxed_local()
    }

    fn teardown(&self) {
        self.clear_timeout();
        if let Some(extension) = &self.extension {
            extension.teardown(self);
        }
        let el = self.base.element();
        self.base.runtime().document_mut().remove_class(el, &self.classes.item_active);
        self.is_active.set(false);
    }
}

/// Countdown display driven by a `Timer`. Runs while its item is active.
pub struct Countdown {
    timer: Timer,
    duration: u64,
    countdown: bool,
    display: Cell<Option<foobar_dom::NodeId>>,
}

/// Element the current count is written to
const COUNTDOWN_VALUE: &str = ".fbr-countdown-value";

impl Countdown {
    pub fn new(init: &ComponentInit<Weak<Bar>>) -> Self {
        let options: ItemOptions = init.config.options_as();
        Self {
            timer: Timer::new(&init.runtime),
            duration: options.duration,
            countdown: options.countdown,
            display: Cell::new(None),
        }
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }
}

impl ItemExtension for Countdown {
    fn setup(&self, item: &Rc<Item>) -> Result<()> {
        let rt = item.base().runtime();
        let display = rt.document().query_selector(item.base().element(), COUNTDOWN_VALUE).ok().flatten();
        self.display.set(display);

        let weak_rt = Rc::downgrade(rt);
        let weak_item = Rc::downgrade(item);
        self.timer.on("start tick reset", Rc::new(move |_: &Event, args: &[Value]| {
            let (Some(rt), Some(node)) = (weak_rt.upgrade(), display) else { return };
            let count = args.first().and_then(Value::as_u64).unwrap_or(0);
            rt.document_mut().set_text_content(node, &count.to_string());
        }));
        self.timer.on("complete", Rc::new(move |_: &Event, _: &[Value]| {
            if let Some(item) = weak_item.upgrade() {
                item.base().emit("countdown-complete", &[]);
            }
        }));
        Ok(())
    }

    fn activated(&self, _item: &Item) {
        if !self.timer.resume() && !self.timer.is_running() {
            self.timer.start(self.duration, self.countdown);
        }
    }

    fn deactivated(&self, _item: &Item) {
        self.timer.pause();
    }

    fn teardown(&self, _item: &Item) {
        self.timer.stop();
    }
}
