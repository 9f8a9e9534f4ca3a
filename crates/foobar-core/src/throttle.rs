//! Leading and trailing edge throttle over the runtime clock

use crate::event_loop::TimerId;
use crate::runtime::Runtime;
use std::cell::Cell;
use std::rc::{Rc, Weak};

struct ThrottleState {
    rt: Weak<Runtime>,
    interval_ms: u64,
    callback: Box<dyn Fn()>,
    last_run: Cell<Option<u64>>,
    pending: Cell<Option<TimerId>>,
}

impl ThrottleState {
    fn run(&self, now: u64) {
        self.last_run.set(Some(now));
        (self.callback)();
    }
}

/// Runs its callback at most once per interval: immediately on the first
/// call, then once more at the end of the interval if called again.
pub struct Throttle {
    state: Rc<ThrottleState>,
}

impl Throttle {
    pub fn new(rt: &Rc<Runtime>, interval_ms: u64, callback: impl Fn() + 'static) -> Self {
        Self {
            state: Rc::new(ThrottleState {
                rt: Rc::downgrade(rt),
                interval_ms,
                callback: Box::new(callback),
                last_run: Cell::new(None),
                pending: Cell::new(None),
            }),
        }
    }

    pub fn call(&self) {
        let Some(rt) = self.state.rt.upgrade() else { return };
        if self.state.pending.get().is_some() {
            return;
        }
        let now = rt.now();
        let ready_at = self.state.last_run.get().map_or(now, |last| last + self.state.interval_ms);
        if ready_at <= now {
            self.state.run(now);
            return;
        }
        let weak = Rc::downgrade(&self.state);
        let id = rt.set_timeout(ready_at - now, move || {
            let Some(state) = weak.upgrade() else { return };
            state.pending.set(None);
            if let Some(rt) = state.rt.upgrade() {
                state.run(rt.now());
            }
        });
        self.state.pending.set(Some(id));
    }

    /// Drop a scheduled trailing call
    pub fn cancel(&self) {
        if let (Some(id), Some(rt)) = (self.state.pending.take(), self.state.rt.upgrade()) {
            rt.clear_timeout(id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.get().is_some()
    }
}

impl Drop for Throttle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foobar_dom::Document;

    #[test]
    fn test_leading_and_trailing() {
        let rt = Runtime::new(Document::new());
        let runs = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (log, clock) = (runs.clone(), Rc::downgrade(&rt));
        let throttle = Throttle::new(&rt, 100, move || {
            if let Some(rt) = clock.upgrade() {
                log.borrow_mut().push(rt.now());
            }
        });

        throttle.call();
        rt.advance(10);
        throttle.call();
        throttle.call();
        assert!(throttle.is_pending());
        rt.advance(200);
        throttle.call();
        assert_eq!(*runs.borrow(), vec![0, 100, 210]);
    }

    #[test]
    fn test_cancel_drops_trailing_call() {
        let rt = Runtime::new(Document::new());
        let count = Rc::new(Cell::new(0));
        let hits = count.clone();
        let throttle = Throttle::new(&rt, 100, move || hits.set(hits.get() + 1));
        throttle.call();
        throttle.call();
        throttle.cancel();
        rt.advance(500);
        assert_eq!(count.get(), 1);
    }
}
