//! Ticking timer
//!
//! Counts down from (or up to) a number of ticks, one tick per interval.
//! Progress is reported through its event bus: `start`, `tick`, `complete`,
//! `pause`, `resume`, `stop` and `reset`, each with the current count as
//! the only argument.

use crate::event::{EventBus, Listener};
use crate::event_loop::TimerId;
use crate::runtime::Runtime;
use serde_json::json;
use std::cell::Cell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, Default)]
struct TimerState {
    duration: u64,
    current: u64,
    countdown: bool,
    running: bool,
    paused: bool,
}

struct TimerInner {
    rt: Weak<Runtime>,
    interval_ms: u64,
    events: EventBus,
    state: Cell<TimerState>,
    handle: Cell<Option<TimerId>>,
}

/// Interval timer
pub struct Timer {
    inner: Rc<TimerInner>,
}

impl Timer {
    /// Timer ticking once a second
    pub fn new(rt: &Rc<Runtime>) -> Self {
        Self::with_interval(rt, 1000)
    }

    pub fn with_interval(rt: &Rc<Runtime>, interval_ms: u64) -> Self {
        Self {
            inner: Rc::new(TimerInner {
                rt: Rc::downgrade(rt),
                interval_ms: interval_ms.max(1),
                events: EventBus::new(),
                state: Cell::new(TimerState::default()),
                handle: Cell::new(None),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn on(&self, types: &str, listener: Listener) -> bool {
        self.inner.events.on(types, listener)
    }

    pub fn current(&self) -> u64 {
        self.inner.state.get().current
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.get().running
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.get().paused
    }

    /// Start counting `duration` ticks. A count-up timer with a zero
    /// duration runs until stopped.
    pub fn start(&self, duration: u64, countdown: bool) {
        self.inner.clear();
        let current = if countdown { duration } else { 0 };
        self.inner.state.set(TimerState { duration, current, countdown, running: true, paused: false });
        self.inner.emit("start");
        if countdown && duration == 0 {
            self.inner.complete();
            return;
        }
        TimerInner::schedule(&self.inner);
    }

    pub fn pause(&self) -> bool {
        let mut state = self.inner.state.get();
        if !state.running || state.paused {
            return false;
        }
        self.inner.clear();
        state.paused = true;
        self.inner.state.set(state);
        self.inner.emit("pause");
        true
    }

    pub fn resume(&self) -> bool {
        let mut state = self.inner.state.get();
        if !state.running || !state.paused {
            return false;
        }
        state.paused = false;
        self.inner.state.set(state);
        self.inner.emit("resume");
        TimerInner::schedule(&self.inner);
        true
    }

    pub fn stop(&self) {
        self.inner.clear();
        let mut state = self.inner.state.get();
        state.running = false;
        state.paused = false;
        self.inner.state.set(state);
        self.inner.emit("stop");
    }

    /// Stop and rewind to the start value
    pub fn reset(&self) {
        self.inner.clear();
        let mut state = self.inner.state.get();
        state.current = if state.countdown { state.duration } else { 0 };
        state.running = false;
        state.paused = false;
        self.inner.state.set(state);
        self.inner.emit("reset");
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.inner.clear();
    }
}

impl TimerInner {
    fn emit(&self, event_type: &str) {
        self.events.trigger(event_type, &[json!(self.state.get().current)]);
    }

    fn clear(&self) {
        if let (Some(id), Some(rt)) = (self.handle.take(), self.rt.upgrade()) {
            rt.clear_timeout(id);
        }
    }

    fn schedule(this: &Rc<Self>) {
        let Some(rt) = this.rt.upgrade() else { return };
        let weak = Rc::downgrade(this);
        let id = rt.set_timeout(this.interval_ms, move || {
            if let Some(inner) = weak.upgrade() {
                inner.handle.set(None);
                TimerInner::tick(&inner);
            }
        });
        this.handle.set(Some(id));
    }

    fn tick(this: &Rc<Self>) {
        let mut state = this.state.get();
        if !state.running || state.paused {
            return;
        }
        state.current = if state.countdown {
            state.current.saturating_sub(1)
        } else {
            state.current + 1
        };
        this.state.set(state);
        this.emit("tick");

        let done = if state.countdown {
            state.current == 0
        } else {
            state.duration > 0 && state.current >= state.duration
        };
        if done {
            this.complete();
        } else if this.state.get().running && this.handle.get().is_none() {
            TimerInner::schedule(this);
        }
    }

    fn complete(&self) {
        let mut state = self.state.get();
        state.running = false;
        self.state.set(state);
        self.emit("complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use foobar_dom::Document;
    use serde_json::Value;
    use std::cell::RefCell;

    fn record(timer: &Timer) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        timer.events().on_any(Rc::new(move |event: &Event, args: &[Value]| {
            sink.borrow_mut().push(format!("{}:{}", event.event_type, args[0]));
        }));
        log
    }

    #[test]
    fn test_countdown_completes() {
        let rt = Runtime::new(Document::new());
        let timer = Timer::new(&rt);
        let log = record(&timer);
        timer.start(3, true);
        rt.advance(5000);
        assert_eq!(*log.borrow(), vec!["start:3", "tick:2", "tick:1", "tick:0", "complete:0"]);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_pause_and_resume() {
        let rt = Runtime::new(Document::new());
        let timer = Timer::with_interval(&rt, 100);
        timer.start(0, false);
        rt.advance(250);
        assert!(timer.pause());
        rt.advance(1000);
        assert_eq!(timer.current(), 2);
        assert!(timer.resume());
        rt.advance(100);
        assert_eq!(timer.current(), 3);
        timer.stop();
        rt.advance(1000);
        assert_eq!(timer.current(), 3);
    }

    #[test]
    fn test_reset_rewinds() {
        let rt = Runtime::new(Document::new());
        let timer = Timer::new(&rt);
        timer.start(10, true);
        rt.advance(3000);
        assert_eq!(timer.current(), 7);
        timer.reset();
        assert_eq!(timer.current(), 10);
        assert!(!timer.is_running());
    }
}
