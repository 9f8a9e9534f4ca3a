//! Event Loop
//!
//! Single-threaded loop over a virtual millisecond clock: one-shot timers,
//! a macrotask queue and a local executor for spawned futures. Time only
//! moves when the embedder advances it, which keeps every pass of the bar
//! runtime deterministic.

use smol::LocalExecutor;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

struct TimerEntry {
    id: TimerId,
    due: u64,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

/// Event loop with microtask-style executor and timer queue
pub struct EventLoop {
    /// Current virtual time (ms)
    current_time: Cell<u64>,
    timers: RefCell<Vec<TimerEntry>>,
    next_timer_id: Cell<u32>,
    next_seq: Cell<u64>,
    macrotasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    executor: LocalExecutor<'static>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            current_time: Cell::new(0),
            timers: RefCell::new(Vec::new()),
            next_timer_id: Cell::new(1),
            next_seq: Cell::new(0),
            macrotasks: RefCell::new(VecDeque::new()),
            executor: LocalExecutor::new(),
        }
    }

    /// Current virtual time in ms
    pub fn now(&self) -> u64 {
        self.current_time.get()
    }

    /// Run `callback` once `delay_ms` have elapsed
    pub fn set_timeout(&self, delay_ms: u64, callback: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.next_timer_id.get());
        self.next_timer_id.set(id.0.wrapping_add(1));
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.timers.borrow_mut().push(TimerEntry {
            id,
            due: self.now() + delay_ms,
            seq,
            callback: Box::new(callback),
        });
        id
    }

    /// Cancel a timer, returns false if it already fired
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        before != timers.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.borrow().iter().any(|t| t.id == id)
    }

    /// Queue a callback to run on the next turn
    pub fn queue_task(&self, task: impl FnOnce() + 'static) {
        self.macrotasks.borrow_mut().push_back(Box::new(task));
    }

    /// Spawn a future on the local executor
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.executor.spawn(future).detach();
    }

    /// Future resolving after `ms` of virtual time
    pub fn sleep(self: &Rc<Self>, ms: u64) -> Sleep {
        let state = Rc::new(SleepState::default());
        let fired = state.clone();
        let id = self.set_timeout(ms, move || {
            fired.done.set(true);
            if let Some(waker) = fired.waker.borrow_mut().take() {
                waker.wake();
            }
        });
        Sleep { event_loop: self.clone(), id, state }
    }

    /// Run spawned futures and queued tasks until nothing is runnable.
    /// Returns true if anything ran.
    pub fn run_until_stalled(&self) -> bool {
        let mut progressed = false;
        loop {
            let mut ran = false;
            while self.executor.try_tick() {
                ran = true;
            }
            let task = self.macrotasks.borrow_mut().pop_front();
            if let Some(task) = task {
                task();
                ran = true;
            }
            if !ran {
                break;
            }
            progressed = true;
        }
        progressed
    }

    /// Deadline of the earliest timer
    pub fn next_due(&self) -> Option<u64> {
        self.timers.borrow().iter().map(|t| t.due).min()
    }

    /// Fire the earliest timer due at or before `until`, moving the clock
    /// to its deadline. Returns false if none is due.
    pub fn fire_next(&self, until: u64) -> bool {
        let entry = {
            let mut timers = self.timers.borrow_mut();
            let next = timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.due <= until)
                .min_by_key(|(_, t)| (t.due, t.seq))
                .map(|(i, _)| i);
            match next {
                Some(i) => timers.remove(i),
                None => return false,
            }
        };
        if entry.due > self.now() {
            self.current_time.set(entry.due);
        }
        (entry.callback)();
        true
    }

    /// Move the clock forward without firing timers
    pub(crate) fn set_time(&self, time: u64) {
        if time > self.now() {
            self.current_time.set(time);
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.macrotasks.borrow().is_empty() || !self.timers.borrow().is_empty()
    }
}

#[derive(Default)]
struct SleepState {
    done: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

/// Timer future returned by `EventLoop::sleep`; dropping it cancels the timer
pub struct Sleep {
    event_loop: Rc<EventLoop>,
    id: TimerId,
    state: Rc<SleepState>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.state.done.get() {
            return Poll::Ready(());
        }
        *self.state.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if !self.state.done.get() {
            self.event_loop.clear_timeout(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_fires_in_deadline_order() {
        let lp = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());
        lp.set_timeout(200, move || a.borrow_mut().push("late"));
        lp.set_timeout(100, move || b.borrow_mut().push("early"));

        assert!(!lp.fire_next(50));
        assert!(lp.fire_next(500));
        assert_eq!(lp.now(), 100);
        assert!(lp.fire_next(500));
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn test_clear_timeout() {
        let lp = EventLoop::new();
        let id = lp.set_timeout(10, || panic!("cleared timer fired"));
        assert!(lp.is_pending(id));
        assert!(lp.clear_timeout(id));
        assert!(!lp.clear_timeout(id));
        assert!(!lp.fire_next(100));
    }

    #[test]
    fn test_spawned_future_waits_for_sleep() {
        let lp = Rc::new(EventLoop::new());
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        let sleep = lp.sleep(30);
        lp.spawn(async move {
            sleep.await;
            flag.set(true);
        });

        lp.run_until_stalled();
        assert!(!done.get());
        assert!(lp.fire_next(30));
        lp.run_until_stalled();
        assert!(done.get());
    }

    #[test]
    fn test_dropped_sleep_clears_timer() {
        let lp = Rc::new(EventLoop::new());
        drop(lp.sleep(30));
        assert_eq!(lp.pending_timers(), 0);
    }

    #[test]
    fn test_macrotasks_run_in_order() {
        let lp = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            lp.queue_task(move || log.borrow_mut().push(i));
        }
        assert!(lp.run_until_stalled());
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!lp.run_until_stalled());
    }
}
