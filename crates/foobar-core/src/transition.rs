//! CSS transition synchronisation
//!
//! Turns "change some classes and wait for the animation" into a future.
//! A transition resolves when the matching `transitionend` fires on the
//! exact element, when the safety timeout elapses, or immediately when the
//! change started no transition at all. Starting a new transition on the
//! same element cancels the previous one.

use crate::error::{Error, Result};
use crate::event_loop::TimerId;
use crate::runtime::Runtime;
use foobar_dom::{Document, DomEvent, DomEventType, EventTarget, ListenerId, NodeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Safety timeout applied when the caller gives none
pub const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 3000;

/// How a transition finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEnd {
    /// `transitionend` fired
    Ended,
    /// The safety timeout elapsed first
    TimedOut,
    /// The change did not start a transition
    Skipped,
}

#[derive(Default)]
struct TransitionState {
    outcome: RefCell<Option<Result<TransitionEnd>>>,
    waker: RefCell<Option<Waker>>,
    listener: Cell<Option<ListenerId>>,
    timer: Cell<Option<TimerId>>,
}

struct InFlight {
    token: u64,
    state: Rc<TransitionState>,
}

/// In-flight transitions by element
#[derive(Default)]
pub(crate) struct TransitionTable {
    running: RefCell<HashMap<NodeId, InFlight>>,
    next_token: Cell<u64>,
}

/// Future of a started transition
pub struct TransitionFuture {
    state: Rc<TransitionState>,
}

impl Future for TransitionFuture {
    type Output = Result<TransitionEnd>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.state.outcome.borrow().clone() {
            return Poll::Ready(outcome);
        }
        *self.state.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Transition operations of a runtime
pub struct Transitions<'a> {
    rt: &'a Runtime,
}

impl Runtime {
    pub fn transitions(&self) -> Transitions<'_> {
        Transitions { rt: self }
    }
}

impl Transitions<'_> {
    /// Run `trigger` against the document and wait for the resulting
    /// transition on `node`, optionally for a single `property`.
    pub fn start(
        &self,
        node: NodeId,
        property: Option<&str>,
        timeout_ms: Option<u64>,
        trigger: impl FnOnce(&mut Document),
    ) -> TransitionFuture {
        self.cancel(node);

        let table = &self.rt.transition_table;
        let token = table.next_token.get() + 1;
        table.next_token.set(token);
        let state = Rc::new(TransitionState::default());
        table
            .running
            .borrow_mut()
            .insert(node, InFlight { token, state: state.clone() });

        let wanted = property.map(str::to_string);
        let weak = self.rt.weak();
        let listener = self.rt.add_listener(
            EventTarget::Node(node),
            DomEventType::TransitionEnd,
            Rc::new(move |event: &DomEvent| {
                if event.target_node() != Some(node) {
                    return;
                }
                let name = event.property_name.as_deref().unwrap_or("all");
                if !property_matches(wanted.as_deref(), name) {
                    return;
                }
                if let Some(rt) = weak.upgrade() {
                    rt.transitions().finish(node, token, Ok(TransitionEnd::Ended));
                }
            }),
        );
        state.listener.set(Some(listener));

        let weak = self.rt.weak();
        let timeout = timeout_ms.unwrap_or(DEFAULT_TRANSITION_TIMEOUT_MS);
        let timer = self.rt.set_timeout(timeout, move || {
            if let Some(rt) = weak.upgrade() {
                tracing::debug!("transition on {node} timed out after {timeout}ms");
                rt.transitions().finish(node, token, Ok(TransitionEnd::TimedOut));
            }
        });
        state.timer.set(Some(timer));

        let started = {
            let mut doc = self.rt.document_mut();
            trigger(&mut *doc);
            doc.queued_transitions()
                .iter()
                .any(|run| run.node == node && property_matches(property, &run.property))
        };
        if !started {
            self.finish(node, token, Ok(TransitionEnd::Skipped));
        }

        TransitionFuture { state }
    }

    /// Cancel the in-flight transition on `node`, its future resolves to
    /// `Error::TransitionCancelled`. Returns false if none was running.
    pub fn cancel(&self, node: NodeId) -> bool {
        let token = self.rt.transition_table.running.borrow().get(&node).map(|f| f.token);
        match token {
            Some(token) => {
                self.finish(node, token, Err(Error::TransitionCancelled));
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, node: NodeId) -> bool {
        self.rt.transition_table.running.borrow().contains_key(&node)
    }

    /// Apply `f` with transitions suppressed on `node`, force a reflow, then
    /// restore them.
    pub fn disable<R>(&self, node: NodeId, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut doc = self.rt.document_mut();
        doc.suppress_transitions(node, true);
        let result = f(&mut *doc);
        doc.reflow(node);
        doc.suppress_transitions(node, false);
        result
    }

    fn finish(&self, node: NodeId, token: u64, outcome: Result<TransitionEnd>) {
        let state = {
            let mut running = self.rt.transition_table.running.borrow_mut();
            match running.get(&node) {
                Some(flight) if flight.token == token => running.remove(&node).map(|f| f.state),
                _ => None,
            }
        };
        let Some(state) = state else { return };
        if let Some(listener) = state.listener.take() {
            self.rt.remove_listener(listener);
        }
        if let Some(timer) = state.timer.take() {
            self.rt.clear_timeout(timer);
        }
        *state.outcome.borrow_mut() = Some(outcome);
        if let Some(waker) = state.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

fn property_matches(wanted: Option<&str>, actual: &str) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == "all" || actual == wanted,
    }
}
