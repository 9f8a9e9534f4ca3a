//! FooBar core runtime
//!
//! The component framework the notification bars are built on: a
//! single-threaded event loop over a virtual clock, namespaced event buses,
//! constructor registries, the async component lifecycle, parent/child
//! component trees, a ticking timer and CSS-transition synchronisation.

mod component;
mod config;
mod error;
mod event;
mod event_loop;
mod parent;
mod registry;
mod runtime;
mod throttle;
mod timer;
mod transition;

pub use component::{Component, ComponentBase, ComponentInit, InitFuture, LifecycleFlags, destroy, init};
pub use config::{ComponentConfig, data_config, merge};
pub use error::{Error, Result};
pub use event::{Event, EventBus, Listener, ListenerOwner};
pub use event_loop::{EventLoop, Sleep, TimerId};
pub use parent::{Observation, ParentComponent};
pub use registry::{ClassRegistry, ComponentRegistry, Constructor, CreateContext, RegisteredEntry};
pub use runtime::{DomListener, ObserverId, Runtime};
pub use throttle::Throttle;
pub use timer::Timer;
pub use transition::{DEFAULT_TRANSITION_TIMEOUT_MS, TransitionEnd, TransitionFuture, Transitions};
