//! FooBar
//!
//! Notification bars for a page: a [`Plugin`] finds every `.foobar` element,
//! turns each into a [`Bar`] of [`Item`]s, opens and closes bars through
//! their toggle rules and stacks the open ones along the viewport edges.
//!
//! ```ignore
//! let rt = Runtime::new(document);
//! let plugin = Plugin::new(&rt, "foobar", json!({}));
//! rt.block_on(foobar_core::init(&plugin));
//! ```

mod bar;
mod item;
mod layout;
pub mod logging;
mod options;
mod plugin;
mod rules;
mod state;

pub use bar::{Bar, Direction, TOGGLE_OFFSET_PROPERTY};
pub use item::{Countdown, Item, ItemExtension};
pub use layout::{BREAKPOINTS, BarMetrics, BarPosition, Offsets, Stacking, breakpoint, stack};
pub use options::{BarOptions, Classes, Family, ItemOptions, Layout, TimeoutAction, UnknownLayout};
pub use plugin::{
    ADMIN_BAR_ID, BAR_SELECTOR, BarRegistry, COUNTDOWN_SELECTOR, ITEM_SELECTOR, ItemRegistry, Plugin,
};
pub use rules::{Comparison, RuleAction, RuleConfig, RuleKind, RuleRegistry, ToggleRule, default_rules, parse_rule_list, reconcile};
pub use state::{BarAction, StateStore, StoredState};
