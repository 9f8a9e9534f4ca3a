//! Typed views of bar and item configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Where a bar is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    #[default]
    Top,
    TopInline,
    Bottom,
    Left,
    LeftTop,
    LeftCenter,
    LeftBottom,
    Right,
    RightTop,
    RightCenter,
    RightBottom,
    Inline,
}

/// Stacking family of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Top,
    Bottom,
    Left,
    Right,
}

impl Family {
    /// Pass order of the stacking algorithm
    pub const ORDER: [Family; 4] = [Family::Top, Family::Bottom, Family::Left, Family::Right];

    /// Whether bars of this family are measured by height
    pub fn is_vertical(self) -> bool {
        matches!(self, Family::Top | Family::Bottom)
    }

    pub fn edge(self) -> &'static str {
        match self {
            Family::Top => "top",
            Family::Bottom => "bottom",
            Family::Left => "left",
            Family::Right => "right",
        }
    }
}

impl Layout {
    pub const ALL: [Layout; 12] = [
        Layout::Top,
        Layout::TopInline,
        Layout::Bottom,
        Layout::Left,
        Layout::LeftTop,
        Layout::LeftCenter,
        Layout::LeftBottom,
        Layout::Right,
        Layout::RightTop,
        Layout::RightCenter,
        Layout::RightBottom,
        Layout::Inline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Top => "top",
            Layout::TopInline => "top-inline",
            Layout::Bottom => "bottom",
            Layout::Left => "left",
            Layout::LeftTop => "left-top",
            Layout::LeftCenter => "left-center",
            Layout::LeftBottom => "left-bottom",
            Layout::Right => "right",
            Layout::RightTop => "right-top",
            Layout::RightCenter => "right-center",
            Layout::RightBottom => "right-bottom",
            Layout::Inline => "inline",
        }
    }

    /// Layout class set on the bar element
    pub fn class_name(self) -> String {
        format!("fbr-layout-{}", self.as_str())
    }

    /// None for `inline`, which never takes part in stacking
    pub fn family(self) -> Option<Family> {
        match self {
            Layout::Top | Layout::TopInline => Some(Family::Top),
            Layout::Bottom => Some(Family::Bottom),
            Layout::Left | Layout::LeftTop | Layout::LeftCenter | Layout::LeftBottom => Some(Family::Left),
            Layout::Right | Layout::RightTop | Layout::RightCenter | Layout::RightBottom => Some(Family::Right),
            Layout::Inline => None,
        }
    }

    /// Full-edge layouts that may push the page content
    pub fn can_push(self) -> bool {
        matches!(self, Layout::Top | Layout::TopInline | Layout::Bottom | Layout::Left | Layout::Right)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layout `{0}`")]
pub struct UnknownLayout(pub String);

impl FromStr for Layout {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layout::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownLayout(s.to_string()))
    }
}

/// What happens when an item's timeout elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    #[default]
    Next,
    Prev,
    Close,
    Dismiss,
}

impl TimeoutAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeoutAction::Next => "next",
            TimeoutAction::Prev => "prev",
            TimeoutAction::Close => "close",
            TimeoutAction::Dismiss => "dismiss",
        }
    }
}

/// Bar options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BarOptions {
    pub layout: Layout,
    pub icons: Value,
    /// Extra space kept between the bar and the viewport edge
    pub offset: f32,
    pub push: bool,
    pub remember: bool,
    pub state_duration: u64,
    pub state_duration_modifier: u64,
    pub dismiss: bool,
    pub dismiss_immediate: bool,
    pub disable_effects: bool,
    pub open: Value,
    pub close: Value,
    pub transition_timeout: Option<u64>,
    pub preview: bool,
    pub svg: Value,
}

impl Default for BarOptions {
    fn default() -> Self {
        Self {
            layout: Layout::Top,
            icons: Value::Null,
            offset: 0.0,
            push: false,
            remember: true,
            state_duration: 0,
            state_duration_modifier: 1,
            dismiss: true,
            dismiss_immediate: false,
            disable_effects: false,
            open: Value::Null,
            close: Value::Null,
            transition_timeout: None,
            preview: false,
            svg: Value::Null,
        }
    }
}

impl BarOptions {
    /// How long remembered state stays valid, None = forever
    pub fn state_lifetime_ms(&self) -> Option<u64> {
        let seconds = self.state_duration.saturating_mul(self.state_duration_modifier);
        (seconds > 0).then(|| seconds.saturating_mul(1000))
    }
}

/// Item options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemOptions {
    /// Auto advance after this many ms while the bar is open, 0 = never
    pub timeout: u64,
    pub timeout_action: TimeoutAction,
    pub capabilities: Vec<String>,
    /// Countdown length in timer ticks
    pub duration: u64,
    pub countdown: bool,
}

/// Class names used by bars and items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Classes {
    pub open: String,
    pub closed: String,
    pub initialized: String,
    pub item_active: String,
    pub prev: String,
    pub next: String,
    pub push_transition: String,
    pub items: String,
    pub content: String,
}

impl Default for Classes {
    fn default() -> Self {
        Self {
            open: "fbr-open".into(),
            closed: "fbr-closed".into(),
            initialized: "fbr-initialized".into(),
            item_active: "fbr-item-active".into(),
            prev: "fbr-transition-prev".into(),
            next: "fbr-transition-next".into(),
            push_transition: "fbr-push-transition".into(),
            items: "fbr-items".into(),
            content: "fbr-content".into(),
        }
    }
}
