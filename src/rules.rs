//! Rule matching
//!
//! Rules are evaluated in declaration order and the first rule whose every
//! filter passes wins. Unset filters are wildcards.

use crate::actions::Action;
use crate::config::DeviceSpec;
use crate::event::{EventKind, InputEvent};
use std::collections::HashSet;
use std::path::Path;

/// Marker that turns an application filter into "anything but this one"
pub const NEGATION_PREFIX: char = '!';

/// Filter on the focused application's class name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AppFilter {
    #[default]
    Any,
    Only(String),
    Except(String),
}

impl AppFilter {
    pub fn parse(spec: &str) -> Self {
        if spec.is_empty() {
            AppFilter::Any
        } else if let Some(name) = spec.strip_prefix(NEGATION_PREFIX) {
            AppFilter::Except(name.to_string())
        } else {
            AppFilter::Only(spec.to_string())
        }
    }

    pub fn matches(&self, focused_app: &str) -> bool {
        match self {
            AppFilter::Any => true,
            AppFilter::Only(name) => name == focused_app,
            AppFilter::Except(name) => name != focused_app,
        }
    }
}

/// Filter on the device an event came from.
///
/// The name is compared with the configured device name, the path with the
/// node the device resolved to. Each set field must match; empty fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub name: Option<String>,
    pub path: Option<String>,
}

impl DeviceFilter {
    pub fn from_spec(spec: &DeviceSpec) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: non_empty(&spec.name),
            path: non_empty(&spec.path),
        }
    }

    pub fn matches(&self, device: &DeviceSpec, node: &Path) -> bool {
        let name_ok = self.name.as_deref().is_none_or(|n| n == device.name);
        let path_ok = self.path.as_deref().is_none_or(|p| Path::new(p) == node);
        name_ok && path_ok
    }
}

/// A validated rule, ready for matching
#[derive(Debug, Clone, Default)]
pub struct Rule {
    /// Position in the configuration, for logging
    pub index: usize,
    pub device: DeviceFilter,
    pub application: AppFilter,
    /// Chord: every code must be held
    pub keycodes: Vec<u16>,
    /// Exact horizontal wheel delta, 0 = any
    pub hwheel: i32,
    /// Exact dial delta, 0 = any
    pub dial: i32,
    pub action: Action,
}

impl Rule {
    /// Check every filter of this rule against an event
    pub fn matches(&self, event: &InputEvent, held: &HashSet<u16>, focused_app: &str) -> bool {
        self.device.matches(&event.device, &event.node)
            && self.application.matches(focused_app)
            && self.keycodes.iter().all(|code| held.contains(code))
            && self.matches_motion(event.kind, event.value)
    }

    /// Wheel/dial filters, including the cross-axis exclusion
    fn matches_motion(&self, kind: EventKind, value: i32) -> bool {
        match kind {
            EventKind::Key => self.hwheel == 0 && self.dial == 0,
            EventKind::RelativeWheel => self.dial == 0 && (self.hwheel == 0 || self.hwheel == value),
            EventKind::RelativeDial => self.hwheel == 0 && (self.dial == 0 || self.dial == value),
            EventKind::Other => false,
        }
    }
}

/// Ordered rule list
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule that qualifies for the event, in declaration order
    pub fn find(&self, event: &InputEvent, held: &HashSet<u16>, focused_app: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(event, held, focused_app))
    }
}
