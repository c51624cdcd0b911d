//! Normalized input events crossing from device workers to the dispatch loop

use crate::config::DeviceSpec;
use std::path::Path;
use std::sync::Arc;

/// evdev key value for a release
pub const KEY_UP: i32 = 0;
/// evdev key value for a press
pub const KEY_DOWN: i32 = 1;
/// evdev key value for autorepeat
pub const KEY_REPEAT: i32 = 2;

/// Event categories the dispatch loop distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Key,
    RelativeWheel,
    RelativeDial,
    Other,
}

impl EventKind {
    /// Wheel and dial events go through the debounce gate
    pub fn is_motion(self) -> bool {
        matches!(self, EventKind::RelativeWheel | EventKind::RelativeDial)
    }
}

/// An event as decoded by an input source, before it is tagged with its device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }
}

/// An event tagged with the configured device that produced it
#[derive(Debug, Clone)]
pub struct InputEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
    pub device: Arc<DeviceSpec>,
    /// Node the device resolved to when the event was read
    pub node: Arc<Path>,
}

impl InputEvent {
    pub fn from_raw(raw: RawEvent, device: Arc<DeviceSpec>, node: Arc<Path>) -> Self {
        Self {
            kind: raw.kind,
            code: raw.code,
            value: raw.value,
            device,
            node,
        }
    }
}
