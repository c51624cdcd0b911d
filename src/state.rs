//! Dispatch-loop state: held keys and the motion debounce gate
//!
//! Both live inside the dispatch loop and are never shared with device
//! workers, so neither needs any locking.

use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Default minimum interval between two accepted wheel/dial events
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Set of keycodes currently held down
#[derive(Debug, Default)]
pub struct HeldKeys {
    keys: HashSet<u16>,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a keycode as held
    pub fn press(&mut self, code: u16) {
        self.keys.insert(code);
    }

    /// Clear a keycode
    pub fn release(&mut self, code: u16) {
        self.keys.remove(&code);
    }

    pub fn is_held(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    /// Current held set, as seen by the rule matcher
    pub fn snapshot(&self) -> &HashSet<u16> {
        &self.keys
    }
}

/// Single process-wide gate for wheel and dial events.
///
/// Shared across every device and both axes: a wheel tick on one device
/// suppresses a dial tick on another within the same window.
#[derive(Debug)]
pub struct DebounceGate {
    threshold: Duration,
    last_accepted: Option<Instant>,
}

impl DebounceGate {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_accepted: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Admit an event at `now`, advancing the stored timestamp only on success
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.threshold => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mut held = HeldKeys::new();
        held.press(30);
        held.press(56);
        assert!(held.is_held(30));
        assert!(held.is_held(56));

        held.release(30);
        assert!(!held.is_held(30));
        assert_eq!(held.snapshot().len(), 1);
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let mut held = HeldKeys::new();
        held.release(42);
        assert!(held.snapshot().is_empty());
    }

    #[test]
    fn test_first_event_is_admitted() {
        let mut gate = DebounceGate::new(DEFAULT_DEBOUNCE);
        assert!(gate.admit(Instant::now()));
    }

    #[test]
    fn test_events_inside_window_are_dropped() {
        let mut gate = DebounceGate::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 + Duration::from_millis(50)));
        // A rejected event must not extend the window
        assert!(!gate.admit(t0 + Duration::from_millis(199)));
        assert!(gate.admit(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_events_outside_window_are_admitted() {
        let mut gate = DebounceGate::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(gate.admit(t0 + Duration::from_millis(250)));
        assert!(!gate.admit(t0 + Duration::from_millis(300)));
    }

    #[test]
    fn test_zero_threshold_admits_everything() {
        let mut gate = DebounceGate::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(gate.admit(t0));
    }
}
