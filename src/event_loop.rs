//! The dispatch loop
//!
//! Single consumer of the intake channel. It owns the held-key set and the
//! debounce gate, so every state transition happens here, one event at a
//! time, while device workers only ever send events.

use crate::actions::ActionDispatcher;
use crate::event::{EventKind, InputEvent, KEY_DOWN, KEY_REPEAT, KEY_UP};
use crate::focus::FocusSource;
use crate::rules::RuleSet;
use crate::state::{DebounceGate, HeldKeys};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

pub struct EventLoop {
    rules: RuleSet,
    dispatcher: ActionDispatcher,
    focus: Box<dyn FocusSource>,
    held: HeldKeys,
    debounce: DebounceGate,
    /// Last focused class seen, only for logging focus changes
    last_focus: Option<String>,
}

impl EventLoop {
    pub fn new(
        rules: RuleSet,
        dispatcher: ActionDispatcher,
        focus: Box<dyn FocusSource>,
        debounce: Duration,
    ) -> Self {
        Self {
            rules,
            dispatcher,
            focus,
            held: HeldKeys::new(),
            debounce: DebounceGate::new(debounce),
            last_focus: None,
        }
    }

    /// Drain the intake until `shutdown` resolves or every sender is gone.
    ///
    /// An event already being handled is finished before shutdown is seen.
    pub async fn run<F>(mut self, mut intake: Receiver<InputEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Dispatch loop started ({} rule(s), debounce {:?})",
            self.rules.len(),
            self.debounce.threshold()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = intake.recv() => match event {
                    Some(event) => {
                        self.handle_event(event, Instant::now());
                    }
                    None => {
                        warn!("All device workers stopped");
                        break;
                    }
                },
            }
        }
    }

    /// Handle one event; returns the index of the rule that fired, if any
    pub fn handle_event(&mut self, event: InputEvent, now: Instant) -> Option<usize> {
        match event.kind {
            EventKind::Key => self.handle_key(&event),
            kind if kind.is_motion() => {
                if !self.debounce.admit(now) {
                    debug!("Discarding {:?} event below threshold", event.kind);
                    return None;
                }
                self.match_and_dispatch(&event)
            }
            _ => None,
        }
    }

    fn handle_key(&mut self, event: &InputEvent) -> Option<usize> {
        match event.value {
            KEY_DOWN | KEY_REPEAT => {
                self.held.press(event.code);
                None
            }
            KEY_UP => {
                if !self.held.is_held(event.code) {
                    debug!("Key {} released without a press seen", event.code);
                }
                // The released key stays held while its own rule is matched,
                // so a chord can fire on the release of its last key
                self.held.press(event.code);
                let fired = self.match_and_dispatch(event);
                self.held.release(event.code);
                fired
            }
            other => {
                debug!("Ignoring key {} with value {}", event.code, other);
                None
            }
        }
    }

    fn match_and_dispatch(&mut self, event: &InputEvent) -> Option<usize> {
        let focused = self.focused_class();
        let rule = self.rules.find(event, self.held.snapshot(), &focused)?;

        debug!(
            rule = rule.index,
            device = event.device.label(),
            "{:?} code={} value={} matched",
            event.kind,
            event.code,
            event.value
        );
        self.dispatcher.dispatch(&rule.action);
        Some(rule.index)
    }

    /// Query the focused application now; failures count as no application
    fn focused_class(&mut self) -> String {
        let app = match self.focus.focused_app() {
            Ok(app) => app,
            Err(e) => {
                debug!("Failed to query focused window: {e:#}");
                return String::new();
            }
        };

        if self.last_focus.as_deref() != Some(app.class.as_str()) {
            debug!("Active window changed to {} ({})", app.class, app.title);
            self.last_focus = Some(app.class.clone());
        }
        app.class
    }
}
