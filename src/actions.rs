//! Action execution
//!
//! An action may emit a key combo, call a session-bus method and launch a
//! command. All three run in that order; a failing part is logged and the
//! remaining parts still run.

use crate::config::RuleError;
use anyhow::Result;
use std::process::Stdio;
use tracing::{debug, info, warn};
use zbus::names::{BusName, InterfaceName, MemberName};
use zbus::zvariant::ObjectPath;

/// Virtual keyboard used to emit key combos
pub trait KeyEmitter: Send {
    fn key_down(&mut self, code: u16) -> Result<()>;
    fn key_up(&mut self, code: u16) -> Result<()>;
    /// Atomic press and release
    fn key_press(&mut self, code: u16) -> Result<()>;
}

/// Starts a remote method call without waiting for its reply
pub trait MethodCaller: Send {
    fn call(&self, call: &MethodCall) -> Result<()>;
}

/// Launches an external program without waiting for it
pub trait CommandSpawner: Send {
    fn spawn(&self, command: &CommandLine) -> Result<()>;
}

/// A validated session-bus method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub destination: String,
    pub path: String,
    pub interface: Option<String>,
    pub member: String,
    /// Sent as the single string argument when present
    pub argument: Option<String>,
}

impl MethodCall {
    /// Build a call from its configured parts.
    ///
    /// `method` is fully qualified (`interface.Member`); everything before the
    /// last dot is the interface.
    pub fn parse(object: &str, path: &str, method: &str, value: &str) -> Result<Self, RuleError> {
        let invalid = |what: &'static str, reason: String| RuleError::InvalidMethodCall { what, reason };

        BusName::try_from(object).map_err(|e| invalid("object", e.to_string()))?;
        ObjectPath::try_from(path).map_err(|e| invalid("path", e.to_string()))?;

        let (interface, member) = match method.rsplit_once('.') {
            Some((iface, member)) => {
                InterfaceName::try_from(iface).map_err(|e| invalid("interface", e.to_string()))?;
                (Some(iface.to_string()), member)
            }
            None => (None, method),
        };
        MemberName::try_from(member).map_err(|e| invalid("method", e.to_string()))?;

        Ok(Self {
            destination: object.to_string(),
            path: path.to_string(),
            interface,
            member: member.to_string(),
            argument: (!value.is_empty()).then(|| value.to_string()),
        })
    }
}

/// Program plus arguments, split without any shell interpolation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn parse(line: &str) -> Result<Self, RuleError> {
        let mut words = shell_words::split(line)
            .map_err(|e| RuleError::InvalidCommand(format!("{line:?}: {e}")))?
            .into_iter();
        let program = words.next().ok_or(RuleError::EmptyCommand)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

/// What to do when a rule matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Action {
    /// Key combo: all but the last held, last tapped, then released in reverse
    pub keys: Vec<u16>,
    pub call: Option<MethodCall>,
    pub command: Option<CommandLine>,
}

impl Action {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.call.is_none() && self.command.is_none()
    }
}

/// Runs matched actions through the external collaborators
pub struct ActionDispatcher {
    keyboard: Box<dyn KeyEmitter>,
    bus: Box<dyn MethodCaller>,
    spawner: Box<dyn CommandSpawner>,
}

impl ActionDispatcher {
    pub fn new(
        keyboard: Box<dyn KeyEmitter>,
        bus: Box<dyn MethodCaller>,
        spawner: Box<dyn CommandSpawner>,
    ) -> Self {
        Self {
            keyboard,
            bus,
            spawner,
        }
    }

    /// Execute every present part of `action`. Never fails; errors are logged.
    pub fn dispatch(&mut self, action: &Action) {
        debug!("Executing action: {:?}", action);

        if !action.keys.is_empty() {
            if let Err(e) = self.emit_combo(&action.keys) {
                warn!("Key emulation failed for {:?}: {e:#}", action.keys);
            }
        }

        if let Some(call) = &action.call {
            if let Err(e) = self.bus.call(call) {
                warn!(
                    "D-Bus call {}.{} on {} failed: {e:#}",
                    call.interface.as_deref().unwrap_or("-"),
                    call.member,
                    call.destination
                );
            }
        }

        if let Some(command) = &action.command {
            if let Err(e) = self.spawner.spawn(command) {
                warn!("Failed to launch {:?}: {e:#}", command.program);
            }
        }
    }

    /// Hold the modifiers, tap the last key, then release whatever was held.
    ///
    /// Keys that went down are always released again, even when a later
    /// step fails.
    fn emit_combo(&mut self, keys: &[u16]) -> Result<()> {
        let Some((&last, modifiers)) = keys.split_last() else {
            return Ok(());
        };

        let mut held = Vec::with_capacity(modifiers.len());
        let mut result = Ok(());
        for &code in modifiers {
            match self.keyboard.key_down(code) {
                Ok(()) => held.push(code),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        if result.is_ok() {
            result = self.keyboard.key_press(last);
        }

        for &code in held.iter().rev() {
            if let Err(e) = self.keyboard.key_up(code) {
                warn!("Failed to release key {code}: {e:#}");
            }
        }

        result
    }
}

/// Launches commands through tokio and reaps them in the background.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct ProcessSpawner;

impl CommandSpawner for ProcessSpawner {
    fn spawn(&self, command: &CommandLine) -> Result<()> {
        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .spawn()?;

        info!("Launched {:?} (pid {:?})", command.program, child.id());

        let program = command.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("{program:?} exited with {status}"),
                Err(e) => warn!("Failed to wait for {program:?}: {e}"),
            }
        });
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn command(program: &str) -> CommandLine {
        CommandLine {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn test_combo_holds_modifiers_and_releases_in_reverse() {
        let log = Log::default();
        let mut dispatcher = dispatcher(&log);

        dispatcher.dispatch(&Action {
            keys: vec![29, 42, 30],
            ..Default::default()
        });

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                Call::KeyDown(29),
                Call::KeyDown(42),
                Call::KeyPress(30),
                Call::KeyUp(42),
                Call::KeyUp(29),
            ]
        );
    }

    #[test]
    fn test_single_key_is_tapped() {
        let log = Log::default();
        let mut dispatcher = dispatcher(&log);

        dispatcher.dispatch(&Action {
            keys: vec![115],
            ..Default::default()
        });

        assert_eq!(*log.lock().unwrap(), vec![Call::KeyPress(115)]);
    }

    #[test]
    fn test_failed_key_down_still_releases_held_keys() {
        let log = Log::default();
        let mut dispatcher = ActionDispatcher::new(
            Box::new(FakeKeyboard {
                log: log.clone(),
                fail_down: Some(42),
            }),
            Box::new(FakeBus {
                log: log.clone(),
                fail: false,
            }),
            Box::new(FakeSpawner { log: log.clone() }),
        );

        dispatcher.dispatch(&Action {
            keys: vec![29, 42, 30],
            command: Some(command("after")),
            ..Default::default()
        });

        assert_eq!(
            *log.lock().unwrap(),
            vec![Call::KeyDown(29), Call::KeyUp(29), Call::Spawn("after".into())]
        );
    }

    #[test]
    fn test_parts_run_in_fixed_order() {
        let log = Log::default();
        let mut dispatcher = dispatcher(&log);

        dispatcher.dispatch(&Action {
            keys: vec![30],
            call: Some(
                MethodCall::parse(
                    "org.mpris.MediaPlayer2.spotify",
                    "/org/mpris/MediaPlayer2",
                    "org.mpris.MediaPlayer2.Player.PlayPause",
                    "",
                )
                .unwrap(),
            ),
            command: Some(command("notify-send")),
        });

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                Call::KeyPress(30),
                Call::Bus("PlayPause".into()),
                Call::Spawn("notify-send".into()),
            ]
        );
    }

    #[test]
    fn test_bus_failure_does_not_stop_command() {
        let log = Log::default();
        let mut dispatcher = ActionDispatcher::new(
            Box::new(FakeKeyboard {
                log: log.clone(),
                fail_down: None,
            }),
            Box::new(FakeBus {
                log: log.clone(),
                fail: true,
            }),
            Box::new(FakeSpawner { log: log.clone() }),
        );

        dispatcher.dispatch(&Action {
            call: Some(MethodCall::parse("org.example.App", "/", "Ping", "").unwrap()),
            command: Some(command("volume-up")),
            ..Default::default()
        });

        assert_eq!(*log.lock().unwrap(), vec![Call::Spawn("volume-up".into())]);
    }

    #[test]
    fn test_method_call_splits_interface() {
        let call = MethodCall::parse(
            "org.kde.kglobalaccel",
            "/component/kwin",
            "org.kde.kglobalaccel.Component.invokeShortcut",
            "Expose",
        )
        .unwrap();

        assert_eq!(call.interface.as_deref(), Some("org.kde.kglobalaccel.Component"));
        assert_eq!(call.member, "invokeShortcut");
        assert_eq!(call.argument.as_deref(), Some("Expose"));
    }

    #[test]
    fn test_method_call_rejects_bad_path() {
        let err = MethodCall::parse("org.example.App", "not/a/path", "Ping", "").unwrap_err();
        assert!(matches!(err, RuleError::InvalidMethodCall { what: "path", .. }));
    }

    #[test]
    fn test_command_line_split() {
        let cmd = CommandLine::parse("pactl set-sink-volume @DEFAULT_SINK@ +5%").unwrap();
        assert_eq!(cmd.program, "pactl");
        assert_eq!(cmd.args, vec!["set-sink-volume", "@DEFAULT_SINK@", "+5%"]);

        let cmd = CommandLine::parse("notify-send 'two words'").unwrap();
        assert_eq!(cmd.args, vec!["two words"]);
    }

    #[test]
    fn test_command_line_errors() {
        assert!(matches!(CommandLine::parse("   "), Err(RuleError::EmptyCommand)));
        assert!(matches!(
            CommandLine::parse("echo 'unterminated"),
            Err(RuleError::InvalidCommand(_))
        ));
    }
}
