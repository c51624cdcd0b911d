//! Rule configuration
//!
//! Handles loading and saving the device and rule lists. Files are TOML,
//! or JSON when the extension is `.json`. Rules are compiled while loading
//! so that a malformed rule is a startup error rather than a runtime one.

use crate::actions::{Action, CommandLine, MethodCall};
use crate::rules::{AppFilter, DeviceFilter, Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Separator between keycodes in chord filters and key combos
pub const KEYCODE_SEPARATOR: char = '-';

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("no devices configured")]
    NoDevices,
    #[error("device #{index} has neither a name nor a path")]
    EmptyDevice { index: usize },
    #[error("rule #{index}: {source}")]
    Rule { index: usize, source: RuleError },
}

/// A problem with a single rule
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{0:?} is not a valid keycode")]
    InvalidKeycode(String),
    #[error("invalid D-Bus {what}: {reason}")]
    InvalidMethodCall { what: &'static str, reason: String },
    #[error("invalid command line {0}")]
    InvalidCommand(String),
    #[error("empty command line")]
    EmptyCommand,
}

/// A physical input device, by declared name and/or device node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Declared device name; matched as a substring when resolving
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Device node, e.g. /dev/input/event5
    #[serde(default, alias = "dev", skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl DeviceSpec {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.path.is_empty()
    }

    /// Human readable label for logs and thread names
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.path } else { &self.name }
    }
}

/// Session-bus method call as written in the config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBusSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Fully qualified method, `interface.Member`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Action as written in the config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Key combo, e.g. "29-42-30"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keycode: String,

    /// Command line to launch
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exec: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbus: Option<DBusSpec>,
}

/// Rule as written in the config; every filter is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Focused application class, or "!class" for anything else
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application: String,

    /// Chord of held keys, e.g. "29-56"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keycode: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub hwheel: i32,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub dial: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSpec>,

    #[serde(default)]
    pub action: ActionSpec,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

impl Format {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

impl Config {
    /// Default config location, `$XDG_CONFIG_HOME/wand/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wand")
            .join("config.toml")
    }

    /// Load a config file, validate its devices and compile its rules
    pub fn load(path: &Path) -> Result<(Self, RuleSet), ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&content, Format::for_path(path)).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        config.validate()?;
        let rules = config.rule_set()?;

        info!(
            "Loaded {} device(s) and {} rule(s) from {:?}",
            config.devices.len(),
            rules.len(),
            path
        );
        Ok((config, rules))
    }

    fn parse(content: &str, format: Format) -> Result<Self, String> {
        match format {
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Write the config back out, unchanged
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = match Format::for_path(path) {
            Format::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Json => serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check the device list
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if let Some(index) = self.devices.iter().position(DeviceSpec::is_empty) {
            return Err(ConfigError::EmptyDevice { index });
        }
        Ok(())
    }

    /// Compile the rule list for the matcher
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, spec)| spec.compile(index).map_err(|source| ConfigError::Rule { index, source }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleSet::new(rules))
    }
}

impl RuleSpec {
    fn compile(&self, index: usize) -> Result<Rule, RuleError> {
        let action = self.action.compile()?;
        if action.is_empty() {
            warn!("rule #{index} has no action and will only swallow matches");
        }
        Ok(Rule {
            index,
            device: self.device.as_ref().map(DeviceFilter::from_spec).unwrap_or_default(),
            application: AppFilter::parse(&self.application),
            keycodes: parse_keycodes(&self.keycode)?,
            hwheel: self.hwheel,
            dial: self.dial,
            action,
        })
    }
}

impl ActionSpec {
    fn compile(&self) -> Result<Action, RuleError> {
        let call = match &self.dbus {
            Some(dbus) if !dbus.method.is_empty() => {
                Some(MethodCall::parse(&dbus.object, &dbus.path, &dbus.method, &dbus.value)?)
            }
            _ => None,
        };
        let command = if self.exec.trim().is_empty() {
            None
        } else {
            Some(CommandLine::parse(&self.exec)?)
        };

        Ok(Action {
            keys: parse_keycodes(&self.keycode)?,
            call,
            command,
        })
    }
}

/// Parse a `-` separated keycode list; blank entries are skipped
pub fn parse_keycodes(spec: &str) -> Result<Vec<u16>, RuleError> {
    spec.split(KEYCODE_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u16>()
                .map_err(|_| RuleError::InvalidKeycode(token.to_string()))
        })
        .collect()
}
