//! Input device ingestion
//!
//! One worker thread per configured device reads events and pushes them,
//! tagged with their device, onto the shared intake channel. A worker that
//! hits a read error waits out its backoff and starts over from device
//! resolution, so unplugging and replugging a device is survived.

use crate::config::DeviceSpec;
use crate::event::{EventKind, InputEvent, RawEvent};
use crate::keyboard::VIRTUAL_KEYBOARD_NAME;
use evdev::{Device, InputEventKind, RelativeAxisType};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device named like {0:?}")]
    NotFound(String),
    #[error("failed to open {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("none of the configured devices could be opened")]
    NoneAvailable,
}

/// An enumerated input device node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
}

/// Enumerates and opens input devices
pub trait InputSource: Send + Sync + 'static {
    type Reader: EventReader;

    fn list(&self) -> Vec<DeviceInfo>;
    fn open(&self, path: &Path) -> io::Result<Self::Reader>;
}

/// Blocking reader over an opened device
pub trait EventReader: Send + 'static {
    /// Block until at least one event is available
    fn read(&mut self) -> io::Result<Vec<RawEvent>>;
}

/// /dev/input/event* through evdev
#[derive(Debug, Default, Clone, Copy)]
pub struct EvdevSource;

pub struct EvdevReader {
    device: Device,
}

impl InputSource for EvdevSource {
    type Reader = EvdevReader;

    fn list(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = evdev::enumerate()
            .map(|(path, dev)| DeviceInfo {
                path,
                name: dev.name().unwrap_or_default().to_string(),
            })
            .collect();
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        devices
    }

    fn open(&self, path: &Path) -> io::Result<EvdevReader> {
        let device = Device::open(path)?;
        debug!(
            "Opened {:?}: '{}' (phys {:?})",
            path,
            device.name().unwrap_or("?"),
            device.physical_path()
        );
        Ok(EvdevReader { device })
    }
}

impl EventReader for EvdevReader {
    fn read(&mut self) -> io::Result<Vec<RawEvent>> {
        Ok(self.device.fetch_events()?.map(classify).collect())
    }
}

/// Map an evdev event onto the categories the dispatch loop cares about
pub fn classify(ev: evdev::InputEvent) -> RawEvent {
    let kind = match ev.kind() {
        InputEventKind::Key(_) => EventKind::Key,
        InputEventKind::RelAxis(RelativeAxisType::REL_HWHEEL) => EventKind::RelativeWheel,
        InputEventKind::RelAxis(RelativeAxisType::REL_DIAL) => EventKind::RelativeDial,
        _ => EventKind::Other,
    };
    RawEvent::new(kind, ev.code(), ev.value())
}

/// Backoff between reconnect attempts, doubling up to `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl RestartPolicy {
    /// Same delay between every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
        }
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max).max(self.initial)
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

/// Find the device node for a configured device.
///
/// A configured path wins; otherwise the first enumerated device whose name
/// contains the configured name is used. Our own virtual keyboard is never
/// picked, or emitted combos would be read back as input.
pub fn resolve<S: InputSource>(source: &S, spec: &DeviceSpec) -> Result<PathBuf, DeviceError> {
    if !spec.path.is_empty() {
        return Ok(PathBuf::from(&spec.path));
    }
    source
        .list()
        .into_iter()
        .filter(|info| info.name != VIRTUAL_KEYBOARD_NAME)
        .find(|info| info.name.contains(&spec.name))
        .map(|info| info.path)
        .ok_or_else(|| DeviceError::NotFound(spec.name.clone()))
}

fn open<S: InputSource>(source: &S, spec: &DeviceSpec) -> Result<(PathBuf, S::Reader), DeviceError> {
    let path = resolve(source, spec)?;
    let reader = source.open(&path).map_err(|source| DeviceError::Open {
        path: path.clone(),
        source,
    })?;
    Ok((path, reader))
}

/// Reads one device and forwards its events to the intake
struct Worker<S: InputSource> {
    source: Arc<S>,
    device: Arc<DeviceSpec>,
    intake: Sender<InputEvent>,
    policy: RestartPolicy,
}

impl<S: InputSource> Worker<S> {
    /// Runs until the intake is closed
    fn run(self, mut node: PathBuf, mut reader: S::Reader) {
        loop {
            if !self.forward(Arc::from(node.as_path()), &mut reader) {
                return;
            }
            match self.reconnect() {
                Some((path, r)) => {
                    node = path;
                    reader = r;
                }
                None => return,
            }
        }
    }

    /// Forward events until a read error; false once the intake is gone
    fn forward(&self, node: Arc<Path>, reader: &mut S::Reader) -> bool {
        loop {
            let events = match reader.read() {
                Ok(events) => events,
                Err(e) => {
                    warn!(device = self.device.label(), "Error reading from device: {e}");
                    return true;
                }
            };
            for raw in events {
                let event = InputEvent::from_raw(raw, self.device.clone(), node.clone());
                if self.intake.blocking_send(event).is_err() {
                    debug!(device = self.device.label(), "Intake closed, stopping worker");
                    return false;
                }
            }
        }
    }

    /// Back off and reopen until it works; None once the intake is gone
    fn reconnect(&self) -> Option<(PathBuf, S::Reader)> {
        let mut delay = self.policy.initial;
        loop {
            thread::sleep(delay);
            if self.intake.is_closed() {
                return None;
            }
            match open(self.source.as_ref(), &self.device) {
                Ok((path, reader)) => {
                    info!(device = self.device.label(), "Reconnected to {:?}", path);
                    return Some((path, reader));
                }
                Err(e) => {
                    delay = self.policy.next(delay);
                    debug!(device = self.device.label(), "Reconnect failed: {e}, retrying in {delay:?}");
                }
            }
        }
    }
}

/// Open every configured device and start one worker thread per device.
///
/// A device that cannot be opened is skipped with a warning; the daemon
/// runs degraded on the remaining ones. Fails only when nothing opened.
/// Worker threads are detached and end with the process.
pub fn start_workers<S: InputSource>(
    source: Arc<S>,
    devices: &[DeviceSpec],
    intake: Sender<InputEvent>,
    policy: RestartPolicy,
) -> Result<usize, DeviceError> {
    let mut started = 0;

    for spec in devices {
        let (path, reader) = match open(source.as_ref(), spec) {
            Ok(opened) => opened,
            Err(e) => {
                error!(device = spec.label(), "Skipping device: {e}");
                continue;
            }
        };

        let worker = Worker {
            source: source.clone(),
            device: Arc::new(spec.clone()),
            intake: intake.clone(),
            policy,
        };
        info!(device = spec.label(), "Listening on {:?}", path);
        let spawned = thread::Builder::new()
            .name(format!("device:{}", spec.label()))
            .spawn(move || worker.run(path, reader));

        match spawned {
            Ok(_) => started += 1,
            Err(e) => error!(device = spec.label(), "Failed to start worker thread: {e}"),
        }
    }

    if started == 0 {
        return Err(DeviceError::NoneAvailable);
    }
    if started < devices.len() {
        warn!("Running degraded: {} of {} device(s) available", started, devices.len());
    }
    Ok(started)
}
