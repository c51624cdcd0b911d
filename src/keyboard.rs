//! uinput virtual keyboard used to emit key combos

use crate::actions::KeyEmitter;
use crate::event::{KEY_DOWN, KEY_UP};
use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use std::thread;
use std::time::Duration;
use tracing::info;

/// Name the virtual device registers under
pub const VIRTUAL_KEYBOARD_NAME: &str = "Wand Virtual Keyboard";

/// Highest regular keyboard keycode (KEY_MICMUTE)
const MAX_KEYCODE: u16 = 248;

/// Key events written to /dev/uinput
pub struct VirtualKeyboard {
    vdev: VirtualDevice,
}

impl VirtualKeyboard {
    /// Create the virtual keyboard with every regular key enabled
    pub fn create() -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 1..=MAX_KEYCODE {
            keys.insert(Key::new(code));
        }

        let vdev = VirtualDeviceBuilder::new()
            .context("Failed to create uinput builder (is /dev/uinput writable?)")?
            .name(VIRTUAL_KEYBOARD_NAME)
            .with_keys(&keys)
            .context("Failed to set key capabilities")?
            .build()
            .context("Failed to build uinput device")?;

        // Small delay for the device to be picked up by the session
        thread::sleep(Duration::from_millis(50));

        info!("Created virtual keyboard '{}'", VIRTUAL_KEYBOARD_NAME);
        Ok(Self { vdev })
    }

    fn emit_key(&mut self, code: u16, value: i32) -> Result<()> {
        let events = [
            InputEvent::new(EventType::KEY, code, value),
            InputEvent::new(EventType::SYNCHRONIZATION, 0, 0),
        ];
        self.vdev
            .emit(&events)
            .with_context(|| format!("Failed to emit key {code} (value {value})"))
    }
}

impl KeyEmitter for VirtualKeyboard {
    fn key_down(&mut self, code: u16) -> Result<()> {
        self.emit_key(code, KEY_DOWN)
    }

    fn key_up(&mut self, code: u16) -> Result<()> {
        self.emit_key(code, KEY_UP)
    }

    fn key_press(&mut self, code: u16) -> Result<()> {
        self.emit_key(code, KEY_DOWN)?;
        self.emit_key(code, KEY_UP)
    }
}
