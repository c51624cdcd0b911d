//! Hardware-dependent tests that need real input devices
//!
//! These tests are ignored by default and can be run with:
//! `cargo test -- --ignored`
//!
//! They require:
//! - Read access to /dev/input/event* (root or the `input` group)
//! - uinput module loaded

/// At least one evdev node is visible
#[test]
#[ignore]
fn test_real_evdev_nodes() {
    use std::fs;

    let input_devices: Vec<_> = fs::read_dir("/dev/input")
        .expect("Can't read /dev/input")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("event"))
        .collect();

    println!("Found {} input event devices", input_devices.len());
    assert!(!input_devices.is_empty(), "No input event devices found");
}

/// Enumerated devices expose a name that config entries can match against
#[test]
#[ignore]
fn test_real_device_names() {
    let devices: Vec<_> = evdev::enumerate().collect();
    assert!(!devices.is_empty(), "evdev::enumerate found nothing; check permissions");

    for (path, device) in &devices {
        println!("{}\t{}", path.display(), device.name().unwrap_or("<unnamed>"));
    }
    assert!(devices.iter().any(|(_, d)| d.name().is_some()));
}

/// A keyboard-like device advertises key events
#[test]
#[ignore]
fn test_real_keyboard_present() {
    let keyboard = evdev::enumerate().find(|(_, d)| {
        d.supported_keys()
            .is_some_and(|keys| keys.contains(evdev::Key::KEY_A))
    });
    assert!(keyboard.is_some(), "No device with KEY_A found");
}

/// The virtual keyboard needs /dev/uinput
#[test]
#[ignore]
fn test_real_uinput_available() {
    use std::fs::OpenOptions;
    use std::path::Path;

    let uinput_path = Path::new("/dev/uinput");
    assert!(
        uinput_path.exists(),
        "/dev/uinput not found. Load the uinput module with: sudo modprobe uinput"
    );
    OpenOptions::new()
        .write(true)
        .open(uinput_path)
        .expect("/dev/uinput is not writable");
}
