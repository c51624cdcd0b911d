//! Integration tests for Wand
//!
//! These tests pin down the on-disk rule format.
//! Tests that require hardware live in hardware_tests.rs.

// Note: the crate is a binary, so these tests check the file format through
// toml/serde_json values rather than the crate's own types

/// A complete rule file parses and survives re-serialization
#[test]
fn test_config_round_trip() {
    let config_toml = r#"
[[devices]]
name = "Surface Dial System Multi Axis"

[[devices]]
path = "/dev/input/event3"

[[rules]]
hwheel = -1
[rules.action]
keycode = "29-44"

[[rules]]
application = "firefox"
keycode = "56-30"
[rules.action]
exec = "notify-send 'Alt A'"
"#;

    let parsed: toml::Value = toml::from_str(config_toml).expect("Should parse TOML");
    let reserialized = toml::to_string_pretty(&parsed).expect("Should serialize");

    assert!(reserialized.contains("Surface Dial System Multi Axis"));
    assert!(reserialized.contains("/dev/input/event3"));
    assert!(reserialized.contains("29-44"));

    let reparsed: toml::Value = toml::from_str(&reserialized).expect("Should parse again");
    assert_eq!(parsed, reparsed);
}

/// Rules are an ordered array; first match wins, so order must be preserved
#[test]
fn test_rule_order_is_preserved() {
    let config_toml = r#"
[[devices]]
name = "kbd"

[[rules]]
keycode = "30"
[rules.action]
exec = "first"

[[rules]]
keycode = "30"
[rules.action]
exec = "second"
"#;

    let parsed: toml::Value = toml::from_str(config_toml).unwrap();
    let rules = parsed["rules"].as_array().unwrap();

    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["action"]["exec"].as_str(), Some("first"));
    assert_eq!(rules[1]["action"]["exec"].as_str(), Some("second"));
}

/// D-Bus actions carry a fully qualified method name
#[test]
fn test_dbus_action_format() {
    let rule_toml = r#"
dial = 1
[action.dbus]
object = "org.mpris.MediaPlayer2.spotify"
path = "/org/mpris/MediaPlayer2"
method = "org.mpris.MediaPlayer2.Player.Next"
"#;

    let parsed: toml::Value = toml::from_str(rule_toml).unwrap();
    let method = parsed["action"]["dbus"]["method"].as_str().unwrap();
    let (interface, member) = method.rsplit_once('.').unwrap();

    assert_eq!(interface, "org.mpris.MediaPlayer2.Player");
    assert_eq!(member, "Next");
    assert!(parsed["action"]["dbus"].get("value").is_none());
}

/// JSON files use the same field names, with `dev` accepted for the path
#[test]
fn test_json_config_format() {
    let config_json = r#"{
        "devices": [{ "name": "Surface Dial", "dev": "/dev/input/event7" }],
        "rules": [
            { "application": "!mpv", "dial": -1, "action": { "keycode": "114" } }
        ]
    }"#;

    let parsed: serde_json::Value = serde_json::from_str(config_json).expect("Should parse JSON");

    assert_eq!(parsed["devices"][0]["dev"], "/dev/input/event7");
    assert_eq!(parsed["rules"][0]["dial"], -1);
    assert!(parsed["rules"][0]["application"].as_str().unwrap().starts_with('!'));
}
