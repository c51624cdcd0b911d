//! Focused application lookup
//!
//! Rules can be restricted to the application holding input focus. The
//! lookup happens synchronously for every event that reaches the matcher,
//! so rules always see the window focused at dispatch time.
//!
//! Backends:
//! - `x11`: `_NET_ACTIVE_WINDOW` + `WM_CLASS` (also works under XWayland)
//! - `null`: no display server; every rule sees an empty application

#[cfg(feature = "x11")]
pub mod x11;

pub mod null;

use anyhow::Result;

/// Identity of the focused window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusedApp {
    /// WM_CLASS class name; what application filters compare against
    pub class: String,
    pub title: String,
}

/// Source of the currently focused application
pub trait FocusSource: Send {
    fn focused_app(&self) -> Result<FocusedApp>;
}

/// Detected display server type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

impl DisplayServer {
    /// Detect the current display server from environment variables
    pub fn detect() -> Self {
        Self::from_session(
            std::env::var("XDG_SESSION_TYPE").ok().as_deref(),
            std::env::var_os("WAYLAND_DISPLAY").is_some(),
            std::env::var_os("DISPLAY").is_some(),
        )
    }

    fn from_session(session_type: Option<&str>, wayland_display: bool, x11_display: bool) -> Self {
        match session_type.map(str::to_lowercase).as_deref() {
            Some("wayland") => return DisplayServer::Wayland,
            Some("x11") => return DisplayServer::X11,
            _ => {}
        }

        if wayland_display {
            DisplayServer::Wayland
        } else if x11_display {
            DisplayServer::X11
        } else {
            DisplayServer::Unknown
        }
    }

    /// Why focus tracking is unavailable on this display server
    fn no_focus_reason(&self) -> &'static str {
        match self {
            DisplayServer::X11 => "the X11 display could not be queried",
            DisplayServer::Wayland => "Wayland does not expose the focused window; only XWayland windows are visible",
            DisplayServer::Unknown => "no display server was detected",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DisplayServer::X11 => "X11",
            DisplayServer::Wayland => "Wayland",
            DisplayServer::Unknown => "Unknown",
        }
    }
}

/// Create a focus source for the current session.
///
/// X11 is used whenever `DISPLAY` is set, which covers XWayland; otherwise
/// application filters only ever see an empty class.
pub fn create_focus_source() -> Box<dyn FocusSource> {
    let display_server = DisplayServer::detect();
    tracing::info!("Detected display server: {}", display_server.name());

    #[cfg(feature = "x11")]
    if std::env::var("DISPLAY").is_ok() {
        match x11::X11Focus::new() {
            Ok(focus) => return Box::new(focus),
            Err(e) => tracing::warn!("Failed to connect to X11 for focus tracking: {:#}", e),
        }
    }

    tracing::warn!(
        "No focus tracking: {}; application filters see no application",
        display_server.no_focus_reason()
    );
    Box::new(null::NullFocus)
}
