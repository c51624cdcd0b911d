//! X11 Focus Backend
//!
//! Reads the active window from the root window's `_NET_ACTIVE_WINDOW`
//! property, then its `WM_CLASS` and title.

use super::{FocusSource, FocusedApp};
use anyhow::{Context, Result};
use tracing::info;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

/// Focus lookups over a dedicated X11 connection
pub struct X11Focus {
    conn: RustConnection,
    root: Window,
    net_active_window: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
}

impl X11Focus {
    pub fn new() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 display")?;
        let root = conn.setup().roots[screen_num].root;

        let net_active_window = intern_atom(&conn, "_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern_atom(&conn, "_NET_WM_NAME")?;
        let utf8_string = intern_atom(&conn, "UTF8_STRING")?;

        info!("X11 focus tracking initialized (root: {})", root);

        Ok(Self {
            conn,
            root,
            net_active_window,
            net_wm_name,
            utf8_string,
        })
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let prop = self
            .conn
            .get_property(false, self.root, self.net_active_window, AtomEnum::WINDOW, 0, 1)?
            .reply()?;
        Ok(prop
            .value32()
            .and_then(|mut it| it.next())
            .filter(|&w| w != x11rb::NONE))
    }

    fn window_title(&self, w: Window) -> Result<String> {
        let prop = self
            .conn
            .get_property(false, w, self.net_wm_name, self.utf8_string, 0, 1024)?
            .reply()?;
        if !prop.value.is_empty() {
            return Ok(String::from_utf8_lossy(&prop.value).into_owned());
        }

        let prop = self
            .conn
            .get_property(false, w, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 1024)?
            .reply()?;
        Ok(String::from_utf8_lossy(&prop.value).into_owned())
    }
}

impl FocusSource for X11Focus {
    fn focused_app(&self) -> Result<FocusedApp> {
        let Some(w) = self.active_window()? else {
            return Ok(FocusedApp::default());
        };

        let class = get_wm_class(&self.conn, w)?
            .map(|(_instance, class)| class)
            .unwrap_or_default();
        let title = self.window_title(w)?;
        Ok(FocusedApp { class, title })
    }
}

/// Intern an X11 atom by name
fn intern_atom<C: Connection>(conn: &C, name: &str) -> Result<Atom> {
    Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
}

/// Get WM_CLASS property (instance, class) for a window
fn get_wm_class<C: Connection>(conn: &C, w: Window) -> Result<Option<(String, String)>> {
    let prop = conn
        .get_property(false, w, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)?
        .reply()?;

    if prop.value.is_empty() {
        return Ok(None);
    }
    Ok(Some(split_wm_class(&prop.value)))
}

/// WM_CLASS is two NUL-terminated strings: instance then class
fn split_wm_class(value: &[u8]) -> (String, String) {
    let mut parts = value
        .split(|&b| b == 0)
        .filter(|p| !p.is_empty())
        .map(|p| String::from_utf8_lossy(p).into_owned());

    let instance = parts.next().unwrap_or_default();
    let class = parts.next().unwrap_or_default();
    (instance, class)
}
