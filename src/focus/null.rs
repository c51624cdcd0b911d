//! Null/Fallback Focus Backend
//!
//! Used when no display server is available. Always reports no application.

use super::{FocusSource, FocusedApp};
use anyhow::Result;

/// Null focus source - there is never a focused application
pub struct NullFocus;

impl FocusSource for NullFocus {
    fn focused_app(&self) -> Result<FocusedApp> {
        Ok(FocusedApp::default())
    }
}
