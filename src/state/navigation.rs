//! Navigation capture - turns clicks on same-origin links into in-app
//! navigation instead of a full reload.
//!
//! Installed at most once per runtime; a second install is misuse.

use std::cell::Cell;

use super::location::Location;
use crate::error::{Error, Result};
use crate::renderer::Surface;
use crate::types::ElementId;

#[derive(Debug, Default)]
pub struct NavigationCapture {
    installed: Cell<bool>,
}

impl NavigationCapture {
    pub fn install(&self) -> Result<()> {
        if self.installed.replace(true) {
            return Err(Error::CaptureAlreadyInstalled);
        }
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.installed.get()
    }

    /// Location a click on `target` should navigate to, if it hit an
    /// in-app link (`<a href="/...">`). The href is resolved against
    /// `current`, so the host carries over.
    pub fn resolve(&self, surface: &Surface, target: ElementId, current: &Location) -> Option<Location> {
        if !self.is_installed() {
            return None;
        }
        surface.composed_path(target).into_iter().find_map(|id| {
            let el = surface.get(id)?;
            if el.tag != "a" {
                return None;
            }
            let href = el.attr("href")?;
            (href.starts_with('/') && !href.starts_with("//")).then(|| current.join(href))
        })
    }
}
