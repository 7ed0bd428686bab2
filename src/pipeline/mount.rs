//! Mount API - attach a root node to a surface container.
//!
//! # Example
//!
//! ```ignore
//! let rt = Runtime::new();
//! let root = rt.mount(Counter, MountTarget::Id("app"), json!({"count": 0}))?;
//!
//! // Init, load and the first pass run on the local pool.
//! rt.run_until_stalled()?;
//!
//! rt.unmount(root)?;
//! ```

use serde_json::Value;

use crate::bus::events::CLICK;
use crate::engine::tree::NodeSlot;
use crate::engine::{Component, Runtime};
use crate::error::{Error, Result};
use crate::types::{ElementId, NodeId};

/// Where a root goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountTarget<'a> {
    /// Container with this `id` attribute. Created if the surface has none.
    Id(&'a str),
    /// An existing element. It must carry a non-empty `id` attribute.
    Element(ElementId),
}

impl Runtime {
    /// Mount `component` as a new root on `target` and start its init.
    ///
    /// A root already mounted on the same container is unmounted first.
    /// Fails with [`Error::UnresolvableTarget`] when no container id can be
    /// determined.
    pub fn mount<C: Component>(&self, component: C, target: MountTarget<'_>, state: Value) -> Result<NodeId> {
        let container = self.resolve_target(target)?;

        let previous = self.inner().tree.borrow().root_at(container);
        if let Some(previous) = previous {
            tracing::debug!(%previous, %container, "replacing mounted root");
            self.remove_node(previous);
        }

        let id = NodeId::next();
        {
            let mut slot = NodeSlot::new(None, Box::new(component), state);
            slot.context.location = self.location();
            self.inner().tree.borrow_mut().insert_root(id, slot, container);
        }
        if self.shared().navigation.is_installed() {
            self.ensure_native_listener(id, CLICK);
        }
        tracing::debug!(root = %id, %container, "mounted");

        self.start_init(id);
        Ok(id)
    }

    /// Remove a root and everything under it. The container stays, empty.
    pub fn unmount(&self, root: NodeId) -> Result<()> {
        if !self.is_root(root) {
            return Err(Error::NodeNotFound(root));
        }
        self.remove_node(root);
        tracing::debug!(%root, "unmounted");
        Ok(())
    }

    fn resolve_target(&self, target: MountTarget<'_>) -> Result<ElementId> {
        match target {
            MountTarget::Id(id) => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(Error::UnresolvableTarget);
                }
                Ok(self.with_surface_mut(|s| s.element_by_id(id).unwrap_or_else(|| s.create_container(id))))
            }
            MountTarget::Element(element) => {
                let has_id = self.with_surface(|s| s.attr(element, "id").is_some_and(|id| !id.trim().is_empty()));
                if has_id { Ok(element) } else { Err(Error::UnresolvableTarget) }
            }
        }
    }
}
