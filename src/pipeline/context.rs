//! Render context propagation and the load cascade.
//!
//! Every node carries a [`RenderContext`]: the frame counter of its root and
//! the location snapshot taken when that frame started. Roots refresh it at
//! the start of each pass and the reconciler hands it down to every visited
//! node. A location change re-runs `load` on every initialized node, parents
//! before children, each already seeing the new context.

use crate::engine::Runtime;
use crate::state::Location;
use crate::types::{InitPhase, NodeFlags, NodeId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    /// Pass counter of the owning root.
    pub frame: u64,
    pub location: Location,
}

impl Runtime {
    /// Change the current location. Returns false, and does nothing, when
    /// it equals the current one.
    ///
    /// On change every root reloads its subtree and a pass is scheduled.
    pub fn navigate(&self, location: Location) -> bool {
        if !self.shared().location.set(location) {
            return false;
        }
        tracing::debug!(location = ?self.location(), "navigated");
        for root in self.roots() {
            self.reload(root);
            self.schedule(root);
        }
        true
    }

    /// Refresh the context of `id` and its subtree from the current
    /// location, then run `load` on each initialized node, top-down.
    pub fn reload(&self, id: NodeId) {
        let location = self.location();
        let order = self.inner().tree.borrow().pre_order(id);
        for node in order {
            let loadable = {
                let mut tree = self.inner().tree.borrow_mut();
                let Some(slot) = tree.get_mut(node) else { continue };
                slot.context.location = location.clone();
                slot.init_phase == InitPhase::Initialized && !slot.flags.contains(NodeFlags::INIT_FAILED)
            };
            if loadable {
                self.run_load(node);
            }
        }
    }

    /// Start a new frame on a root: bump its counter and snapshot the
    /// location. Returns the new context.
    pub(crate) fn begin_frame(&self, root: NodeId) -> Option<RenderContext> {
        let location = self.location();
        let mut tree = self.inner().tree.borrow_mut();
        let frame = {
            let root_state = tree.root_state_mut(root)?;
            root_state.frame += 1;
            root_state.frame
        };
        let context = RenderContext { frame, location };
        if let Some(slot) = tree.get_mut(root) {
            slot.context = context.clone();
        }
        Some(context)
    }

    /// Overwrite a node's context with the one handed down by its parent.
    pub(crate) fn set_context(&self, id: NodeId, context: &RenderContext) {
        if let Some(slot) = self.inner().tree.borrow_mut().get_mut(id) {
            if slot.context != *context {
                slot.context = context.clone();
            }
        }
    }
}
