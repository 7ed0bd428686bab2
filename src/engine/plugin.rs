//! Plugins - auxiliary objects riding a node's lifecycle.
//!
//! A plugin has no subtree of its own. Its hooks run right after the
//! owning node's hook of the same name. Plugins attached before the node
//! finished initializing are joined into its init: `load` fires for the
//! node and every plugin only once all of their init tasks resolved.

use super::component::{ready, InitTask};
use super::cx::{NodeCx, UpdateCx};
use super::node_ref::NodeRef;
use crate::error::Result;

pub trait Plugin: 'static {
    fn init(&mut self, node: NodeRef) -> InitTask {
        let _ = node;
        ready()
    }

    fn load(&mut self, cx: &NodeCx<'_>) {
        let _ = cx;
    }

    fn update(&mut self, cx: &UpdateCx<'_>) -> Result<()> {
        let _ = cx;
        Ok(())
    }

    fn on_removed(&mut self, cx: &NodeCx<'_>) {
        let _ = cx;
    }
}
