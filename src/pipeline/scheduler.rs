//! Scheduler - coalesces invalidations into one pass per root.
//!
//! `dirty()` / `stale()` anywhere in a root's tree only record the request
//! on the node and raise the root's `pass_pending` flag. The first raise
//! spawns a deferred flush on the local pool; every further request before
//! that flush runs is absorbed by it.
//!
//! ```text
//! dirty(n7) ─┐
//! stale(n3) ─┼─► root.pass_pending? ── no ──► spawn flush(root)
//! dirty(n9) ─┘                      └─ yes ─► (absorbed)
//!
//! run_until_stalled ──► flush(root): frame += 1 ─► reconcile ─► reattach
//! ```

use crate::engine::Runtime;
use crate::error::{Error, Result};
use crate::types::{NodeId, RenderState};

impl Runtime {
    /// Request a full re-render of `id` on the next pass.
    pub fn dirty(&self, id: NodeId) -> Result<()> {
        self.mark(id, RenderState::Dirty)
    }

    /// Request an update-only visit of `id` on the next pass.
    pub fn stale(&self, id: NodeId) -> Result<()> {
        self.mark(id, RenderState::Stale)
    }

    /// Whether a flush is scheduled for `root` and has not run yet.
    pub fn is_pass_pending(&self, root: NodeId) -> bool {
        self.inner().tree.borrow().root_state(root).is_some_and(|state| state.pass_pending)
    }

    /// Number of passes run on `root` so far.
    pub fn frame(&self, root: NodeId) -> Option<u64> {
        self.inner().tree.borrow().root_state(root).map(|state| state.frame)
    }

    pub(crate) fn mark(&self, id: NodeId, request: RenderState) -> Result<()> {
        let root = {
            let mut tree = self.inner().tree.borrow_mut();
            let slot = tree.get_mut(id).ok_or(Error::NodeNotFound(id))?;
            slot.render_state = slot.render_state.escalate(request);
            tree.root_of(id).ok_or(Error::NodeNotFound(id))?
        };
        self.schedule(root);
        Ok(())
    }

    /// Make sure a flush of `root` is pending.
    pub(crate) fn schedule(&self, root: NodeId) {
        {
            let mut tree = self.inner().tree.borrow_mut();
            let Some(state) = tree.root_state_mut(root) else {
                tracing::debug!(%root, "schedule on a node that is not a mounted root");
                return;
            };
            if state.pass_pending {
                return;
            }
            state.pass_pending = true;
        }

        tracing::debug!(%root, "pass scheduled");
        let weak = self.weak();
        self.spawn(async move {
            if let Some(inner) = weak.upgrade() {
                Runtime::from_inner(inner).flush(root);
            }
        });
    }

    /// Run one pass over `root`.
    pub(crate) fn flush(&self, root: NodeId) {
        {
            let mut tree = self.inner().tree.borrow_mut();
            let Some(state) = tree.root_state_mut(root) else {
                tracing::debug!(%root, "flush skipped, root unmounted");
                return;
            };
            state.pass_pending = false;
        }
        let Some(context) = self.begin_frame(root) else { return };
        tracing::debug!(%root, frame = context.frame, "pass");
        self.visit(root, &context);
        self.reattach_listeners(root);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde_json::{json, Value};

    use super::*;
    use crate::engine::{Component, RenderCx};
    use crate::pipeline::MountTarget;

    struct Counted {
        renders: Rc<Cell<u32>>,
    }

    impl Component for Counted {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            self.renders.set(self.renders.get() + 1);
            for child in cx.runtime().children(cx.id()) {
                cx.child(child)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_dirty_calls_coalesce_into_one_pass() {
        let renders = Rc::new(Cell::new(0));
        let rt = Runtime::new();
        let root = rt.mount(Counted { renders: renders.clone() }, MountTarget::Id("app"), Value::Null).unwrap();
        let a = rt.make_child(root, Counted { renders: renders.clone() }, json!(1), None).unwrap();
        let b = rt.make_child(root, Counted { renders: renders.clone() }, json!(2), None).unwrap();
        rt.run_until_stalled().unwrap();
        let frame = rt.frame(root).unwrap();

        for _ in 0..5 {
            rt.dirty(a).unwrap();
            rt.dirty(b).unwrap();
            rt.stale(root).unwrap();
        }
        assert!(rt.is_pass_pending(root));
        rt.run_until_stalled().unwrap();

        assert_eq!(rt.frame(root), Some(frame + 1));
        assert!(!rt.is_pass_pending(root));
        assert_eq!(rt.render_state(a), Some(RenderState::Clean));
        assert_eq!(rt.render_state(b), Some(RenderState::Clean));
    }

    #[test]
    fn test_stale_never_downgrades_dirty() {
        let renders = Rc::new(Cell::new(0));
        let rt = Runtime::new();
        let root = rt.mount(Counted { renders: renders.clone() }, MountTarget::Id("app"), Value::Null).unwrap();
        rt.run_until_stalled().unwrap();
        let before = renders.get();

        rt.dirty(root).unwrap();
        rt.stale(root).unwrap();
        assert_eq!(rt.render_state(root), Some(RenderState::Dirty));
        rt.run_until_stalled().unwrap();
        assert_eq!(renders.get(), before + 1);
    }

    #[test]
    fn test_mark_unknown_node() {
        let rt = Runtime::new();
        let ghost = NodeId::next();
        assert!(matches!(rt.dirty(ghost), Err(Error::NodeNotFound(id)) if id == ghost));
    }
}
