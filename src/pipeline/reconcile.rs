//! Reconciler - one top-down walk per pass.
//!
//! Per node, on its render state:
//!
//! ```text
//! Dirty  ─► has live handle && initialized? ─ no ─► skip (stays dirty)
//!                    │ yes
//!                    ▼
//!           render into fresh Markup ─► replace handle contents
//!           ─► hand host elements to embedded children
//!           ─► flag regenerated nodes NEEDS_LISTENERS ─► update pass
//! Stale  ─► update pass
//! Clean  ─► nothing
//!
//! then recurse into children (a clean parent says nothing about them)
//! ```
//!
//! A failing render hook never aborts the pass: its output so far stays,
//! the node is still considered rendered, and siblings carry on.

use crate::bus::events::is_output_event;
use crate::engine::{RenderCx, Runtime, UpdateCx};
use crate::error::Error;
use crate::renderer::{Markup, Materialized};
use crate::types::{InitPhase, NodeFlags, NodeId, RenderState};

use super::context::RenderContext;

impl Runtime {
    // =========================================================================
    // Visit
    // =========================================================================

    pub(crate) fn visit(&self, id: NodeId, context: &RenderContext) {
        self.set_context(id, context);
        let Some(state) = self.render_state(id) else {
            tracing::debug!(node = %id, "visit skipped, node removed");
            return;
        };

        match state {
            RenderState::Dirty => {
                if self.live_handle(id).is_none() {
                    tracing::debug!(node = %id, "dirty without output handle, waiting for parent");
                } else if self.init_phase(id) != Some(InitPhase::Initialized) {
                    tracing::debug!(node = %id, "dirty before init resolved, deferred");
                } else {
                    self.render_full(id);
                    self.update_pass(id);
                }
            }
            RenderState::Stale => self.update_pass(id),
            RenderState::Clean => {}
        }

        for child in self.children(id) {
            self.visit(child, context);
        }
    }

    /// Regenerate the whole output of `id` into its handle.
    fn render_full(&self, id: NodeId) {
        let Some(handle) = self.live_handle(id) else { return };
        let mut markup = Markup::new();
        self.render_into(id, &mut markup);
        let materialized = self.with_surface_mut(|s| s.replace_contents(handle, &markup, id));
        self.apply_materialized(materialized);
    }

    /// Run the render hook of `id` into `markup`. Embedded children render
    /// recursively through [`RenderCx::child`].
    ///
    /// Nodes whose init has not resolved write nothing and stay dirty.
    pub(crate) fn render_into(&self, id: NodeId, markup: &mut Markup) {
        let (phase, failed) = {
            let tree = self.inner().tree.borrow();
            let Some(slot) = tree.get(id) else { return };
            (slot.init_phase, slot.flags.contains(NodeFlags::INIT_FAILED))
        };
        if phase != InitPhase::Initialized {
            return;
        }

        // Settled before the hook runs: a mark raised while rendering
        // escalates back to dirty and is picked up by the next pass.
        if let Some(slot) = self.inner().tree.borrow_mut().get_mut(id) {
            slot.render_state = RenderState::Clean;
            slot.flags.insert(NodeFlags::NEEDS_LISTENERS);
        }

        let depth = markup.depth();
        if failed {
            let message = self.init_error(id).unwrap_or_default();
            markup.open("div").attr("class", self.config().error_class.as_str()).text(message).close();
        } else if let Some(cx) = self.node_cx(id) {
            let checkpoint = markup.checkpoint();
            let result = self.with_component(id, |c| c.render(&mut RenderCx::new(cx, &mut *markup)));
            match result {
                Some(Err(Error::Data(err))) => {
                    tracing::warn!(node = %id, error = %err, "render hit a data error, using fallback");
                    markup.rollback(checkpoint);
                    if let Some(cx) = self.node_cx(id) {
                        self.with_component(id, |c| c.render_fallback(&mut RenderCx::new(cx, &mut *markup), &err));
                    }
                }
                Some(Err(err)) => {
                    tracing::error!(node = %id, error = %err, "render failed, keeping partial output");
                }
                Some(Ok(())) => {}
                None => tracing::warn!(node = %id, "render re-entered its own node; skipped"),
            }
        }
        markup.close_to(depth);
    }

    fn apply_materialized(&self, materialized: Materialized) {
        let mut tree = self.inner().tree.borrow_mut();
        for (node, element) in materialized.hosts {
            if let Some(slot) = tree.get_mut(node) {
                slot.handle = Some(element);
            }
        }
        for (owner, name, element) in materialized.collections {
            if let Some(slot) = tree.get_mut(owner) {
                slot.collections.entry(name).or_default().container = Some(element);
            }
        }
    }

    // =========================================================================
    // Update pass
    // =========================================================================

    /// Top-down update of `id` and its subtree: component, then plugins,
    /// then children. Dirty nodes and nodes without live output are left to
    /// their own visit, together with their subtree.
    fn update_pass(&self, id: NodeId) {
        let (state, phase, failed) = {
            let tree = self.inner().tree.borrow();
            let Some(slot) = tree.get(id) else { return };
            (slot.render_state, slot.init_phase, slot.flags.contains(NodeFlags::INIT_FAILED))
        };
        if state == RenderState::Dirty || phase != InitPhase::Initialized {
            return;
        }
        let Some(handle) = self.live_handle(id) else { return };

        if !failed {
            if let Some(cx) = self.node_cx(id) {
                let cx = UpdateCx::new(cx, handle);
                if let Some(Err(err)) = self.with_component(id, |c| c.update(&cx)) {
                    tracing::warn!(node = %id, error = %err, "update failed");
                }
                for index in 0..self.plugin_count(id) {
                    if let Some(Err(err)) = self.with_plugin(id, index, |p| p.update(&cx)) {
                        tracing::warn!(node = %id, plugin = index, error = %err, "plugin update failed");
                    }
                }
            }
        }

        if let Some(slot) = self.inner().tree.borrow_mut().get_mut(id) {
            if slot.render_state == RenderState::Stale {
                slot.render_state = RenderState::Clean;
            }
        }

        for child in self.children(id) {
            self.update_pass(child);
        }
    }

    // =========================================================================
    // Listener re-attachment
    // =========================================================================

    /// Re-bind every node whose output was regenerated during this pass:
    /// make sure its output-event types have a native listener on the root,
    /// then run its `attach` hook. Each request is served once.
    pub(crate) fn reattach_listeners(&self, root: NodeId) {
        let order = self.inner().tree.borrow().pre_order(root);
        for node in order {
            let (event_types, failed) = {
                let mut tree = self.inner().tree.borrow_mut();
                let Some(slot) = tree.get_mut(node) else { continue };
                if !slot.flags.contains(NodeFlags::NEEDS_LISTENERS) {
                    continue;
                }
                slot.flags.remove(NodeFlags::NEEDS_LISTENERS);
                let mut types: Vec<String> =
                    slot.handlers.keys().filter(|t| is_output_event(t)).cloned().collect();
                types.sort();
                (types, slot.flags.contains(NodeFlags::INIT_FAILED))
            };

            for event_type in &event_types {
                self.ensure_native_listener(node, event_type);
            }
            if failed {
                continue;
            }
            let Some(handle) = self.live_handle(node) else { continue };
            if let Some(cx) = self.node_cx(node) {
                let cx = UpdateCx::new(cx, handle);
                self.with_component(node, |c| c.attach(&cx));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use serde_json::{json, Value};

    use super::*;
    use crate::engine::{Component, NodeRef, Plugin, UpdateCx};
    use crate::error::{DataError, Result};
    use crate::pipeline::MountTarget;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Renders `state.text` and embeds every child; logs hooks.
    struct Panel {
        log: Log,
    }

    impl Component for Panel {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            self.log.borrow_mut().push(format!("render {}", cx.id()));
            let text = cx.state()["text"].as_str().unwrap_or_default().to_string();
            cx.open("p").text(text).close();
            for child in cx.runtime().children(cx.id()) {
                cx.child(child)?;
            }
            Ok(())
        }

        fn update(&mut self, cx: &UpdateCx<'_>) -> Result<()> {
            self.log.borrow_mut().push(format!("update {}", cx.id()));
            Ok(())
        }

        fn attach(&mut self, cx: &UpdateCx<'_>) {
            self.log.borrow_mut().push(format!("attach {}", cx.id()));
        }
    }

    struct Failing;

    impl Component for Failing {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            cx.open("em").text("partial");
            Err(Error::render("boom"))
        }

        fn update(&mut self, _cx: &UpdateCx<'_>) -> Result<()> {
            Err(Error::render("update boom"))
        }
    }

    fn setup() -> (Runtime, NodeId, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let rt = Runtime::new();
        let root = rt.mount(Panel { log: log.clone() }, MountTarget::Id("app"), json!({"text": "root"})).unwrap();
        rt.run_until_stalled().unwrap();
        (rt, root, log)
    }

    #[test]
    fn test_stale_runs_update_only() {
        let (rt, root, log) = setup();
        let child = rt.make_child(root, Panel { log: log.clone() }, json!({"text": "child"}), None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();
        log.borrow_mut().clear();

        rt.stale(child).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(*log.borrow(), vec![format!("update {}", child)]);
        assert_eq!(rt.render_state(child), Some(RenderState::Clean));
    }

    #[test]
    fn test_dirty_renders_then_updates_subtree_then_attaches() {
        let (rt, root, log) = setup();
        let child = rt.make_child(root, Panel { log: log.clone() }, json!({"text": "child"}), None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();
        log.borrow_mut().clear();

        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                format!("render {}", root),
                format!("render {}", child),
                format!("update {}", root),
                format!("update {}", child),
                format!("attach {}", root),
                format!("attach {}", child),
            ]
        );
        assert_eq!(rt.output(child).unwrap(), "<p>child</p>");
    }

    #[test]
    fn test_clean_parent_still_visits_children() {
        let (rt, root, log) = setup();
        let child = rt.make_child(root, Panel { log: log.clone() }, json!({"text": "a"}), None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();
        log.borrow_mut().clear();

        rt.assign_state(child, json!({"text": "b"})).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(rt.render_state(root), Some(RenderState::Clean));
        assert_eq!(log.borrow()[0], format!("render {}", child));
        assert!(!log.borrow().contains(&format!("render {}", root)));
        assert_eq!(rt.output(child).unwrap(), "<p>b</p>");
    }

    #[test]
    fn test_render_failure_keeps_partial_output_and_siblings() {
        let (rt, root, log) = setup();
        let first = rt.make_child(root, Panel { log: log.clone() }, json!({"text": "one"}), None).unwrap();
        let middle = rt.make_child(root, Failing, Value::Null, None).unwrap();
        let last = rt.make_child(root, Panel { log: log.clone() }, json!({"text": "three"}), None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();

        assert_eq!(rt.output(first).unwrap(), "<p>one</p>");
        assert_eq!(rt.output(middle).unwrap(), "<em>partial</em>");
        assert_eq!(rt.output(last).unwrap(), "<p>three</p>");
        for id in [root, first, middle, last] {
            assert_eq!(rt.render_state(id), Some(RenderState::Clean));
        }
    }

    #[test]
    fn test_data_error_uses_fallback() {
        #[derive(serde::Deserialize)]
        struct Typed {
            #[allow(dead_code)]
            count: u32,
        }

        struct Strict;

        impl Component for Strict {
            fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
                cx.open("b").text("before");
                let _typed: Typed = cx.state_as()?;
                cx.close();
                Ok(())
            }

            fn render_fallback(&mut self, cx: &mut RenderCx<'_>, error: &DataError) {
                let _ = error;
                cx.open("i").text("bad data").close();
            }
        }

        let rt = Runtime::new();
        let root = rt.mount(Strict, MountTarget::Id("app"), json!({"count": "nope"})).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(rt.output(root).unwrap(), "<i>bad data</i>");
    }

    #[test]
    fn test_init_failure_renders_placeholder() {
        struct Broken;

        impl Component for Broken {
            fn init(&mut self, _node: NodeRef) -> crate::engine::InitTask {
                Box::pin(async { Err(Error::init("no backend")) })
            }

            fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
                cx.text("unreachable");
                Ok(())
            }
        }

        let (rt, root, log) = setup();
        let broken = rt.make_child(root, Broken, Value::Null, None).unwrap();
        let sibling = rt.make_child(root, Panel { log }, json!({"text": "ok"}), None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();

        assert_eq!(rt.init_phase(broken), Some(InitPhase::Initialized));
        assert!(rt.init_error(broken).unwrap().contains("no backend"));
        let output = rt.output(broken).unwrap();
        assert!(output.starts_with("<div class=\"node-error\">"));
        assert_eq!(rt.output(sibling).unwrap(), "<p>ok</p>");
    }

    #[test]
    fn test_update_failure_is_swallowed() {
        let (rt, root, _) = setup();
        let failing = rt.make_child(root, Failing, Value::Null, None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();

        rt.stale(failing).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(rt.render_state(failing), Some(RenderState::Clean));
    }

    #[test]
    fn test_plugin_update_runs_after_component() {
        struct Tag {
            log: Log,
        }

        impl Plugin for Tag {
            fn update(&mut self, cx: &UpdateCx<'_>) -> Result<()> {
                self.log.borrow_mut().push(format!("plugin {}", cx.id()));
                Ok(())
            }
        }

        let (rt, root, log) = setup();
        rt.attach_plugin(root, Tag { log: log.clone() }).unwrap();
        rt.run_until_stalled().unwrap();
        log.borrow_mut().clear();

        rt.stale(root).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(*log.borrow(), vec![format!("update {}", root), format!("plugin {}", root)]);
    }

    #[test]
    fn test_removed_subtree_is_not_rendered() {
        struct Counted {
            renders: Rc<Cell<u32>>,
        }

        impl Component for Counted {
            fn render(&mut self, _cx: &mut RenderCx<'_>) -> Result<()> {
                self.renders.set(self.renders.get() + 1);
                Ok(())
            }
        }

        let (rt, root, log) = setup();
        let renders = Rc::new(Cell::new(0u32));
        let child = rt.make_child(root, Panel { log }, json!({"text": "c"}), None).unwrap();
        let leaf = rt.make_child(child, Counted { renders: renders.clone() }, Value::Null, None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();
        assert_eq!(renders.get(), 1);

        rt.dirty(leaf).unwrap();
        rt.remove_child(root, child).unwrap();
        assert!(!rt.contains(leaf));
        rt.run_until_stalled().unwrap();
        assert_eq!(renders.get(), 1);
        assert_eq!(rt.output(root).unwrap(), "<p>root</p>");
    }

    /// Shows `seen=<state.seen>` and embeds its children.
    struct Echo;

    impl Component for Echo {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            let seen = cx.state()["seen"].to_string();
            cx.text(format!("seen={}", seen));
            for child in cx.runtime().children(cx.id()) {
                cx.child(child)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_invalidation_during_render_is_kept() {
        /// Reports back to its parent the first time it renders.
        struct Reporter;

        impl Component for Reporter {
            fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
                let rt = cx.runtime();
                if let Some(parent) = rt.parent(cx.id()) {
                    rt.assign_state(parent, json!({"seen": true}))?;
                }
                cx.text("c");
                Ok(())
            }
        }

        let rt = Runtime::new();
        let root = rt.mount(Echo, MountTarget::Id("app"), json!({})).unwrap();
        rt.run_until_stalled().unwrap();
        rt.make_child(root, Reporter, Value::Null, None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();

        assert_eq!(rt.state(root), Some(json!({"seen": true})));
        assert_eq!(rt.render_state(root), Some(RenderState::Clean));
        assert_eq!(rt.text(root).unwrap(), "seen=truec");
    }

    #[test]
    fn test_embedded_child_renders_with_current_context() {
        struct Frames {
            seen: Rc<RefCell<Vec<u64>>>,
        }

        impl Component for Frames {
            fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
                self.seen.borrow_mut().push(cx.context().frame);
                Ok(())
            }
        }

        let rt = Runtime::new();
        let root = rt.mount(Echo, MountTarget::Id("app"), json!({})).unwrap();
        rt.run_until_stalled().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        rt.make_child(root, Frames { seen: seen.clone() }, Value::Null, None).unwrap();

        let mut frames = Vec::new();
        for _ in 0..3 {
            rt.dirty(root).unwrap();
            rt.run_until_stalled().unwrap();
            frames.push(rt.frame(root).unwrap());
        }
        assert_eq!(*seen.borrow(), frames);
    }
}
