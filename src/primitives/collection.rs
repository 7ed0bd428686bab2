//! Collections - named lists of child nodes driven by a state array.
//!
//! Reconciliation is positional: item `i` of the new states goes to the
//! node that held position `i` before, whatever the state says. Callers
//! that reorder items and need identity to follow must key the state
//! themselves.
//!
//! # Lifecycle
//!
//! - Existing position: `assign_state` (no-op when equal)
//! - New position, container on the surface: append a host element, mark
//!   only the new node dirty
//! - New position, no container yet: mark the owner dirty
//! - Dropped position: remove the node (cleanup hooks run once)

use serde_json::Value;

use crate::engine::{Component, Runtime};
use crate::error::{Error, Result};
use crate::types::{ElementId, NodeId, RenderState};

/// One named collection of an owner node.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Item nodes, index-aligned with the last assigned states.
    pub items: Vec<NodeId>,
    /// Container element from the owner's last render.
    pub container: Option<ElementId>,
}

impl Runtime {
    /// Reconcile collection `name` of `owner` against `states`. `factory`
    /// builds the component of each newly materialized item. Returns the
    /// item nodes in order.
    pub fn assign_collection<C, F>(&self, owner: NodeId, name: &str, mut factory: F, states: Vec<Value>) -> Result<Vec<NodeId>>
    where
        C: Component,
        F: FnMut() -> C,
    {
        let (previous, container) = {
            let tree = self.inner().tree.borrow();
            let slot = tree.get(owner).ok_or(Error::NodeNotFound(owner))?;
            slot.collections
                .get(name)
                .map(|c| (c.items.clone(), c.container))
                .unwrap_or_default()
        };
        let container = container.filter(|c| self.with_surface(|s| s.is_live(*c)));

        let mut items = Vec::with_capacity(states.len());
        let mut owner_dirty = false;
        let mut appended = 0;
        for (index, state) in states.into_iter().enumerate() {
            if let Some(&existing) = previous.get(index) {
                self.assign_state(existing, state)?;
                items.push(existing);
                continue;
            }

            let id = self.insert_child(owner, Box::new(factory()), state, None)?;
            match container {
                Some(container) => {
                    let host_tag = self.config().host_tag.as_str();
                    let host = self.with_surface_mut(|s| {
                        let host = s.append_element(container, host_tag, Some(id))?;
                        s.set_attr(host, "data-node", &id.as_u64().to_string());
                        Some(host)
                    });
                    if let Some(slot) = self.inner().tree.borrow_mut().get_mut(id) {
                        slot.handle = host;
                    }
                    self.mark(id, RenderState::Dirty)?;
                    appended += 1;
                }
                None => owner_dirty = true,
            }
            self.start_init(id);
            items.push(id);
        }

        let surplus: Vec<NodeId> = previous.iter().skip(items.len()).copied().collect();
        if let Some(slot) = self.inner().tree.borrow_mut().get_mut(owner) {
            slot.collections.entry(name.to_string()).or_default().items = items.clone();
        }
        for node in &surplus {
            self.remove_node(*node);
        }

        if owner_dirty {
            self.mark(owner, RenderState::Dirty)?;
        }
        tracing::debug!(
            %owner,
            collection = name,
            len = items.len(),
            appended,
            removed = surplus.len(),
            owner_dirty,
            "collection assigned"
        );
        Ok(items)
    }

    /// Item nodes of a collection, in order.
    pub fn collection(&self, owner: NodeId, name: &str) -> Vec<NodeId> {
        self.inner()
            .tree
            .borrow()
            .get(owner)
            .and_then(|slot| slot.collections.get(name))
            .map(|c| c.items.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::engine::{NodeCx, RenderCx};
    use crate::pipeline::MountTarget;

    struct List {
        renders: Rc<Cell<u32>>,
    }

    impl Component for List {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            self.renders.set(self.renders.get() + 1);
            cx.collection("rows")
        }
    }

    struct Row {
        removed: Rc<Cell<u32>>,
    }

    impl Component for Row {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            let label = cx.state().as_str().unwrap_or_default().to_string();
            cx.text(label);
            Ok(())
        }

        fn on_removed(&mut self, _cx: &NodeCx<'_>) {
            self.removed.set(self.removed.get() + 1);
        }
    }

    struct Fixture {
        rt: Runtime,
        root: NodeId,
        renders: Rc<Cell<u32>>,
        removed: Rc<Cell<u32>>,
    }

    impl Fixture {
        fn new() -> Self {
            let renders = Rc::new(Cell::new(0));
            let rt = Runtime::new();
            let root = rt.mount(List { renders: renders.clone() }, MountTarget::Id("app"), Value::Null).unwrap();
            rt.run_until_stalled().unwrap();
            Self { rt, root, renders, removed: Rc::new(Cell::new(0)) }
        }

        fn assign(&self, states: Vec<Value>) -> Vec<NodeId> {
            let removed = self.removed.clone();
            let items = self
                .rt
                .assign_collection(self.root, "rows", || Row { removed: removed.clone() }, states)
                .unwrap();
            self.rt.run_until_stalled().unwrap();
            items
        }
    }

    #[test]
    fn test_empty_collection_still_renders_container() {
        let fx = Fixture::new();
        assert_eq!(fx.rt.output(fx.root).unwrap(), "<div data-collection=\"rows\"></div>");
    }

    #[test]
    fn test_positional_reuse_and_removal() {
        let fx = Fixture::new();
        let first = fx.assign(vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(first.len(), 3);

        let second = fx.assign(vec![json!("a2"), json!("b2")]);
        assert_eq!(second, first[..2].to_vec());
        assert_eq!(fx.removed.get(), 1);
        assert!(!fx.rt.contains(first[2]));
        assert_eq!(fx.rt.children(fx.root), second);
        assert_eq!(fx.rt.text(first[0]).unwrap(), "a2");
        assert_eq!(fx.rt.text(fx.root).unwrap(), "a2b2");

        // Removed nodes are not cleaned up twice.
        fx.assign(vec![json!("a2"), json!("b2")]);
        assert_eq!(fx.removed.get(), 1);
    }

    #[test]
    fn test_append_into_live_container_skips_owner() {
        let fx = Fixture::new();
        let renders_before = fx.renders.get();

        let items = fx.assign(vec![json!("x")]);
        assert_eq!(fx.renders.get(), renders_before);
        assert_eq!(fx.rt.text(items[0]).unwrap(), "x");

        let items = fx.assign(vec![json!("x"), json!("y")]);
        assert_eq!(fx.renders.get(), renders_before);
        assert_eq!(fx.rt.text(fx.root).unwrap(), "xy");
        assert_eq!(fx.rt.collection(fx.root, "rows"), items);
    }

    #[test]
    fn test_without_container_owner_goes_dirty() {
        let rt = Runtime::new();
        let removed = Rc::new(Cell::new(0));
        let renders = Rc::new(Cell::new(0));
        let root = rt.mount(List { renders: renders.clone() }, MountTarget::Id("app"), Value::Null).unwrap();

        // Owner not rendered yet: no container.
        let factory = || Row { removed: removed.clone() };
        let items = rt.assign_collection(root, "rows", factory, vec![json!("p"), json!("q")]).unwrap();
        assert_eq!(rt.render_state(root), Some(RenderState::Dirty));
        assert!(items.iter().all(|id| rt.handle(*id).is_none()));

        rt.run_until_stalled().unwrap();
        assert_eq!(rt.text(root).unwrap(), "pq");
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn test_equal_states_schedule_nothing() {
        let fx = Fixture::new();
        fx.assign(vec![json!("same")]);
        let frame = fx.rt.frame(fx.root);

        let removed = fx.removed.clone();
        fx.rt
            .assign_collection(fx.root, "rows", || Row { removed: removed.clone() }, vec![json!("same")])
            .unwrap();
        assert!(!fx.rt.is_pass_pending(fx.root));
        fx.rt.run_until_stalled().unwrap();
        assert_eq!(fx.rt.frame(fx.root), frame);
    }
}
