//! Node arena - ownership bookkeeping for the node tree.
//!
//! Nodes are slots in a map keyed by [`NodeId`]; parents and children refer
//! to each other by id. Detaching a subtree is an explicit operation that
//! hands the removed slots back to the caller.
//!
//! Nothing in here calls into user code. Hooks are run by the runtime
//! around these operations.

use std::collections::HashMap;

use serde_json::Value;

use crate::bus::message::HandlerEntry;
use crate::engine::component::Component;
use crate::engine::plugin::Plugin;
use crate::pipeline::context::RenderContext;
use crate::primitives::collection::Collection;
use crate::types::{ElementId, InitPhase, NodeFlags, NodeId, RenderState};

// =============================================================================
// Slots
// =============================================================================

/// Everything the engine tracks for one node.
pub(crate) struct NodeSlot {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub named: HashMap<String, NodeId>,
    pub collections: HashMap<String, Collection>,
    pub state: Value,
    pub init_phase: InitPhase,
    pub render_state: RenderState,
    pub handle: Option<ElementId>,
    pub context: RenderContext,
    pub flags: NodeFlags,
    pub handlers: HashMap<String, Vec<HandlerEntry>>,
    /// Taken out while one of its hooks runs.
    pub component: Option<Box<dyn Component>>,
    pub plugins: Vec<Option<Box<dyn Plugin>>>,
    /// Init tasks (own + joined plugins) still outstanding.
    pub pending_inits: usize,
    pub init_error: Option<String>,
}

impl NodeSlot {
    pub fn new(parent: Option<NodeId>, component: Box<dyn Component>, state: Value) -> Self {
        Self {
            parent,
            children: Vec::new(),
            named: HashMap::new(),
            collections: HashMap::new(),
            state,
            init_phase: InitPhase::Uninitialized,
            render_state: RenderState::Dirty,
            handle: None,
            context: RenderContext::default(),
            flags: NodeFlags::NONE,
            handlers: HashMap::new(),
            component: Some(component),
            plugins: Vec::new(),
            pending_inits: 0,
            init_error: None,
        }
    }
}

/// Per-root scheduling state.
#[derive(Debug)]
pub(crate) struct RootState {
    pub container: ElementId,
    pub pass_pending: bool,
    pub frame: u64,
}

// =============================================================================
// Tree
// =============================================================================

#[derive(Default)]
pub(crate) struct Tree {
    nodes: HashMap<NodeId, NodeSlot>,
    roots: HashMap<NodeId, RootState>,
}

impl Tree {
    pub fn get(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn root_state(&self, root: NodeId) -> Option<&RootState> {
        self.roots.get(&root)
    }

    pub fn root_state_mut(&mut self, root: NodeId) -> Option<&mut RootState> {
        self.roots.get_mut(&root)
    }

    /// Root ids, oldest first.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self.roots.keys().copied().collect();
        roots.sort();
        roots
    }

    pub fn root_at(&self, container: ElementId) -> Option<NodeId> {
        self.roots.iter().find(|(_, state)| state.container == container).map(|(id, _)| *id)
    }

    pub fn insert_root(&mut self, id: NodeId, mut slot: NodeSlot, container: ElementId) {
        slot.parent = None;
        slot.handle = Some(container);
        self.nodes.insert(id, slot);
        self.roots.insert(id, RootState { container, pass_pending: false, frame: 0 });
    }

    /// Register `id` under `parent`. Returns the child that previously held
    /// `name`, which the caller must remove.
    pub fn insert_child(&mut self, parent: NodeId, id: NodeId, mut slot: NodeSlot, name: Option<&str>) -> Option<NodeId> {
        slot.parent = Some(parent);
        self.nodes.insert(id, slot);
        let parent_slot = self.nodes.get_mut(&parent)?;
        parent_slot.children.push(id);
        let name = name?;
        parent_slot.named.insert(name.to_string(), id).filter(|old| *old != id)
    }

    /// Walk the parent chain to the root.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let slot = self.nodes.get(&current)?;
            match slot.parent {
                Some(parent) if parent != current => current = parent,
                _ => return Some(current),
            }
        }
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.roots.contains_key(&id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes.get(&id).map(|slot| slot.children.clone()).unwrap_or_default()
    }

    /// `id` and its descendants, parents before children.
    pub fn pre_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.nodes.get(&current) else { continue };
            out.push(current);
            stack.extend(slot.children.iter().rev().copied());
        }
        out
    }

    /// Remove `id` and its subtree, unlinking it from its parent's
    /// children, named children and collections.
    pub fn detach(&mut self, id: NodeId) -> Vec<(NodeId, NodeSlot)> {
        let order = self.pre_order(id);

        let parent = self.nodes.get(&id).and_then(|slot| slot.parent);
        if let Some(parent_slot) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent_slot.children.retain(|c| *c != id);
            parent_slot.named.retain(|_, c| *c != id);
            for collection in parent_slot.collections.values_mut() {
                collection.items.retain(|c| *c != id);
            }
        }
        self.roots.remove(&id);

        // Children before parents.
        order
            .into_iter()
            .rev()
            .filter_map(|n| self.nodes.remove(&n).map(|slot| (n, slot)))
            .collect()
    }
}
