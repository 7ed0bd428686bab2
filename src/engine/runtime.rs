//! Runtime - owner of the node arena, the output surface, the shared
//! registries and the single-threaded task pool.
//!
//! `Runtime` is a cheap `Rc` handle. Every hook receives a reference to it,
//! and no `RefCell` borrow is held while user code runs: components and
//! plugins are taken out of their slot for the duration of a hook and put
//! back afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use serde_json::Value;

use super::component::{Component, InitTask};
use super::cx::NodeCx;
use super::node_ref::NodeRef;
use super::plugin::Plugin;
use super::tree::{NodeSlot, Tree};
use crate::bus::message::MessageKey;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::context::RenderContext;
use crate::renderer::Surface;
use crate::state::{Keyboard, Location, Shared};
use crate::types::{ElementId, InitPhase, NodeFlags, NodeId, RenderState};

// =============================================================================
// Runtime
// =============================================================================

pub(crate) struct Inner {
    pub(crate) tree: RefCell<Tree>,
    pub(crate) surface: RefCell<Surface>,
    pub(crate) keys: RefCell<HashMap<u64, MessageKey>>,
    pub(crate) shared: Shared,
    pub(crate) config: Config,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<Inner>,
}

/// Which init task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitSource {
    Node,
    Plugin(usize),
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.node_count())
            .field("roots", &self.roots())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            inner: Rc::new(Inner {
                tree: RefCell::new(Tree::default()),
                surface: RefCell::new(Surface::new()),
                keys: RefCell::new(HashMap::new()),
                shared: Shared::default(),
                config,
                pool: RefCell::new(pool),
                spawner,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn weak(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.inner.shared.keyboard
    }

    pub fn location(&self) -> Location {
        self.inner.shared.location.current()
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&Surface) -> R) -> R {
        f(&self.inner.surface.borrow())
    }

    pub fn with_surface_mut<R>(&self, f: impl FnOnce(&mut Surface) -> R) -> R {
        f(&mut self.inner.surface.borrow_mut())
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef::new(self.weak(), id)
    }

    // =========================================================================
    // Task pool
    // =========================================================================

    pub(crate) fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.inner.spawner.spawn_local(task) {
            tracing::error!(error = %err, "failed to spawn task");
        }
    }

    /// Run init tasks and pending flushes until nothing can make progress.
    ///
    /// This is the macrotask boundary: every `dirty()`/`stale()` call made
    /// since the last run has been coalesced into at most one pass per root.
    pub fn run_until_stalled(&self) -> Result<()> {
        let mut pool = self.inner.pool.try_borrow_mut().map_err(|_| Error::Reentrant)?;
        pool.run_until_stalled();
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.tree.borrow().contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.tree.borrow().len()
    }

    pub fn state(&self, id: NodeId) -> Option<Value> {
        self.inner.tree.borrow().get(id).map(|slot| slot.state.clone())
    }

    pub fn render_state(&self, id: NodeId) -> Option<RenderState> {
        self.inner.tree.borrow().get(id).map(|slot| slot.render_state)
    }

    pub fn init_phase(&self, id: NodeId) -> Option<InitPhase> {
        self.inner.tree.borrow().get(id).map(|slot| slot.init_phase)
    }

    pub fn init_error(&self, id: NodeId) -> Option<String> {
        self.inner.tree.borrow().get(id).and_then(|slot| slot.init_error.clone())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.tree.borrow().get(id).and_then(|slot| slot.parent)
    }

    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        self.inner.tree.borrow().root_of(id)
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.inner.tree.borrow().is_root(id)
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.inner.tree.borrow().roots()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner.tree.borrow().children(id)
    }

    pub fn named_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.inner.tree.borrow().get(id).and_then(|slot| slot.named.get(name).copied())
    }

    pub fn handle(&self, id: NodeId) -> Option<ElementId> {
        self.inner.tree.borrow().get(id).and_then(|slot| slot.handle)
    }

    pub fn context(&self, id: NodeId) -> Option<RenderContext> {
        self.inner.tree.borrow().get(id).map(|slot| slot.context.clone())
    }

    /// Serialized output of a node, if it has a live output handle.
    pub fn output(&self, id: NodeId) -> Option<String> {
        let handle = self.live_handle(id)?;
        Some(self.with_surface(|s| s.inner_html(handle)))
    }

    /// Text content of a node's output, if it has a live output handle.
    pub fn text(&self, id: NodeId) -> Option<String> {
        let handle = self.live_handle(id)?;
        Some(self.with_surface(|s| s.text_content(handle)))
    }

    pub(crate) fn live_handle(&self, id: NodeId) -> Option<ElementId> {
        let handle = self.handle(id)?;
        self.with_surface(|s| s.is_live(handle)).then_some(handle)
    }

    // =========================================================================
    // Node factory & state
    // =========================================================================

    /// Create a child under `parent` and start its init.
    ///
    /// A `name` makes the child reachable through [`named_child`](Self::named_child);
    /// a previous child holding the same name is removed.
    pub fn make_child<C: Component>(&self, parent: NodeId, component: C, state: Value, name: Option<&str>) -> Result<NodeId> {
        let id = self.insert_child(parent, Box::new(component), state, name)?;
        self.start_init(id);
        Ok(id)
    }

    /// Register a child slot without starting init.
    pub(crate) fn insert_child(&self, parent: NodeId, component: Box<dyn Component>, state: Value, name: Option<&str>) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(Error::NodeNotFound(parent));
        }
        let id = NodeId::next();
        let replaced = {
            let mut tree = self.inner.tree.borrow_mut();
            let mut slot = NodeSlot::new(Some(parent), component, state);
            if let Some(parent_slot) = tree.get(parent) {
                slot.context = parent_slot.context.clone();
            }
            tree.insert_child(parent, id, slot, name)
        };
        if let Some(old) = replaced {
            tracing::debug!(%parent, %old, new = %id, "named child replaced");
            self.remove_node(old);
        }
        Ok(id)
    }

    /// Replace a node's state. Returns false, and schedules nothing, when
    /// the new state equals the current one.
    pub fn assign_state(&self, id: NodeId, state: Value) -> Result<bool> {
        let changed = {
            let mut tree = self.inner.tree.borrow_mut();
            let slot = tree.get_mut(id).ok_or(Error::NodeNotFound(id))?;
            if slot.state == state {
                false
            } else {
                slot.state = state;
                true
            }
        };
        if changed {
            self.mark(id, RenderState::Dirty)?;
        }
        Ok(changed)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(Error::NotAChild { parent, child });
        }
        self.remove_node(child);
        Ok(())
    }

    /// Remove the child registered under `name`. Returns false if none was.
    pub fn remove_named(&self, parent: NodeId, name: &str) -> Result<bool> {
        if !self.contains(parent) {
            return Err(Error::NodeNotFound(parent));
        }
        match self.named_child(parent, name) {
            Some(child) => {
                self.remove_node(child);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Detach output, run cleanup hooks (children first), then drop the
    /// subtree from the arena.
    pub(crate) fn remove_node(&self, id: NodeId) {
        let (order, handle, is_root) = {
            let tree = self.inner.tree.borrow();
            let Some(slot) = tree.get(id) else { return };
            (tree.pre_order(id), slot.handle, tree.is_root(id))
        };

        if let Some(handle) = handle {
            self.with_surface_mut(|s| {
                if is_root {
                    s.clear_contents(handle);
                    s.remove_native_listeners(handle);
                } else {
                    s.remove(handle);
                }
            });
        }

        for node in order.iter().rev().copied() {
            if let Some(cx) = self.node_cx(node) {
                self.with_component(node, |c| c.on_removed(&cx));
                for index in 0..self.plugin_count(node) {
                    self.with_plugin(node, index, |p| p.on_removed(&cx));
                }
            }
            self.keyboard().cleanup_node(node);
        }

        let removed = self.inner.tree.borrow_mut().detach(id);
        tracing::debug!(node = %id, count = removed.len(), "subtree removed");
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Attach a plugin to a node.
    ///
    /// Before the node finished initializing, the plugin's init is joined
    /// with the node's own. Afterwards it runs immediately and the node is
    /// marked dirty once it resolves.
    pub fn attach_plugin<P: Plugin>(&self, id: NodeId, plugin: P) -> Result<()> {
        let (index, phase) = {
            let mut tree = self.inner.tree.borrow_mut();
            let slot = tree.get_mut(id).ok_or(Error::NodeNotFound(id))?;
            slot.plugins.push(Some(Box::new(plugin)));
            if slot.init_phase == InitPhase::Initializing {
                slot.pending_inits += 1;
            }
            (slot.plugins.len() - 1, slot.init_phase)
        };

        let node = self.node_ref(id);
        match phase {
            InitPhase::Uninitialized => {}
            InitPhase::Initializing => {
                if let Some(task) = self.with_plugin(id, index, |p| p.init(node)) {
                    self.spawn_init(id, task, InitSource::Plugin(index));
                }
            }
            InitPhase::Initialized => {
                if let Some(task) = self.with_plugin(id, index, |p| p.init(node)) {
                    let weak = self.weak();
                    self.spawn(async move {
                        let result = task.await;
                        if let Some(inner) = weak.upgrade() {
                            Runtime::from_inner(inner).late_plugin_ready(id, index, result);
                        }
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn plugin_count(&self, id: NodeId) -> usize {
        self.inner.tree.borrow().get(id).map_or(0, |slot| slot.plugins.len())
    }

    fn late_plugin_ready(&self, id: NodeId, index: usize, result: Result<()>) {
        match result {
            Ok(()) => {
                if let Some(cx) = self.node_cx(id) {
                    self.with_plugin(id, index, |p| p.load(&cx));
                }
            }
            Err(err) => tracing::warn!(node = %id, plugin = index, error = %err, "plugin init failed"),
        }
        if let Err(err) = self.mark(id, RenderState::Dirty) {
            tracing::debug!(node = %id, error = %err, "node gone before plugin init resolved");
        }
    }

    // =========================================================================
    // Init sequencing
    // =========================================================================

    /// Start the one-shot init of a node and of every plugin attached so
    /// far. Does nothing unless the node is still uninitialized.
    pub(crate) fn start_init(&self, id: NodeId) {
        let plugin_count = {
            let mut tree = self.inner.tree.borrow_mut();
            let Some(slot) = tree.get_mut(id) else { return };
            if slot.init_phase != InitPhase::Uninitialized {
                return;
            }
            slot.init_phase = InitPhase::Initializing;
            slot.pending_inits = 1 + slot.plugins.len();
            slot.plugins.len()
        };

        let node = self.node_ref(id);
        match self.with_component(id, |c| c.init(node.clone())) {
            Some(task) => self.spawn_init(id, task, InitSource::Node),
            None => self.init_step_done(id, InitSource::Node, Ok(())),
        }
        for index in 0..plugin_count {
            match self.with_plugin(id, index, |p| p.init(node.clone())) {
                Some(task) => self.spawn_init(id, task, InitSource::Plugin(index)),
                None => self.init_step_done(id, InitSource::Plugin(index), Ok(())),
            }
        }
    }

    fn spawn_init(&self, id: NodeId, task: InitTask, source: InitSource) {
        let weak = self.weak();
        self.spawn(async move {
            let result = task.await;
            if let Some(inner) = weak.upgrade() {
                Runtime::from_inner(inner).init_step_done(id, source, result);
            }
        });
    }

    fn init_step_done(&self, id: NodeId, source: InitSource, result: Result<()>) {
        let finished = {
            let mut tree = self.inner.tree.borrow_mut();
            let Some(slot) = tree.get_mut(id) else {
                tracing::debug!(node = %id, "init resolved for a removed node");
                return;
            };
            if let Err(err) = &result {
                match source {
                    InitSource::Node => {
                        tracing::error!(node = %id, error = %err, "init failed");
                        slot.flags.insert(NodeFlags::INIT_FAILED);
                        slot.init_error = Some(err.to_string());
                    }
                    InitSource::Plugin(index) => {
                        tracing::warn!(node = %id, plugin = index, error = %err, "plugin init failed");
                    }
                }
            }
            slot.pending_inits = slot.pending_inits.saturating_sub(1);
            slot.pending_inits == 0 && slot.init_phase == InitPhase::Initializing
        };
        if finished {
            self.finish_init(id);
        }
    }

    fn finish_init(&self, id: NodeId) {
        let failed = {
            let mut tree = self.inner.tree.borrow_mut();
            let parent_context = tree
                .get(id)
                .and_then(|slot| slot.parent)
                .and_then(|parent| tree.get(parent))
                .map(|parent| parent.context.clone());
            let Some(slot) = tree.get_mut(id) else { return };
            slot.init_phase = InitPhase::Initialized;
            if let Some(context) = parent_context {
                slot.context = context;
            }
            slot.flags.contains(NodeFlags::INIT_FAILED)
        };
        tracing::debug!(node = %id, failed, "init complete");

        if !failed {
            self.run_load(id);
        }
        if let Err(err) = self.mark(id, RenderState::Dirty) {
            tracing::debug!(node = %id, error = %err, "node removed during load");
        }
    }

    /// Run the load hook of a node, then of its plugins.
    pub(crate) fn run_load(&self, id: NodeId) {
        let Some(cx) = self.node_cx(id) else { return };
        self.with_component(id, |c| c.load(&cx));
        for index in 0..self.plugin_count(id) {
            self.with_plugin(id, index, |p| p.load(&cx));
        }
    }

    // =========================================================================
    // Hook plumbing
    // =========================================================================

    pub(crate) fn node_cx(&self, id: NodeId) -> Option<NodeCx<'_>> {
        let (state, context) = {
            let tree = self.inner.tree.borrow();
            let slot = tree.get(id)?;
            (slot.state.clone(), slot.context.clone())
        };
        Some(NodeCx::new(self, id, state, context))
    }

    /// Run `f` with the node's component taken out of its slot. Returns
    /// `None` if the node is gone or one of its hooks is already running.
    pub(crate) fn with_component<R>(&self, id: NodeId, f: impl FnOnce(&mut dyn Component) -> R) -> Option<R> {
        let mut component = self.inner.tree.borrow_mut().get_mut(id)?.component.take()?;
        let result = f(component.as_mut());
        if let Some(slot) = self.inner.tree.borrow_mut().get_mut(id) {
            slot.component = Some(component);
        }
        Some(result)
    }

    pub(crate) fn with_plugin<R>(&self, id: NodeId, index: usize, f: impl FnOnce(&mut dyn Plugin) -> R) -> Option<R> {
        let mut plugin = self.inner.tree.borrow_mut().get_mut(id)?.plugins.get_mut(index)?.take()?;
        let result = f(plugin.as_mut());
        if let Some(entry) = self.inner.tree.borrow_mut().get_mut(id).and_then(|slot| slot.plugins.get_mut(index)) {
            *entry = Some(plugin);
        }
        Some(result)
    }
}

// =============================================================================
// Tests
// =============================================================================
