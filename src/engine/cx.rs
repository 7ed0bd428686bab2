//! Hook contexts.
//!
//! - [`NodeCx`] - identity, state snapshot and render context of a node
//! - [`RenderCx`] - a `NodeCx` plus the markup buffer being written
//! - [`UpdateCx`] - a `NodeCx` plus the node's live output handle

use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::node_ref::NodeRef;
use super::runtime::Runtime;
use crate::bus::message::{Key, MessageKey};
use crate::error::{DataError, Error, Result};
use crate::pipeline::context::RenderContext;
use crate::renderer::{Markup, Surface};
use crate::types::{ElementId, NodeId};

// =============================================================================
// NodeCx
// =============================================================================

pub struct NodeCx<'a> {
    rt: &'a Runtime,
    id: NodeId,
    state: Value,
    context: RenderContext,
}

impl<'a> NodeCx<'a> {
    pub(crate) fn new(rt: &'a Runtime, id: NodeId, state: Value, context: RenderContext) -> Self {
        Self { rt, id, state, context }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn runtime(&self) -> &'a Runtime {
        self.rt
    }

    /// State as it was when the hook started.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// State deserialized into a concrete type. A mismatch is a data error.
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.state.clone()).map_err(|e| Error::Data(DataError::from(e)))
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn node_ref(&self) -> NodeRef {
        self.rt.node_ref(self.id)
    }
}

// =============================================================================
// RenderCx
// =============================================================================

/// Render hook context. Derefs to the [`Markup`] buffer.
pub struct RenderCx<'a> {
    node: NodeCx<'a>,
    markup: &'a mut Markup,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(node: NodeCx<'a>, markup: &'a mut Markup) -> Self {
        Self { node, markup }
    }

    pub fn node(&self) -> &NodeCx<'a> {
        &self.node
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn state(&self) -> &Value {
        &self.node.state
    }

    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T> {
        self.node.state_as()
    }

    pub fn context(&self) -> &RenderContext {
        &self.node.context
    }

    pub fn runtime(&self) -> &'a Runtime {
        self.node.rt
    }

    /// Embed a child node's output here. The child is rendered inline into
    /// this buffer and gets the host element as its output handle.
    pub fn child(&mut self, child: NodeId) -> Result<()> {
        let rt = self.node.rt;
        if rt.parent(child) != Some(self.node.id) {
            return Err(Error::NotAChild { parent: self.node.id, child });
        }
        rt.set_context(child, &self.node.context);
        let depth = self.markup.depth();
        self.markup.open_host(child, &rt.config().host_tag);
        rt.render_into(child, self.markup);
        self.markup.close_to(depth);
        Ok(())
    }

    /// Embed the child registered under `name`. Missing names render nothing.
    pub fn child_named(&mut self, name: &str) -> Result<()> {
        match self.node.rt.named_child(self.node.id, name) {
            Some(child) => self.child(child),
            None => Ok(()),
        }
    }

    /// Emit the container of a collection with every item embedded. The
    /// container is written even when the collection is empty so later
    /// appends can go straight into it.
    pub fn collection(&mut self, name: &str) -> Result<()> {
        let rt = self.node.rt;
        let items = rt.collection(self.node.id, name);
        let depth = self.markup.depth();
        self.markup.open_collection(name, &rt.config().collection_tag);
        for item in items {
            self.child(item)?;
        }
        self.markup.close_to(depth);
        Ok(())
    }

    /// Mark the innermost open element so a native `event_type` event on
    /// it emits `key` from this node.
    pub fn on(&mut self, event_type: &str, key: MessageKey) -> &mut Self {
        let rt = self.node.rt;
        let attr = rt.config().marker_attr(event_type);
        let marker = crate::bus::bridge::append_marker(self.markup.current_attr(&attr), key);
        rt.remember_key(Key::Token(key));
        rt.ensure_native_listener(self.node.id, event_type);
        self.markup.attr(attr, marker);
        self
    }

    /// Attach JSON side-data to the innermost open element.
    pub fn payload(&mut self, data: &Value) -> &mut Self {
        let attr = self.node.rt.config().payload_attr.clone();
        self.markup.attr(attr, data.to_string());
        self
    }
}

impl Deref for RenderCx<'_> {
    type Target = Markup;

    fn deref(&self) -> &Markup {
        self.markup
    }
}

impl DerefMut for RenderCx<'_> {
    fn deref_mut(&mut self) -> &mut Markup {
        self.markup
    }
}

// =============================================================================
// UpdateCx
// =============================================================================

/// Update/attach hook context. Derefs to [`NodeCx`].
pub struct UpdateCx<'a> {
    node: NodeCx<'a>,
    handle: ElementId,
}

impl<'a> UpdateCx<'a> {
    pub(crate) fn new(node: NodeCx<'a>, handle: ElementId) -> Self {
        Self { node, handle }
    }

    /// The node's output element.
    pub fn handle(&self) -> ElementId {
        self.handle
    }

    /// Read the surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&Surface) -> R) -> R {
        self.node.rt.with_surface(f)
    }

    /// Mutate the surface in place (attribute tweaks, text changes).
    pub fn with_surface_mut<R>(&self, f: impl FnOnce(&mut Surface) -> R) -> R {
        self.node.rt.with_surface_mut(f)
    }
}

impl<'a> Deref for UpdateCx<'a> {
    type Target = NodeCx<'a>;

    fn deref(&self) -> &NodeCx<'a> {
        &self.node
    }
}
