//! `NodeRef` - a `'static` handle to a node, for use inside init tasks and
//! message callbacks that outlive a hook call.

use std::rc::Weak;

use serde_json::Value;

use super::component::Component;
use super::runtime::{Inner, Runtime};
use crate::bus::message::{MessageKey, Scope};
use crate::error::{Error, Result};
use crate::types::NodeId;

#[derive(Clone)]
pub struct NodeRef {
    rt: Weak<Inner>,
    id: NodeId,
}

impl NodeRef {
    pub(crate) fn new(rt: Weak<Inner>, id: NodeId) -> Self {
        Self { rt, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The runtime, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.rt.upgrade().map(Runtime::from_inner)
    }

    /// Whether the node still exists.
    pub fn is_alive(&self) -> bool {
        self.runtime().is_some_and(|rt| rt.contains(self.id))
    }

    pub fn state(&self) -> Option<Value> {
        self.runtime()?.state(self.id)
    }

    pub fn assign_state(&self, state: Value) -> Result<bool> {
        self.live()?.assign_state(self.id, state)
    }

    pub fn make_child<C: Component>(&self, component: C, state: Value, name: Option<&str>) -> Result<NodeId> {
        self.live()?.make_child(self.id, component, state, name)
    }

    pub fn dirty(&self) -> Result<()> {
        self.live()?.dirty(self.id)
    }

    pub fn stale(&self) -> Result<()> {
        self.live()?.stale(self.id)
    }

    pub fn emit_message(&self, key: MessageKey, data: Value, scope: Scope) -> Result<usize> {
        self.live()?.emit_message(self.id, key, data, scope)
    }

    fn live(&self) -> Result<Runtime> {
        self.runtime().ok_or(Error::NodeNotFound(self.id))
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef").field("id", &self.id).finish()
    }
}
