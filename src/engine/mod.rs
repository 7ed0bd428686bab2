//! Engine - node arena, component/plugin traits and the runtime.
//!
//! The engine owns the core data structures:
//! - Tree: node slots keyed by `NodeId`, parent/child links, root records
//! - Component / Plugin: the hook traits user types implement
//! - Runtime: the handle every hook receives; owns tree, surface and task pool
//! - NodeRef: a weak, `'static` node handle for async init tasks
//!
//! # Architecture
//!
//! Nodes are NOT objects pointing at each other. They are slots in an
//! arena, linked by id:
//!
//! ```text
//! n1: Root  (parent=None, children=[n2, n3], handle=e1, state={..})
//! n2: Label (parent=n1,   children=[],       handle=e4, state={..})
//! n3: List  (parent=n1,   children=[n5, n6], collections={"rows": [n5, n6]})
//! ```
//!
//! Removing a subtree is a single arena operation, and a callback that
//! captured a `NodeRef` to a removed node simply finds nothing.

pub(crate) mod tree;
mod component;
mod cx;
mod node_ref;
mod plugin;
mod runtime;

pub use component::{ready, Component, InitTask};
pub use cx::{NodeCx, RenderCx, UpdateCx};
pub use node_ref::NodeRef;
pub use plugin::Plugin;
pub use runtime::Runtime;
