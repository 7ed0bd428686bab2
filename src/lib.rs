//! # spark-nodes
//!
//! Retained-mode component lifecycle engine for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for the
//! shared reactive state (location, keyboard).
//!
//! ## Architecture
//!
//! spark-nodes keeps a tree of stateful nodes in an arena. Each node owns a
//! component (a trait object with `render`/`update`/`init`/`load` hooks), an
//! opaque JSON state and a render state. Invalidations are coalesced into
//! one pass per root:
//! ```text
//! assign_state / dirty / stale → scheduler → flush → reconcile → surface
//!                                                       ↘ reattach listeners
//! ```
//!
//! Nodes talk through a typed message bus that bubbles along the ownership
//! tree. Native events on the surface are bridged onto the same bus.
//!
//! ## Modules
//!
//! - [`types`] - Core types (NodeId, RenderState, InitPhase, NodeFlags)
//! - [`engine`] - Node arena, Component/Plugin traits, Runtime
//! - [`pipeline`] - Scheduler, reconciler, mount, render context
//! - [`bus`] - Message bus and native event bridge
//! - [`primitives`] - Collections
//! - [`renderer`] - Markup buffer and output surface
//! - [`state`] - Keyboard, location, navigation registries

pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod renderer;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::Config;

pub use error::{DataError, Error, Result};

pub use engine::{ready, Component, InitTask, NodeCx, NodeRef, Plugin, RenderCx, Runtime, UpdateCx};

pub use pipeline::{MountTarget, RenderContext};

pub use bus::{
    events, Attach, Callback, Key, ListenOptions, ListenerId, Message, MessageKey, NativeEvent, Scope,
};

pub use primitives::Collection;

pub use renderer::{Content, Element, Markup, Phase, Surface};

pub use state::{
    // Keyboard
    KeyState, Keyboard, KeyboardEvent, Modifiers,
    // Location
    Location, LocationProvider,
    // Navigation
    NavigationCapture, Shared,
};
