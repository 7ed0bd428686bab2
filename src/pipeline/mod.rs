//! Render Pipeline
//!
//! This module turns invalidations into output.
//!
//! # Pipeline Architecture
//!
//! ```text
//! dirty()/stale()/assign_state() ─► scheduler ─► flush ─► reconcile ─► reattach listeners
//! ```
//!
//! ## Data Flow
//!
//! 1. **scheduler** - records requests, raises one pending flag per root
//! 2. **context** - each flush bumps the frame counter and snapshots the location
//! 3. **reconcile** - dirty nodes re-render, stale nodes update, clean nodes recurse
//! 4. **mount** - roots are attached to surface containers
//!
//! ## Key Design Principles
//!
//! - **Coalescing**: any number of requests before a flush produce one pass
//! - **Isolation**: a failing hook affects only its own node
//! - **No diffing**: a dirty node's output is replaced wholesale

pub mod context;
pub mod mount;
mod reconcile;
mod scheduler;

pub use context::RenderContext;
pub use mount::MountTarget;
