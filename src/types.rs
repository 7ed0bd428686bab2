//! Core types shared across the engine.
//!
//! - [`NodeId`] - process-unique node identity
//! - [`ElementId`] - handle to an element on the output [`Surface`](crate::renderer::Surface)
//! - [`InitPhase`] / [`RenderState`] - per-node lifecycle state
//! - [`NodeFlags`] - bookkeeping bits the reconciler sets between visits

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Identity
// =============================================================================

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node. Allocated once, never reused for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (used in markup host attributes).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Handle to an element living on a [`Surface`](crate::renderer::Surface).
///
/// Element ids are scoped to their surface and are not reused; a handle
/// whose element was removed simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

// =============================================================================
// Lifecycle state
// =============================================================================

/// Where a node is in its one-shot init sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPhase {
    #[default]
    Uninitialized,
    /// Init task started but not resolved. Blocks a second start.
    Initializing,
    Initialized,
}

/// What the next pass has to do for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    Clean,
    /// Only the update hook needs to run; markup is kept.
    Stale,
    /// Markup must be regenerated.
    #[default]
    Dirty,
}

impl RenderState {
    /// Combine a pending request with the current state. Dirty wins over stale.
    pub(crate) fn escalate(self, request: RenderState) -> RenderState {
        match (self, request) {
            (RenderState::Dirty, _) | (_, RenderState::Dirty) => RenderState::Dirty,
            (RenderState::Stale, _) | (_, RenderState::Stale) => RenderState::Stale,
            _ => RenderState::Clean,
        }
    }
}

// =============================================================================
// Node flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Per-node bookkeeping bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const NONE = 0;
        /// Output was regenerated this pass; attach hook must run again.
        const NEEDS_LISTENERS = 1 << 0;
        /// Init task (or a joined plugin init) failed; render the placeholder.
        const INIT_FAILED = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_escalate() {
        assert_eq!(RenderState::Clean.escalate(RenderState::Stale), RenderState::Stale);
        assert_eq!(RenderState::Stale.escalate(RenderState::Dirty), RenderState::Dirty);
        assert_eq!(RenderState::Dirty.escalate(RenderState::Stale), RenderState::Dirty);
        assert_eq!(RenderState::Clean.escalate(RenderState::Clean), RenderState::Clean);
    }

    #[test]
    fn test_flags() {
        let mut flags = NodeFlags::NONE;
        flags.insert(NodeFlags::NEEDS_LISTENERS);
        assert!(flags.contains(NodeFlags::NEEDS_LISTENERS));
        assert!(!flags.contains(NodeFlags::INIT_FAILED));
        flags.remove(NodeFlags::NEEDS_LISTENERS);
        assert_eq!(flags, NodeFlags::NONE);
    }
}
