//! Error types.
//!
//! Two kinds matter to the engine:
//! - misuse (`UnresolvableTarget`, `CaptureAlreadyInstalled`, ...) is returned
//!   to the caller straight away;
//! - [`DataError`] is bad input from a collaborator. Raised from a render hook
//!   it is routed to [`Component::render_fallback`](crate::Component::render_fallback)
//!   instead of being treated as a render failure.

use crate::types::NodeId;

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mount target has no resolvable id.
    #[error("mount target could not be resolved to a container id")]
    UnresolvableTarget,

    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// The navigation capture is a single-install hook per runtime.
    #[error("navigation capture is already installed")]
    CaptureAlreadyInstalled,

    /// `run_until_stalled` was called from inside a hook it is driving.
    #[error("task pool is already running")]
    Reentrant,

    #[error("init failed: {0}")]
    Init(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Malformed data handed over by a collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("query parameter `{name}` has malformed value `{value}`")]
    Param { name: String, value: String },

    #[error("state does not match the expected shape: {0}")]
    State(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a render error from anything printable.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    /// Build an init error from anything printable.
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init(message.into())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(err.to_string())
    }
}
