//! The component trait.
//!
//! A concrete node type implements [`Component`]; the runtime holds it as
//! `Box<dyn Component>` and calls its hooks at fixed points:
//!
//! ```text
//! make_child / mount ──► init (async, once) ──► load ──► dirty
//!                                                         │
//!           pass: dirty ──► render ──► update ──► attach  │
//!                 stale ──────────────► update            │
//!                                                         ▼
//!                                        remove ──► on_removed
//! ```

use futures::future::LocalBoxFuture;

use super::cx::{NodeCx, RenderCx, UpdateCx};
use super::node_ref::NodeRef;
use crate::error::{DataError, Result};

/// Future returned by `init` hooks. Runs on the runtime's local pool.
pub type InitTask = LocalBoxFuture<'static, Result<()>>;

/// An init task that resolves immediately.
pub fn ready() -> InitTask {
    Box::pin(async { Ok(()) })
}

pub trait Component: 'static {
    /// One-shot asynchronous setup. The returned task may keep `node` and
    /// use it after awaiting (assign state, make children, ...).
    ///
    /// A failure makes the node render an error placeholder instead of
    /// calling [`render`](Self::render).
    fn init(&mut self, node: NodeRef) -> InitTask {
        let _ = node;
        ready()
    }

    /// Runs after init and again whenever the location changes. Must be
    /// safe to call repeatedly.
    fn load(&mut self, cx: &NodeCx<'_>) {
        let _ = cx;
    }

    /// Write the node's whole output into `cx`.
    fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()>;

    /// Output used when [`render`](Self::render) fails with a data error.
    fn render_fallback(&mut self, cx: &mut RenderCx<'_>, error: &DataError) {
        cx.open("div").attr("class", "data-error").text(error.to_string()).close();
    }

    /// Incremental update against the existing output. Failures are logged
    /// and otherwise ignored.
    fn update(&mut self, cx: &UpdateCx<'_>) -> Result<()> {
        let _ = cx;
        Ok(())
    }

    /// Bind to freshly regenerated output. Not called when only an update
    /// ran.
    fn attach(&mut self, cx: &UpdateCx<'_>) {
        let _ = cx;
    }

    /// Cleanup when the node is detached from its parent.
    fn on_removed(&mut self, cx: &NodeCx<'_>) {
        let _ = cx;
    }
}
