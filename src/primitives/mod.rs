//! Primitives - building blocks nodes use inside their own render logic.
//!
//! - [`collection`] - positionally reconciled lists of child nodes
//!
//! # Pattern
//!
//! A list owner keeps its items as a named collection and renders the
//! collection container in place; items are appended into that container
//! without re-rendering the owner.
//!
//! ```ignore
//! impl Component for TodoList {
//!     fn load(&mut self, cx: &NodeCx<'_>) {
//!         let rows = cx.state()["rows"].as_array().cloned().unwrap_or_default();
//!         let _ = cx.runtime().assign_collection(cx.id(), "rows", || TodoRow, rows);
//!     }
//!
//!     fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
//!         cx.open("h2").text("Todo").close();
//!         cx.collection("rows")
//!     }
//! }
//! ```

pub mod collection;

pub use collection::Collection;
