//! Output side of the engine.
//!
//! - [`Markup`] - the buffer a render hook writes into
//! - [`Surface`] - the retained element tree the buffer is materialized on

mod markup;
mod surface;

pub use markup::Markup;
pub use surface::{Content, Element, Phase, Surface};

pub(crate) use surface::Materialized;
