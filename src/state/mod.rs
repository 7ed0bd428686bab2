//! State Module - runtime-wide registries shared by every node
//!
//! - **Keyboard** - global key handler registry
//! - **Location** - current path/host/query, invalidated on navigation
//! - **Navigation** - link-click capture
//!
//! All of them live in one [`Shared`] object owned by the runtime and
//! handed to nodes by reference; there are no process-wide singletons.

pub mod keyboard;
pub mod location;
pub mod navigation;

pub use keyboard::{KeyState, Keyboard, KeyboardEvent, Modifiers};
pub use location::{Location, LocationProvider};
pub use navigation::NavigationCapture;

/// Registries shared across a runtime.
#[derive(Debug, Default)]
pub struct Shared {
    pub keyboard: Keyboard,
    pub location: LocationProvider,
    pub navigation: NavigationCapture,
}
