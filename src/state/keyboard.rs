//! Keyboard Module - Keyboard event state and handler registry
//!
//! Global input registry that nodes subscribe to outside the normal
//! output-tree listener path. One [`Keyboard`] lives in the runtime's
//! [`Shared`](super::Shared) registry and is reached through
//! [`Runtime::keyboard`](crate::Runtime::keyboard).
//!
//! # API
//!
//! - `last_event` - Get last keyboard event
//! - `last_key` - Get last key pressed
//! - `on(handler)` - Subscribe to all keyboard events
//! - `on_key(key, fn)` - Subscribe to specific key(s)
//! - `on_node(id, fn)` - Subscribe on behalf of a node; dropped when it is removed
//! - `dispatch_to_node(id, event)` - Deliver to one node's handlers
//!
//! # Example
//!
//! ```ignore
//! let cleanup = runtime.keyboard().on_key("Enter", || {
//!     println!("Enter pressed!");
//!     true // Consume event
//! });
//! runtime.keyboard().dispatch(KeyboardEvent::new("Enter"));
//! cleanup();
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crossterm::event::{KeyCode, KeyEvent as CrosstermKeyEvent, KeyEventKind, KeyModifiers};
use spark_signals::{signal, Signal};

use crate::types::NodeId;

// =============================================================================
// TYPES
// =============================================================================

/// Keyboard modifier state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Create modifiers with ctrl
    pub fn ctrl() -> Self {
        Self { ctrl: true, ..Self::default() }
    }

    /// Create modifiers with shift
    pub fn shift() -> Self {
        Self { shift: true, ..Self::default() }
    }
}

/// Key event state (press, repeat, release)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    #[default]
    Press,
    Repeat,
    Release,
}

/// Keyboard event
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    /// The key that was pressed (e.g., "a", "Enter", "ArrowUp")
    pub key: String,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyboardEvent {
    /// Create a simple key press event
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), modifiers: Modifiers::default(), state: KeyState::Press }
    }

    /// Create a key press with modifiers
    pub fn with_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self { key: key.into(), modifiers, state: KeyState::Press }
    }
}

impl From<CrosstermKeyEvent> for KeyboardEvent {
    fn from(event: CrosstermKeyEvent) -> Self {
        let key = match event.code {
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".to_string(),
            KeyCode::Tab | KeyCode::BackTab => "Tab".to_string(),
            KeyCode::Backspace => "Backspace".to_string(),
            KeyCode::Delete => "Delete".to_string(),
            KeyCode::Esc => "Escape".to_string(),
            KeyCode::Up => "ArrowUp".to_string(),
            KeyCode::Down => "ArrowDown".to_string(),
            KeyCode::Left => "ArrowLeft".to_string(),
            KeyCode::Right => "ArrowRight".to_string(),
            KeyCode::Home => "Home".to_string(),
            KeyCode::End => "End".to_string(),
            KeyCode::PageUp => "PageUp".to_string(),
            KeyCode::PageDown => "PageDown".to_string(),
            KeyCode::F(n) => format!("F{}", n),
            KeyCode::Insert => "Insert".to_string(),
            _ => String::new(),
        };

        let state = match event.kind {
            KeyEventKind::Press => KeyState::Press,
            KeyEventKind::Repeat => KeyState::Repeat,
            KeyEventKind::Release => KeyState::Release,
        };

        let mods = event.modifiers;
        Self {
            key,
            modifiers: Modifiers {
                ctrl: mods.contains(KeyModifiers::CONTROL),
                alt: mods.contains(KeyModifiers::ALT),
                shift: mods.contains(KeyModifiers::SHIFT) || event.code == KeyCode::BackTab,
                meta: mods.contains(KeyModifiers::META) || mods.contains(KeyModifiers::SUPER),
            },
            state,
        }
    }
}

/// Handler for keyboard events. Return true to consume the event.
pub type KeyHandler = Rc<dyn Fn(&KeyboardEvent) -> bool>;

/// Handler for specific key. Return true to consume the event.
pub type KeySpecificHandler = Rc<dyn Fn() -> bool>;

// =============================================================================
// HANDLER REGISTRY
// =============================================================================

#[derive(Default)]
struct HandlerRegistry {
    global_handlers: Vec<(usize, KeyHandler)>,
    key_handlers: HashMap<String, Vec<(usize, KeySpecificHandler)>>,
    node_handlers: HashMap<NodeId, Vec<(usize, KeyHandler)>>,
    next_id: usize,
}

impl HandlerRegistry {
    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Keyboard state and handler registry.
pub struct Keyboard {
    registry: Rc<RefCell<HandlerRegistry>>,
    last_event: Signal<Option<KeyboardEvent>>,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyboard").field("last_event", &self.last_event()).finish_non_exhaustive()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(HandlerRegistry::default())),
            last_event: signal(None),
        }
    }

    /// Get the last keyboard event
    pub fn last_event(&self) -> Option<KeyboardEvent> {
        self.last_event.get()
    }

    /// Get the last key pressed
    pub fn last_key(&self) -> String {
        self.last_event().map(|e| e.key).unwrap_or_default()
    }

    // =========================================================================
    // EVENT DISPATCH
    // =========================================================================

    /// Dispatch to key-specific then global handlers.
    /// Returns true if any handler consumed the event.
    ///
    /// Only press events reach handlers; every event updates `last_event`.
    pub fn dispatch(&self, event: KeyboardEvent) -> bool {
        self.last_event.set(Some(event.clone()));

        if event.state != KeyState::Press {
            return false;
        }

        // Snapshot so handlers may (un)register while we iterate.
        let (key_handlers, global_handlers): (Vec<KeySpecificHandler>, Vec<KeyHandler>) = {
            let reg = self.registry.borrow();
            let keyed = reg
                .key_handlers
                .get(&event.key)
                .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default();
            let global = reg.global_handlers.iter().map(|(_, h)| h.clone()).collect();
            (keyed, global)
        };

        for handler in key_handlers {
            if handler() {
                return true;
            }
        }
        for handler in global_handlers {
            if handler(&event) {
                return true;
            }
        }
        false
    }

    /// Dispatch to the handlers one node registered.
    /// Returns true if consumed.
    pub fn dispatch_to_node(&self, node: NodeId, event: &KeyboardEvent) -> bool {
        if event.state != KeyState::Press {
            return false;
        }
        let handlers: Vec<KeyHandler> = self
            .registry
            .borrow()
            .node_handlers
            .get(&node)
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        handlers.into_iter().any(|handler| handler(event))
    }

    // =========================================================================
    // SUBSCRIPTION
    // =========================================================================

    /// Subscribe to all keyboard events.
    /// Return true from handler to consume the event.
    /// Returns cleanup function.
    pub fn on<F>(&self, handler: F) -> impl FnOnce() + use<F>
    where
        F: Fn(&KeyboardEvent) -> bool + 'static,
    {
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.global_handlers.push((id, Rc::new(handler)));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        move || {
            with_registry(&registry, |reg| {
                reg.global_handlers.retain(|(handler_id, _)| *handler_id != id);
            });
        }
    }

    /// Subscribe to a specific key.
    /// Returns cleanup function.
    pub fn on_key<F>(&self, key: &str, handler: F) -> impl FnOnce() + use<F>
    where
        F: Fn() -> bool + 'static,
    {
        let key = key.to_string();
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.key_handlers.entry(key.clone()).or_default().push((id, Rc::new(handler)));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        move || {
            with_registry(&registry, |reg| {
                if let Some(handlers) = reg.key_handlers.get_mut(&key) {
                    handlers.retain(|(handler_id, _)| *handler_id != id);
                    if handlers.is_empty() {
                        reg.key_handlers.remove(&key);
                    }
                }
            });
        }
    }

    /// Subscribe on behalf of a node. The handler is dropped when the
    /// node is removed, even if the cleanup is never called.
    pub fn on_node<F>(&self, node: NodeId, handler: F) -> impl FnOnce() + use<F>
    where
        F: Fn(&KeyboardEvent) -> bool + 'static,
    {
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.node_handlers.entry(node).or_default().push((id, Rc::new(handler)));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        move || {
            with_registry(&registry, |reg| {
                if let Some(handlers) = reg.node_handlers.get_mut(&node) {
                    handlers.retain(|(handler_id, _)| *handler_id != id);
                    if handlers.is_empty() {
                        reg.node_handlers.remove(&node);
                    }
                }
            });
        }
    }

    /// Clean up all handlers for a node.
    /// Called when the node is removed.
    pub fn cleanup_node(&self, node: NodeId) {
        self.registry.borrow_mut().node_handlers.remove(&node);
    }

    /// Number of handlers registered for a node.
    pub fn node_handler_count(&self, node: NodeId) -> usize {
        self.registry.borrow().node_handlers.get(&node).map_or(0, Vec::len)
    }
}

fn with_registry(registry: &Weak<RefCell<HandlerRegistry>>, f: impl FnOnce(&mut HandlerRegistry)) {
    if let Some(registry) = registry.upgrade() {
        f(&mut registry.borrow_mut());
    }
}

// =============================================================================
// TESTS
// =============================================================================
