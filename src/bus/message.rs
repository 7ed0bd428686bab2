//! Message bus - per-node handler registry and ownership-chain bubbling.
//!
//! Handlers are registered per node and per event type. `emit` runs the
//! matching handlers of a node in registration order and, for
//! [`Scope::Bubble`], replays the same message on each ancestor up to the
//! root. Bubbling follows the ownership tree, not the layout of the
//! rendered output.
//!
//! Passive listeners registered on a non-root node are moved to the root
//! (as active ones), so "global" listeners end up in one registry.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use super::events::{is_output_event, MESSAGE};
use crate::engine::Runtime;
use crate::error::{Error, Result};
use crate::renderer::Phase;
use crate::types::{ElementId, NodeId};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Keys
// =============================================================================

/// A typed message token. Every `MessageKey::new` call yields a distinct
/// key; two keys match only if they are copies of the same one, whatever
/// their names.
#[derive(Debug, Clone, Copy)]
pub struct MessageKey {
    id: u64,
    name: &'static str,
}

impl MessageKey {
    pub fn new(name: &'static str) -> Self {
        Self { id: NEXT_KEY.fetch_add(1, Ordering::Relaxed), name }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageKey {}

impl std::hash::Hash for MessageKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Key a handler listens for, or a message is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Wildcard: a handler listening for `Any` receives every message of
    /// its event type.
    Any,
    Token(MessageKey),
}

impl Key {
    /// Whether a handler registered for `self` receives a message sent
    /// with `sent`.
    pub fn matches(&self, sent: &Key) -> bool {
        match (self, sent) {
            (Key::Any, _) => true,
            (Key::Token(own), Key::Token(other)) => own == other,
            (Key::Token(_), Key::Any) => false,
        }
    }
}

impl From<MessageKey> for Key {
    fn from(key: MessageKey) -> Self {
        Key::Token(key)
    }
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Attach {
    /// Stay on the registering node.
    #[default]
    Active,
    /// Move to the root of the registering node.
    Passive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Node only: the emit is not replayed on ancestors.
    Single,
    /// Node and its ancestors.
    #[default]
    Bubble,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    pub attach: Attach,
    pub scope: Scope,
}

impl ListenOptions {
    pub fn passive() -> Self {
        Self { attach: Attach::Passive, ..Self::default() }
    }

    pub fn single() -> Self {
        Self { scope: Scope::Single, ..Self::default() }
    }
}

// =============================================================================
// Messages & handlers
// =============================================================================

/// Native event that caused a bridged message.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    pub event_type: String,
    pub target: ElementId,
    /// Element carrying the marker that produced this message.
    pub current_target: ElementId,
    pub phase: Phase,
}

/// The envelope handed to every callback.
#[derive(Debug, Clone)]
pub struct Message {
    pub event_type: String,
    pub key: Key,
    pub event: Option<NativeEvent>,
    pub data: Value,
    /// Node `emit` was called on.
    pub origin: NodeId,
    /// Node whose handlers are running.
    pub current: NodeId,
}

pub type Callback = Rc<dyn Fn(&Runtime, &Message)>;

/// Returned by [`Runtime::listen`]; pass to [`Runtime::unlisten`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    /// Node the handler ended up on (the root for redirected listeners).
    pub node: NodeId,
    seq: u64,
}

pub(crate) struct HandlerEntry {
    pub seq: u64,
    pub key: Key,
    pub options: ListenOptions,
    pub callback: Callback,
}

// =============================================================================
// Runtime API
// =============================================================================

impl Runtime {
    /// Register `callback` for `event_type` messages matching `key` on `node`.
    pub fn listen<F>(&self, node: NodeId, event_type: &str, key: impl Into<Key>, options: ListenOptions, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Runtime, &Message) + 'static,
    {
        let key = key.into();
        let root = self.root_of(node).ok_or(Error::NodeNotFound(node))?;
        let (target, options) = if options.attach == Attach::Passive && root != node {
            tracing::debug!(%node, %root, event_type, "passive listener redirected to root");
            (root, ListenOptions { attach: Attach::Active, ..options })
        } else {
            (node, options)
        };

        let seq = NEXT_LISTENER.fetch_add(1, Ordering::Relaxed);
        {
            let mut tree = self.inner().tree.borrow_mut();
            let slot = tree.get_mut(target).ok_or(Error::NodeNotFound(target))?;
            slot.handlers.entry(event_type.to_string()).or_default().push(HandlerEntry {
                seq,
                key,
                options,
                callback: Rc::new(callback),
            });
        }
        self.remember_key(key);
        if is_output_event(event_type) {
            self.ensure_native_listener(target, event_type);
        }
        Ok(ListenerId { node: target, seq })
    }

    /// [`listen`](Self::listen) for generic messages.
    pub fn listen_message<F>(&self, node: NodeId, key: impl Into<Key>, options: ListenOptions, callback: F) -> Result<ListenerId>
    where
        F: Fn(&Runtime, &Message) + 'static,
    {
        self.listen(node, MESSAGE, key, options, callback)
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unlisten(&self, listener: ListenerId) -> bool {
        let mut tree = self.inner().tree.borrow_mut();
        let Some(slot) = tree.get_mut(listener.node) else { return false };
        let mut removed = false;
        for entries in slot.handlers.values_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.seq != listener.seq);
            removed |= entries.len() != before;
        }
        slot.handlers.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Number of handlers registered directly on `node`.
    pub fn handler_count(&self, node: NodeId) -> usize {
        self.inner().tree.borrow().get(node).map_or(0, |slot| slot.handlers.values().map(Vec::len).sum())
    }

    /// Deliver a message to `node`'s matching handlers, then, for
    /// [`Scope::Bubble`], to each ancestor's. Returns how many handlers ran.
    pub fn emit(&self, node: NodeId, event_type: &str, key: impl Into<Key>, event: Option<NativeEvent>, data: Value, scope: Scope) -> Result<usize> {
        if !self.contains(node) {
            return Err(Error::NodeNotFound(node));
        }
        let mut message = Message {
            event_type: event_type.to_string(),
            key: key.into(),
            event,
            data,
            origin: node,
            current: node,
        };

        let mut fired = 0;
        let mut current = Some(node);
        while let Some(id) = current {
            // Snapshot: callbacks may listen/unlisten while running.
            let callbacks: Vec<Callback> = {
                let tree = self.inner().tree.borrow();
                tree.get(id)
                    .and_then(|slot| slot.handlers.get(event_type))
                    .map(|entries| {
                        entries
                            .iter()
                            .filter(|entry| entry.key.matches(&message.key))
                            .map(|entry| entry.callback.clone())
                            .collect()
                    })
                    .unwrap_or_default()
            };

            message.current = id;
            for callback in callbacks {
                callback(self, &message);
                fired += 1;
            }

            if scope != Scope::Bubble {
                break;
            }
            current = self.parent(id).filter(|parent| *parent != id);
        }
        Ok(fired)
    }

    /// Send a generic node-to-node message.
    pub fn emit_message(&self, node: NodeId, key: MessageKey, data: Value, scope: Scope) -> Result<usize> {
        self.emit(node, MESSAGE, key, None, data, scope)
    }

    /// Make a key resolvable from its id, for marker decoding.
    pub(crate) fn remember_key(&self, key: Key) {
        if let Key::Token(key) = key {
            self.inner().keys.borrow_mut().entry(key.id()).or_insert(key);
        }
    }

    pub(crate) fn key_by_id(&self, id: u64) -> Option<MessageKey> {
        self.inner().keys.borrow().get(&id).copied()
    }
}
