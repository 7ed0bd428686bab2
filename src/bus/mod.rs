//! Message Bus
//!
//! - [`message`] - keys, options, envelopes; `listen` / `emit` on the runtime
//! - [`bridge`] - native surface events turned into bus messages
//! - [`events`] - event type names
//!
//! # Flow
//!
//! ```text
//! surface event ──► root container listener ──► scan composed path
//!                                                  │ data-on-<type> marker
//!                                                  ▼
//!            emit(owner) ──► owner handlers ──► parent handlers ──► ... root
//! ```

pub(crate) mod bridge;
pub mod events;
pub mod message;

pub use message::{Attach, Callback, Key, ListenOptions, ListenerId, Message, MessageKey, NativeEvent, Scope};
