//! Output-event bridge - native events on the surface become bus messages.
//!
//! A render marks elements with `data-on-<type>="<key id> <key id> ..."`
//! (see [`RenderCx::on`](crate::RenderCx::on)) and optionally attaches JSON
//! side-data in `data-payload`. One native listener per (root container,
//! event type) is recorded on the surface. When a native event arrives,
//! its composed path is scanned from the target outwards; every key listed
//! on a marked element is emitted once, bubbling, on the node that rendered
//! that element.
//!
//! Event types that do not propagate (focus, blur, scroll, ...) only reach
//! a listener installed in the capture phase.

use serde_json::Value;

use super::events::{is_output_event, CLICK};
use super::message::{Key, MessageKey, NativeEvent, Scope};
use crate::engine::Runtime;
use crate::error::Result;
use crate::renderer::Phase;
use crate::types::{ElementId, NodeId};

// =============================================================================
// Marker encoding
// =============================================================================

/// Add `key` to an existing marker attribute value.
pub(crate) fn append_marker(existing: Option<&str>, key: MessageKey) -> String {
    let id = key.id().to_string();
    match existing {
        Some(value) if value.split_whitespace().any(|token| token == id) => value.to_string(),
        Some(value) if !value.trim().is_empty() => format!("{} {}", value.trim(), id),
        _ => id,
    }
}

/// Key ids listed in a marker attribute. Malformed tokens are dropped.
pub(crate) fn parse_marker(value: &str) -> Vec<u64> {
    value
        .split_whitespace()
        .filter_map(|token| match token.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(token, "malformed message key in marker");
                None
            }
        })
        .collect()
}

/// Decode side-data. Missing data is `null`, and so is malformed data.
pub(crate) fn decode_payload(raw: Option<&str>) -> Value {
    let Some(raw) = raw else { return Value::Null };
    serde_json::from_str(raw).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "malformed event payload");
        Value::Null
    })
}

/// One marked element found on a composed path.
struct Hit {
    element: ElementId,
    owner: NodeId,
    keys: Vec<u64>,
    data: Value,
}

// =============================================================================
// Runtime API
// =============================================================================

impl Runtime {
    /// Make sure the root container of `node` has a native listener for
    /// `event_type`. Returns true if one was installed now.
    pub(crate) fn ensure_native_listener(&self, node: NodeId, event_type: &str) -> bool {
        if !is_output_event(event_type) {
            return false;
        }
        let Some(container) = self.root_of(node).and_then(|root| self.handle(root)) else {
            return false;
        };
        let phase = if self.config().is_capture_event(event_type) { Phase::Capture } else { Phase::Bubble };
        let added = self.with_surface_mut(|s| s.add_native_listener(container, event_type, phase));
        if added {
            tracing::debug!(%container, event_type, ?phase, "native listener installed");
        }
        added
    }

    /// Deliver a native `event_type` event fired on `target`. Returns the
    /// number of bus handlers that ran.
    pub fn dispatch_native(&self, target: ElementId, event_type: &str) -> usize {
        let Some(container) = self.with_surface(|s| s.container_of(target)) else {
            tracing::debug!(%target, "native event on a detached element");
            return 0;
        };
        let Some(phase) = self.with_surface(|s| s.native_listener(container, event_type)) else {
            return 0;
        };
        if self.config().is_capture_event(event_type) && phase != Phase::Capture {
            return 0;
        }

        let marker_attr = self.config().marker_attr(event_type);
        let payload_attr = self.config().payload_attr.as_str();
        let hits: Vec<Hit> = self.with_surface(|s| {
            s.composed_path(target)
                .into_iter()
                .filter_map(|element| {
                    let marker = s.attr(element, &marker_attr)?;
                    let owner = s.owner(element)?;
                    Some(Hit {
                        element,
                        owner,
                        keys: parse_marker(marker),
                        data: decode_payload(s.attr(element, payload_attr)),
                    })
                })
                .collect()
        });

        let mut fired = 0;
        for hit in hits {
            for id in hit.keys {
                let Some(key) = self.key_by_id(id) else {
                    tracing::warn!(key = id, "marker names an unknown message key");
                    continue;
                };
                let event = NativeEvent {
                    event_type: event_type.to_string(),
                    target,
                    current_target: hit.element,
                    phase,
                };
                match self.emit(hit.owner, event_type, Key::Token(key), Some(event), hit.data.clone(), Scope::Bubble) {
                    Ok(count) => fired += count,
                    Err(err) => tracing::debug!(node = %hit.owner, error = %err, "marker owner is gone"),
                }
            }
        }

        if event_type == CLICK {
            let current = self.location();
            let location = self.with_surface(|s| self.shared().navigation.resolve(s, target, &current));
            if let Some(location) = location {
                self.navigate(location);
            }
        }
        fired
    }

    /// Turn clicks on in-app links into [`navigate`](Self::navigate) calls.
    /// May be installed once per runtime.
    pub fn install_navigation_capture(&self) -> Result<()> {
        self.shared().navigation.install()?;
        for root in self.roots() {
            self.ensure_native_listener(root, CLICK);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::bus::events::{FOCUS, MESSAGE};
    use crate::bus::message::{ListenOptions, Message};
    use crate::engine::{Component, RenderCx};
    use crate::error::Error;
    use crate::pipeline::MountTarget;
    use crate::state::Location;

    #[test]
    fn test_append_marker() {
        let a = MessageKey::new("a");
        let b = MessageKey::new("b");
        let first = append_marker(None, a);
        assert_eq!(first, a.id().to_string());
        let both = append_marker(Some(&first), b);
        assert_eq!(parse_marker(&both), vec![a.id(), b.id()]);
        assert_eq!(append_marker(Some(&both), a), both);
    }

    #[test]
    fn test_parse_marker_skips_garbage() {
        assert_eq!(parse_marker("3 x 7"), vec![3, 7]);
        assert!(parse_marker("").is_empty());
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(None), Value::Null);
        assert_eq!(decode_payload(Some("{\"id\":4}")), json!({"id": 4}));
        assert_eq!(decode_payload(Some("{broken")), Value::Null);
    }

    /// A button that emits `press` on click and `focused` on focus.
    struct Button {
        press: MessageKey,
        focused: MessageKey,
    }

    impl Component for Button {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            let payload = cx.state().clone();
            cx.open("button");
            cx.on(CLICK, self.press).on(FOCUS, self.focused).payload(&payload);
            cx.open("span").text("go").close();
            cx.close();
            Ok(())
        }
    }

    struct Shell;

    impl Component for Shell {
        fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
            cx.open("main");
            for child in cx.runtime().children(cx.id()) {
                cx.child(child)?;
            }
            cx.close();
            Ok(())
        }
    }

    fn span_of(rt: &Runtime, node: NodeId) -> ElementId {
        let host = rt.handle(node).unwrap();
        rt.with_surface(|s| {
            let button = match s.get(host).unwrap().children.first() {
                Some(crate::renderer::Content::Element(id)) => *id,
                other => panic!("unexpected content {:?}", other),
            };
            match s.get(button).unwrap().children.first() {
                Some(crate::renderer::Content::Element(id)) => *id,
                other => panic!("unexpected content {:?}", other),
            }
        })
    }

    #[test]
    fn test_click_bubbles_from_owner() {
        let press = MessageKey::new("press");
        let focused = MessageKey::new("focused");
        let rt = Runtime::new();
        let root = rt.mount(Shell, MountTarget::Id("app"), Value::Null).unwrap();
        let button = rt.make_child(root, Button { press, focused }, json!({"row": 2}), None).unwrap();
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();

        let seen: Rc<RefCell<Vec<Message>>> = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        rt.listen(root, CLICK, press, ListenOptions::default(), move |_, msg| log.borrow_mut().push(msg.clone()))
            .unwrap();

        let container = rt.handle(root).unwrap();
        assert_eq!(rt.with_surface(|s| s.native_listener(container, CLICK)), Some(Phase::Bubble));
        assert_eq!(rt.with_surface(|s| s.native_listener(container, FOCUS)), Some(Phase::Capture));

        assert_eq!(rt.dispatch_native(span_of(&rt, button), CLICK), 1);
        let seen = seen.borrow();
        assert_eq!(seen[0].origin, button);
        assert_eq!(seen[0].current, root);
        assert_eq!(seen[0].data, json!({"row": 2}));
        assert_eq!(seen[0].event.as_ref().unwrap().phase, Phase::Bubble);
    }

    #[test]
    fn test_one_native_listener_per_type() {
        let press = MessageKey::new("press");
        let focused = MessageKey::new("focused");
        let rt = Runtime::new();
        let root = rt.mount(Shell, MountTarget::Id("app"), Value::Null).unwrap();
        for _ in 0..3 {
            rt.make_child(root, Button { press, focused }, Value::Null, None).unwrap();
        }
        rt.dirty(root).unwrap();
        rt.run_until_stalled().unwrap();
        rt.listen(root, CLICK, press, ListenOptions::default(), |_, _| {}).unwrap();

        let container = rt.handle(root).unwrap();
        assert_eq!(rt.with_surface(|s| s.native_listener_count(container)), 2);
    }

    #[test]
    fn test_capture_event_needs_capture_listener() {
        let press = MessageKey::new("press");
        let focused = MessageKey::new("focused");
        let rt = Runtime::new();
        let root = rt.mount(Button { press, focused }, MountTarget::Id("app"), Value::Null).unwrap();
        rt.run_until_stalled().unwrap();
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        rt.listen(root, FOCUS, focused, ListenOptions::default(), move |_, _| *counter.borrow_mut() += 1).unwrap();

        let container = rt.handle(root).unwrap();
        let button = rt.with_surface(|s| match s.get(container).unwrap().children.first() {
            Some(crate::renderer::Content::Element(id)) => *id,
            other => panic!("unexpected content {:?}", other),
        });
        assert_eq!(rt.dispatch_native(button, FOCUS), 1);
        assert_eq!(*hits.borrow(), 1);
        // No marker for this type on the button.
        assert_eq!(rt.dispatch_native(button, MESSAGE), 0);
    }

    #[test]
    fn test_navigation_capture() {
        struct Nav;

        impl Component for Nav {
            fn render(&mut self, cx: &mut RenderCx<'_>) -> Result<()> {
                cx.open("a").attr("href", "/about?tab=team").text("About").close();
                cx.open("a").attr("href", "https://elsewhere.example").text("Out").close();
                Ok(())
            }
        }

        let rt = Runtime::new();
        let root = rt.mount(Nav, MountTarget::Id("app"), Value::Null).unwrap();
        rt.run_until_stalled().unwrap();
        rt.install_navigation_capture().unwrap();
        assert!(matches!(rt.install_navigation_capture(), Err(Error::CaptureAlreadyInstalled)));
        assert!(rt.navigate(Location::parse("https://example.com/start?x=1")));
        rt.run_until_stalled().unwrap();
        let start = rt.location();

        let container = rt.handle(root).unwrap();
        let links: Vec<ElementId> = rt.with_surface(|s| {
            s.get(container)
                .unwrap()
                .children
                .iter()
                .filter_map(|c| match c {
                    crate::renderer::Content::Element(id) => Some(*id),
                    _ => None,
                })
                .collect()
        });

        rt.dispatch_native(links[1], CLICK);
        assert_eq!(rt.location(), start);
        rt.dispatch_native(links[0], CLICK);
        assert_eq!(rt.location().host, "example.com");
        assert_eq!(rt.location().path, "/about");
        assert_eq!(rt.location().raw_param("tab"), Some("team"));
    }
}
