//! Output surface - retained element tree that nodes render into.
//!
//! Stands in for the real output container: contents of an element are
//! replaced wholesale (innerHTML semantics), elements can be appended or
//! removed, and the surface answers composed-path queries for event
//! bridging. It also records the native listeners installed per container.

use std::collections::HashMap;

use super::markup::{Markup, Token};
use crate::types::{ElementId, NodeId};

/// Phase a native listener is installed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capture,
    Bubble,
}

/// Child content of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Element(ElementId),
}

/// One element on the surface.
#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Content>,
    pub parent: Option<ElementId>,
    /// Node whose render produced this element.
    pub owner: Option<NodeId>,
}

impl Element {
    fn new(tag: &str, attrs: Vec<(String, String)>, parent: Option<ElementId>, owner: Option<NodeId>) -> Self {
        Self { tag: tag.to_string(), attrs, children: Vec::new(), parent, owner }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

/// Where embedded nodes and collections landed after a materialization.
#[derive(Debug, Default)]
pub(crate) struct Materialized {
    pub hosts: Vec<(NodeId, ElementId)>,
    pub collections: Vec<(NodeId, String, ElementId)>,
}

/// The element arena.
#[derive(Debug, Default)]
pub struct Surface {
    elements: HashMap<ElementId, Element>,
    next_id: u64,
    native_listeners: HashMap<(ElementId, String), Phase>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Containers & lookups
    // =========================================================================

    /// Create a detached top-level container carrying an `id` attribute.
    pub fn create_container(&mut self, id: &str) -> ElementId {
        let attrs = if id.is_empty() { Vec::new() } else { vec![("id".to_string(), id.to_string())] };
        self.insert(Element::new("div", attrs, None, None))
    }

    /// Find a live element by its `id` attribute.
    pub fn element_by_id(&self, id: &str) -> Option<ElementId> {
        if id.is_empty() {
            return None;
        }
        let mut found: Vec<ElementId> = self
            .elements
            .iter()
            .filter(|(_, el)| el.attr("id") == Some(id))
            .map(|(eid, _)| *eid)
            .collect();
        found.sort();
        found.into_iter().next()
    }

    pub fn is_live(&self, element: ElementId) -> bool {
        self.elements.contains_key(&element)
    }

    pub fn get(&self, element: ElementId) -> Option<&Element> {
        self.elements.get(&element)
    }

    pub fn attr(&self, element: ElementId, name: &str) -> Option<&str> {
        self.elements.get(&element).and_then(|el| el.attr(name))
    }

    pub fn owner(&self, element: ElementId) -> Option<NodeId> {
        self.elements.get(&element).and_then(|el| el.owner)
    }

    /// Elements from `target` up to its top-level container, inclusive.
    pub fn composed_path(&self, target: ElementId) -> Vec<ElementId> {
        let mut path = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            let Some(el) = self.elements.get(&id) else { break };
            path.push(id);
            current = el.parent;
        }
        path
    }

    /// Top-level container an element lives in.
    pub fn container_of(&self, element: ElementId) -> Option<ElementId> {
        self.composed_path(element).last().copied()
    }

    /// First descendant of `within` with this tag, in document order.
    pub fn find(&self, within: ElementId, tag: &str) -> Option<ElementId> {
        self.find_all(within, tag).into_iter().next()
    }

    /// Every descendant of `within` with this tag, in document order.
    pub fn find_all(&self, within: ElementId, tag: &str) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut stack: Vec<ElementId> = self.child_elements(within).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(el) = self.elements.get(&id) else { continue };
            if el.tag == tag {
                found.push(id);
            }
            stack.extend(self.child_elements(id).into_iter().rev());
        }
        found
    }

    fn child_elements(&self, element: ElementId) -> Vec<ElementId> {
        self.elements
            .get(&element)
            .map(|el| {
                el.children
                    .iter()
                    .filter_map(|c| match c {
                        Content::Element(id) => Some(*id),
                        Content::Text(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Replace the contents of `target` with `markup`.
    ///
    /// Elements are owned by `owner` except inside host tokens, where the
    /// embedded node takes over. Elements left open by a failed render are
    /// closed implicitly; the partial output stays.
    pub(crate) fn replace_contents(&mut self, target: ElementId, markup: &Markup, owner: NodeId) -> Materialized {
        let mut result = Materialized::default();
        if !self.is_live(target) {
            return result;
        }
        self.clear_contents(target);

        // (element, owner of its content)
        let mut stack: Vec<(ElementId, NodeId)> = vec![(target, owner)];
        for token in &markup.tokens {
            let Some(&(parent, current_owner)) = stack.last() else { break };
            match token {
                Token::Open { tag, attrs } => {
                    let id = self.append_child(parent, tag, attrs.clone(), current_owner);
                    stack.push((id, current_owner));
                }
                Token::Host { node, tag, attrs } => {
                    let id = self.append_child(parent, tag, attrs.clone(), *node);
                    result.hosts.push((*node, id));
                    stack.push((id, *node));
                }
                Token::Collection { name, tag, attrs } => {
                    let id = self.append_child(parent, tag, attrs.clone(), current_owner);
                    result.collections.push((current_owner, name.clone(), id));
                    stack.push((id, current_owner));
                }
                Token::Text(text) => {
                    if let Some(el) = self.elements.get_mut(&parent) {
                        el.children.push(Content::Text(text.clone()));
                    }
                }
                Token::Close => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
            }
        }
        result
    }

    /// Append an empty element to `parent`.
    pub fn append_element(&mut self, parent: ElementId, tag: &str, owner: Option<NodeId>) -> Option<ElementId> {
        if !self.is_live(parent) {
            return None;
        }
        let id = self.insert(Element::new(tag, Vec::new(), Some(parent), owner));
        if let Some(el) = self.elements.get_mut(&parent) {
            el.children.push(Content::Element(id));
        }
        Some(id)
    }

    pub(crate) fn set_attr(&mut self, element: ElementId, name: &str, value: &str) {
        if let Some(el) = self.elements.get_mut(&element) {
            match el.attrs.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Detach an element from its parent and drop it with its descendants.
    pub fn remove(&mut self, element: ElementId) {
        let parent = self.elements.get(&element).and_then(|el| el.parent);
        if let Some(parent) = parent.and_then(|p| self.elements.get_mut(&p)) {
            parent.children.retain(|c| *c != Content::Element(element));
        }
        self.drop_subtree(element);
    }

    /// Drop every child of `element`, keeping the element itself.
    pub fn clear_contents(&mut self, element: ElementId) {
        let children = match self.elements.get_mut(&element) {
            Some(el) => std::mem::take(&mut el.children),
            None => return,
        };
        for child in children {
            if let Content::Element(id) = child {
                self.drop_subtree(id);
            }
        }
    }

    // =========================================================================
    // Native listeners
    // =========================================================================

    /// Record a native listener on a container. Returns false if one was
    /// already installed for that event type.
    pub fn add_native_listener(&mut self, container: ElementId, event_type: &str, phase: Phase) -> bool {
        let key = (container, event_type.to_string());
        if self.native_listeners.contains_key(&key) {
            return false;
        }
        self.native_listeners.insert(key, phase);
        true
    }

    pub fn native_listener(&self, container: ElementId, event_type: &str) -> Option<Phase> {
        self.native_listeners.get(&(container, event_type.to_string())).copied()
    }

    pub fn native_listener_count(&self, container: ElementId) -> usize {
        self.native_listeners.keys().filter(|(c, _)| *c == container).count()
    }

    /// Drop every native listener installed on a container.
    pub fn remove_native_listeners(&mut self, container: ElementId) {
        self.native_listeners.retain(|(c, _), _| *c != container);
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialized contents of an element.
    pub fn inner_html(&self, element: ElementId) -> String {
        let mut out = String::new();
        if let Some(el) = self.elements.get(&element) {
            for child in &el.children {
                self.write_content(child, &mut out);
            }
        }
        out
    }

    /// Concatenated text of an element and its descendants.
    pub fn text_content(&self, element: ElementId) -> String {
        let mut out = String::new();
        self.collect_text(element, &mut out);
        out
    }

    fn write_content(&self, content: &Content, out: &mut String) {
        match content {
            Content::Text(text) => out.push_str(&escape(text)),
            Content::Element(id) => {
                let Some(el) = self.elements.get(id) else { return };
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
                }
                out.push('>');
                for child in &el.children {
                    self.write_content(child, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }

    fn collect_text(&self, element: ElementId, out: &mut String) {
        let Some(el) = self.elements.get(&element) else { return };
        for child in &el.children {
            match child {
                Content::Text(text) => out.push_str(text),
                Content::Element(id) => self.collect_text(*id, out),
            }
        }
    }

    fn insert(&mut self, element: Element) -> ElementId {
        self.next_id += 1;
        let id = ElementId(self.next_id);
        self.elements.insert(id, element);
        id
    }

    fn append_child(&mut self, parent: ElementId, tag: &str, attrs: Vec<(String, String)>, owner: NodeId) -> ElementId {
        let id = self.insert(Element::new(tag, attrs, Some(parent), Some(owner)));
        if let Some(el) = self.elements.get_mut(&parent) {
            el.children.push(Content::Element(id));
        }
        id
    }

    fn drop_subtree(&mut self, element: ElementId) {
        let Some(el) = self.elements.remove(&element) else { return };
        self.native_listeners.retain(|(c, _), _| *c != element);
        for child in el.children {
            if let Content::Element(id) = child {
                self.drop_subtree(id);
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
