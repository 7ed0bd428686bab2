//! Markup output buffer.
//!
//! A render hook writes a token stream into a fresh [`Markup`]; the
//! reconciler then hands the whole buffer to
//! [`Surface::replace_contents`](super::Surface::replace_contents), which
//! replaces the node's previous output wholesale.

use crate::types::NodeId;

/// One step of the output stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Open { tag: String, attrs: Vec<(String, String)> },
    /// Host element of an embedded child node. Content up to the matching
    /// `Close` belongs to that node.
    Host { node: NodeId, tag: String, attrs: Vec<(String, String)> },
    /// Stable container of a named collection.
    Collection { name: String, tag: String, attrs: Vec<(String, String)> },
    Text(String),
    Close,
}

#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    tokens: usize,
    open: Vec<usize>,
}

/// Output buffer for one render.
#[derive(Debug, Default, Clone)]
pub struct Markup {
    pub(crate) tokens: Vec<Token>,
    open: Vec<usize>,
}

impl Markup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an element. Close it with [`close`](Self::close).
    pub fn open(&mut self, tag: impl Into<String>) -> &mut Self {
        self.push_opener(Token::Open { tag: tag.into(), attrs: Vec::new() })
    }

    /// Set an attribute on the innermost open element.
    pub fn attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let Some(&index) = self.open.last() else {
            tracing::warn!("attribute written outside of any open element; ignored");
            return self;
        };
        match &mut self.tokens[index] {
            Token::Open { attrs, .. }
            | Token::Host { attrs, .. }
            | Token::Collection { attrs, .. } => {
                let name = name.into();
                let value = value.into();
                if let Some(existing) = attrs.iter_mut().find(|(n, _)| *n == name) {
                    existing.1 = value;
                } else {
                    attrs.push((name, value));
                }
            }
            _ => {}
        }
        self
    }

    /// Value of an attribute on the innermost open element.
    pub fn current_attr(&self, name: &str) -> Option<&str> {
        let index = *self.open.last()?;
        match &self.tokens[index] {
            Token::Open { attrs, .. }
            | Token::Host { attrs, .. }
            | Token::Collection { attrs, .. } => {
                attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
            }
            _ => None,
        }
    }

    /// Append a text node.
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.tokens.push(Token::Text(text.into()));
        self
    }

    /// Close the innermost open element.
    pub fn close(&mut self) -> &mut Self {
        if self.open.pop().is_some() {
            self.tokens.push(Token::Close);
        } else {
            tracing::warn!("close() without a matching open(); ignored");
        }
        self
    }

    /// Number of elements still open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub(crate) fn open_host(&mut self, node: NodeId, tag: &str) {
        self.push_opener(Token::Host {
            node,
            tag: tag.to_string(),
            attrs: vec![("data-node".to_string(), node.as_u64().to_string())],
        });
    }

    pub(crate) fn open_collection(&mut self, name: &str, tag: &str) {
        self.push_opener(Token::Collection {
            name: name.to_string(),
            tag: tag.to_string(),
            attrs: vec![("data-collection".to_string(), name.to_string())],
        });
    }

    /// Position to roll back to with [`rollback`](Self::rollback).
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint { tokens: self.tokens.len(), open: self.open.clone() }
    }

    /// Drop everything written since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.tokens.truncate(checkpoint.tokens);
        self.open = checkpoint.open;
    }

    /// Close every element opened at or above `depth`.
    pub(crate) fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            self.close();
        }
    }

    fn push_opener(&mut self, token: Token) -> &mut Self {
        self.open.push(self.tokens.len());
        self.tokens.push(token);
        self
    }
}
