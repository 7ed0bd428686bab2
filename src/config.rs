//! Runtime configuration.

/// Event types that do not propagate through the dispatch path and must be
/// intercepted in the capture phase.
pub const DEFAULT_CAPTURE_EVENTS: &[&str] = &[
    "focus",
    "blur",
    "load",
    "unload",
    "scroll",
    "error",
    "mouseenter",
    "mouseleave",
    "pointerenter",
    "pointerleave",
];

/// Settings for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Tag used for the element that hosts an embedded child node.
    pub host_tag: String,
    /// Tag used for collection containers.
    pub collection_tag: String,
    /// Class put on the placeholder rendered for a node whose init failed.
    pub error_class: String,
    /// Prefix of the marker attribute, completed with the event type
    /// (`data-on-click`).
    pub marker_prefix: String,
    /// Attribute holding JSON side-data for bridged events.
    pub payload_attr: String,
    /// Event types bridged in the capture phase.
    pub capture_events: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_tag: "div".to_string(),
            collection_tag: "div".to_string(),
            error_class: "node-error".to_string(),
            marker_prefix: "data-on-".to_string(),
            payload_attr: "data-payload".to_string(),
            capture_events: DEFAULT_CAPTURE_EVENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Marker attribute name for an event type.
    pub fn marker_attr(&self, event_type: &str) -> String {
        format!("{}{}", self.marker_prefix, event_type)
    }

    /// Whether an event type must be bridged in the capture phase.
    pub fn is_capture_event(&self, event_type: &str) -> bool {
        self.capture_events.iter().any(|e| e == event_type)
    }
}
