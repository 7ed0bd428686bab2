//! Event type names.
//!
//! Output events come from the surface and are bridged onto the bus; the
//! generic [`MESSAGE`] type carries node-to-node messages and never has a
//! native listener.

pub const CLICK: &str = "click";
pub const DBLCLICK: &str = "dblclick";
pub const INPUT: &str = "input";
pub const CHANGE: &str = "change";
pub const SUBMIT: &str = "submit";
pub const KEYDOWN: &str = "keydown";
pub const KEYUP: &str = "keyup";
pub const FOCUS: &str = "focus";
pub const BLUR: &str = "blur";
pub const SCROLL: &str = "scroll";
pub const LOAD: &str = "load";
pub const MOUSEENTER: &str = "mouseenter";
pub const MOUSELEAVE: &str = "mouseleave";

/// Type of generic node-to-node messages.
pub const MESSAGE: &str = "message";

/// Whether `event_type` names an output event (one that needs a native
/// listener on the root container).
pub fn is_output_event(event_type: &str) -> bool {
    !event_type.is_empty() && event_type != MESSAGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_output_event() {
        assert!(is_output_event(CLICK));
        assert!(is_output_event(FOCUS));
        assert!(!is_output_event(MESSAGE));
        assert!(!is_output_event(""));
    }
}
