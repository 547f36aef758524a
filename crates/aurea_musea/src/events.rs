//! DOM event knowledge.
//!
//! Maps event names to their TypeScript event interface for overlay typing
//! of `$event`. Unlisted events fall back to `Event` at the emit site.

/// The TS event interface for a DOM event name, if it is a known event.
pub fn dom_event_type(event_name: &str) -> Option<&'static str> {
    let ty = match event_name {
        // Mouse events
        "click" | "dblclick" | "mousedown" | "mouseup" | "mousemove" | "mouseenter"
        | "mouseleave" | "mouseover" | "mouseout" | "contextmenu" | "auxclick" => "MouseEvent",

        // Pointer events
        "pointerdown" | "pointerup" | "pointermove" | "pointerenter" | "pointerleave"
        | "pointerover" | "pointerout" | "pointercancel" | "gotpointercapture"
        | "lostpointercapture" => "PointerEvent",

        // Touch events
        "touchstart" | "touchend" | "touchmove" | "touchcancel" => "TouchEvent",

        // Keyboard events
        "keydown" | "keyup" | "keypress" => "KeyboardEvent",

        // Focus events
        "focus" | "blur" | "focusin" | "focusout" => "FocusEvent",

        // Input events
        "input" | "beforeinput" => "InputEvent",

        // Composition events
        "compositionstart" | "compositionend" | "compositionupdate" => "CompositionEvent",

        // Form events
        "submit" => "SubmitEvent",
        "change" | "reset" | "invalid" => "Event",

        // Drag events
        "drag" | "dragstart" | "dragend" | "dragenter" | "dragleave" | "dragover" | "drop" => {
            "DragEvent"
        }

        // Clipboard events
        "cut" | "copy" | "paste" => "ClipboardEvent",

        // Wheel events
        "wheel" => "WheelEvent",

        // Animation / transition events
        "animationstart" | "animationend" | "animationiteration" | "animationcancel" => {
            "AnimationEvent"
        }
        "transitionstart" | "transitionend" | "transitionrun" | "transitioncancel" => {
            "TransitionEvent"
        }

        // UI events
        "scroll" | "scrollend" | "resize" => "Event",

        // Media events
        "play" | "pause" | "ended" | "loadeddata" | "loadedmetadata" | "timeupdate"
        | "volumechange" | "waiting" | "seeking" | "seeked" | "ratechange" | "durationchange"
        | "canplay" | "canplaythrough" | "playing" | "progress" | "stalled" | "suspend"
        | "emptied" | "abort" => "Event",

        // Error / load events
        "error" => "ErrorEvent",
        "load" | "beforeunload" | "unload" => "Event",

        // Selection events
        "select" | "selectionchange" | "selectstart" => "Event",

        _ => return None,
    };
    Some(ty)
}

/// Whether the event name is a standard DOM event.
pub fn is_known_event(event_name: &str) -> bool {
    dom_event_type(event_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_events_have_types() {
        assert_eq!(dom_event_type("click"), Some("MouseEvent"));
        assert_eq!(dom_event_type("keydown"), Some("KeyboardEvent"));
        assert_eq!(dom_event_type("submit"), Some("SubmitEvent"));
        assert_eq!(dom_event_type("change"), Some("Event"));
    }

    #[test]
    fn unknown_events_are_none() {
        assert_eq!(dom_event_type("my-custom-event"), None);
        assert!(!is_known_event("frobnicate"));
    }
}
