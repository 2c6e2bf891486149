//! Remote-control input events.
//!
//! Pointer coordinates are already in source-screen pixels when they
//! leave the viewer. The host hands events to an [`InputSink`]
//! (`crate::host::InputSink`) untouched.

use serde::{Deserialize, Serialize};

// ── Pointer ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerMethod {
    PointerMove,
    PointerDown,
    PointerUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub method: PointerMethod,
    pub x: i32,
    pub y: i32,
    /// Only present on press and release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<u8>,
}

impl PointerEvent {
    pub fn move_to(x: i32, y: i32) -> Self {
        Self {
            method: PointerMethod::PointerMove,
            x,
            y,
            button: None,
        }
    }

    pub fn press(x: i32, y: i32, button: u8) -> Self {
        Self {
            method: PointerMethod::PointerDown,
            x,
            y,
            button: Some(button),
        }
    }

    pub fn release(x: i32, y: i32, button: u8) -> Self {
        Self {
            method: PointerMethod::PointerUp,
            x,
            y,
            button: Some(button),
        }
    }
}

// ── Keyboard ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMethod {
    KeyDown,
    KeyUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub code: String,
    pub key: String,
    pub key_code: u32,
    pub which: u32,
    /// Any of alt, ctrl, meta or shift was held.
    pub relying_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    pub method: KeyMethod,
    pub event: KeyInfo,
}

// ── Scroll ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMethod {
    Wheel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollEvent {
    pub method: ScrollMethod,
    pub delta_x: f64,
    pub delta_y: f64,
    /// 0 = pixels, 1 = lines, 2 = pages.
    pub delta_mode: u32,
}

impl ScrollEvent {
    pub fn pixels(delta_x: f64, delta_y: f64) -> Self {
        Self {
            method: ScrollMethod::Wheel,
            delta_x,
            delta_y,
            delta_mode: 0,
        }
    }
}

// ── InputEvent ───────────────────────────────────────────────────

/// Tagged union of input events, keyed by `name` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum InputEvent {
    Pointer(PointerEvent),
    Keyboard(KeyboardEvent),
    Scroll(ScrollEvent),
}

/// `session:input`: input relayed through the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    pub event: InputEvent,
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pointer_wire_shape() {
        let ev = InputEvent::Pointer(PointerEvent::press(10, 20, 0));
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"name": "pointer", "method": "pointerdown", "x": 10, "y": 20, "button": 0})
        );

        let moved = InputEvent::Pointer(PointerEvent::move_to(1, 2));
        assert!(serde_json::to_value(&moved).unwrap().get("button").is_none());
    }

    #[test]
    fn keyboard_from_browser_json() {
        let ev: InputEvent = serde_json::from_value(json!({
            "name": "keyboard",
            "method": "keydown",
            "event": {"code": "KeyA", "key": "a", "keyCode": 65, "which": 65, "relyingKey": false}
        }))
        .unwrap();
        match ev {
            InputEvent::Keyboard(k) => {
                assert_eq!(k.method, KeyMethod::KeyDown);
                assert_eq!(k.event.key_code, 65);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn scroll_from_browser_json() {
        let ev: InputEvent = serde_json::from_value(json!({
            "name": "scroll", "method": "wheel", "deltaX": 0.0, "deltaY": -120.0, "deltaMode": 0
        }))
        .unwrap();
        assert_eq!(ev, InputEvent::Scroll(ScrollEvent::pixels(0.0, -120.0)));
    }

    #[test]
    fn unknown_name_is_rejected() {
        let res = serde_json::from_value::<InputEvent>(json!({"name": "gamepad", "method": "x"}));
        assert!(res.is_err());
    }
}
