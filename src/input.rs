use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

/// Friendly names for the non-character keys the viewer binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Thread-safe per-tick input snapshot.
///
/// The windowing layer writes into it as events arrive; the frame loop reads
/// key state and drains the accumulated mouse delta exactly once per tick.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
    mouse_buttons: RwLock<HashSet<MouseButton>>,
    mouse_position: RwLock<Vec2>,
    mouse_delta: RwLock<Vec2>,
    captured: RwLock<bool>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.mouse_buttons.write().insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.mouse_buttons.write().remove(&button);
    }

    pub fn set_mouse_position(&self, position: Vec2) {
        *self.mouse_position.write() = position;
    }

    /// Accumulates a relative mouse motion; several device events may arrive
    /// between two ticks.
    pub fn add_mouse_delta(&self, delta: Vec2) {
        *self.mouse_delta.write() += delta;
    }

    /// Returns the accumulated mouse delta and resets it for the next tick.
    pub fn take_mouse_delta(&self) -> Vec2 {
        std::mem::take(&mut *self.mouse_delta.write())
    }

    /// Switches pointer capture. Leaving capture discards any pending delta
    /// so the first captured tick starts from rest.
    pub fn set_captured(&self, captured: bool) {
        *self.captured.write() = captured;
        if !captured {
            self.take_mouse_delta();
        }
    }

    pub fn is_captured(&self) -> bool {
        *self.captured.read()
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.read().contains(&button)
    }

    pub fn mouse_position(&self) -> Vec2 {
        *self.mouse_position.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_state_tracks_keys() {
        let state = InputState::new();
        state.set_key_down(KeyCode::Character('W'));
        assert!(state.is_key_down(KeyCode::Character('W')));
        state.set_key_up(KeyCode::Character('W'));
        assert!(!state.is_key_down(KeyCode::Character('W')));
    }

    #[test]
    fn mouse_delta_accumulates_and_drains() {
        let state = InputState::new();
        state.add_mouse_delta(Vec2::new(3.0, -1.0));
        state.add_mouse_delta(Vec2::new(2.0, 4.0));
        assert_eq!(state.take_mouse_delta(), Vec2::new(5.0, 3.0));
        assert_eq!(state.take_mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn leaving_capture_discards_pending_delta() {
        let state = InputState::new();
        state.set_captured(true);
        state.add_mouse_delta(Vec2::new(50.0, 50.0));
        state.set_captured(false);
        assert!(!state.is_captured());
        assert_eq!(state.take_mouse_delta(), Vec2::ZERO);
    }
}
