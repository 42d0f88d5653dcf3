//! Keyboard and mouse state

use glam::Vec2;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_winit(button: winit::event::MouseButton) -> Option<Self> {
        match button {
            winit::event::MouseButton::Left => Some(MouseButton::Left),
            winit::event::MouseButton::Right => Some(MouseButton::Right),
            winit::event::MouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Physical key, named after its position on a US layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Space,
    Enter,
    Escape,
    Tab,
    Shift,
    Control,
    Alt,
    Left,
    Right,
    Up,
    Down,
}

impl Key {
    pub fn from_winit(key: winit::keyboard::PhysicalKey) -> Option<Self> {
        use winit::keyboard::{KeyCode, PhysicalKey};

        let PhysicalKey::Code(code) = key else {
            return None;
        };
        Some(match code {
            KeyCode::KeyA => Key::A,
            KeyCode::KeyB => Key::B,
            KeyCode::KeyC => Key::C,
            KeyCode::KeyD => Key::D,
            KeyCode::KeyE => Key::E,
            KeyCode::KeyF => Key::F,
            KeyCode::KeyG => Key::G,
            KeyCode::KeyH => Key::H,
            KeyCode::KeyI => Key::I,
            KeyCode::KeyJ => Key::J,
            KeyCode::KeyK => Key::K,
            KeyCode::KeyL => Key::L,
            KeyCode::KeyM => Key::M,
            KeyCode::KeyN => Key::N,
            KeyCode::KeyO => Key::O,
            KeyCode::KeyP => Key::P,
            KeyCode::KeyQ => Key::Q,
            KeyCode::KeyR => Key::R,
            KeyCode::KeyS => Key::S,
            KeyCode::KeyT => Key::T,
            KeyCode::KeyU => Key::U,
            KeyCode::KeyV => Key::V,
            KeyCode::KeyW => Key::W,
            KeyCode::KeyX => Key::X,
            KeyCode::KeyY => Key::Y,
            KeyCode::KeyZ => Key::Z,
            KeyCode::Space => Key::Space,
            KeyCode::Enter => Key::Enter,
            KeyCode::Escape => Key::Escape,
            KeyCode::Tab => Key::Tab,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
            KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
            KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,
            KeyCode::ArrowLeft => Key::Left,
            KeyCode::ArrowRight => Key::Right,
            KeyCode::ArrowUp => Key::Up,
            KeyCode::ArrowDown => Key::Down,
            _ => return None,
        })
    }
}

/// Input gathered between two frames.
///
/// Key and button tables persist across frames; cursor motion, scrolling
/// and resizes are per frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: HashSet<Key>,
    buttons: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    cursor_delta: Vec2,
    scroll: f32,
    resized: Option<(u32, u32)>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    /// Cursor position in physical pixels, once the cursor entered the window.
    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Cursor motion since the previous frame.
    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    /// Scrolled lines since the previous frame, positive away from the user.
    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    /// New window size if it changed since the previous frame.
    pub fn resized(&self) -> Option<(u32, u32)> {
        self.resized
    }

    pub fn press_key(&mut self, key: Key) {
        self.keys.insert(key);
    }

    pub fn release_key(&mut self, key: Key) {
        self.keys.remove(&key);
    }

    pub fn press_button(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn release_button(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    /// The first position after entering only sets the cursor.
    pub fn move_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.cursor_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    pub fn scroll_by(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.resized = Some((width, height));
    }

    /// Forget held keys and buttons, e.g. when focus is lost.
    pub fn release_all(&mut self) {
        self.keys.clear();
        self.buttons.clear();
    }

    /// Reset the per-frame values.
    pub fn end_frame(&mut self) {
        self.cursor_delta = Vec2::ZERO;
        self.scroll = 0.0;
        self.resized = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_table() {
        let mut input = InputState::new();
        input.press_key(Key::W);
        input.press_key(Key::A);
        input.release_key(Key::A);
        input.end_frame();
        assert!(input.is_key_down(Key::W));
        assert!(!input.is_key_down(Key::A));
        input.release_all();
        assert!(!input.is_key_down(Key::W));
    }

    #[test]
    fn test_cursor_delta_accumulates_per_frame() {
        let mut input = InputState::new();
        input.move_cursor(Vec2::new(100.0, 100.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        input.move_cursor(Vec2::new(110.0, 95.0));
        input.move_cursor(Vec2::new(115.0, 95.0));
        assert_eq!(input.cursor_delta(), Vec2::new(15.0, -5.0));
        input.end_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
        assert_eq!(input.cursor(), Some(Vec2::new(115.0, 95.0)));
    }

    #[test]
    fn test_reentering_cursor_does_not_jump() {
        let mut input = InputState::new();
        input.move_cursor(Vec2::new(0.0, 0.0));
        input.cursor_left();
        input.move_cursor(Vec2::new(500.0, 500.0));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
    }

    #[test]
    fn test_resize_and_scroll_are_per_frame() {
        let mut input = InputState::new();
        input.resize(800, 600);
        input.scroll_by(1.0);
        input.scroll_by(0.5);
        assert_eq!(input.resized(), Some((800, 600)));
        assert_eq!(input.scroll(), 1.5);
        input.end_frame();
        assert_eq!(input.resized(), None);
        assert_eq!(input.scroll(), 0.0);
    }

    #[test]
    fn test_from_winit() {
        use winit::keyboard::{KeyCode, PhysicalKey};
        assert_eq!(Key::from_winit(PhysicalKey::Code(KeyCode::KeyW)), Some(Key::W));
        assert_eq!(
            Key::from_winit(PhysicalKey::Code(KeyCode::ShiftRight)),
            Some(Key::Shift)
        );
        assert_eq!(Key::from_winit(PhysicalKey::Code(KeyCode::F5)), None);
        assert_eq!(
            MouseButton::from_winit(winit::event::MouseButton::Back),
            None
        );
    }
}
