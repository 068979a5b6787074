use std::collections::HashMap;

use parallax_core::input::Button;
use sdl2::keyboard::Scancode;

/// Maps SDL scancodes to logical buttons.
pub struct KeyMap {
    map: HashMap<Scancode, Button>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Bind a scancode to a button. Several keys may share one button.
    pub fn bind(&mut self, scancode: Scancode, button: Button) {
        self.map.insert(scancode, button);
    }

    pub fn get(&self, scancode: Scancode) -> Option<Button> {
        self.map.get(&scancode).copied()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyboard layout used when the host has no custom bindings.
pub fn default_key_map() -> KeyMap {
    let mut km = KeyMap::new();

    for button in Button::ALL {
        let scancodes: &[Scancode] = match button {
            Button::Up => &[Scancode::Up, Scancode::W],
            Button::Down => &[Scancode::Down, Scancode::S],
            Button::Left => &[Scancode::Left, Scancode::A],
            Button::Right => &[Scancode::Right, Scancode::D],
            Button::A => &[Scancode::X, Scancode::K],
            Button::B => &[Scancode::Z, Scancode::J],
            Button::L => &[Scancode::Q],
            Button::R => &[Scancode::E],
            Button::Start => &[Scancode::Return],
            Button::Select => &[Scancode::Backspace, Scancode::RShift],
        };

        for &sc in scancodes {
            km.bind(sc, button);
        }
    }

    km
}
