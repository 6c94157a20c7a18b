//! Keyboard surface carried across the API (spec §6): A, B, ENTER, BACK,
//! DEL, UP, DOWN, LEFT, RIGHT. Everything else is either ignored or routed
//! as raw ASCII to text-input hooks (outside this crate's scope — the
//! windowing backend owns that dispatch per spec §1).

use crate::geometry::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    B,
    Enter,
    Back,
    Del,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    /// Maps a directional key to its `Direction`; non-directional keys
    /// have no direction.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::Up => Some(Direction::Up),
            Key::Down => Some(Direction::Down),
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Snapshot of which keys are currently held, refreshed asynchronously by
/// the windowing backend and queried once per update tick (spec §4.11
/// step 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyboardState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
}

impl KeyboardState {
    /// The single pressed direction, if exactly one directional key is
    /// held. Diagonal chords are not part of this engine's movement model
    /// (spec Non-goals: arbitrary map geometry / axis-aligned passability
    /// only), so a chord of two directions yields `None`.
    pub fn pressed_direction(&self) -> Option<Direction> {
        let mut dirs = Vec::new();
        if self.up {
            dirs.push(Direction::Up);
        }
        if self.down {
            dirs.push(Direction::Down);
        }
        if self.left {
            dirs.push(Direction::Left);
        }
        if self.right {
            dirs.push(Direction::Right);
        }
        if dirs.len() == 1 {
            Some(dirs[0])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_direction_is_reported() {
        let mut ks = KeyboardState::default();
        ks.down = true;
        assert_eq!(ks.pressed_direction(), Some(Direction::Down));
    }

    #[test]
    fn chord_is_ambiguous() {
        let mut ks = KeyboardState::default();
        ks.up = true;
        ks.left = true;
        assert_eq!(ks.pressed_direction(), None);
    }
}
