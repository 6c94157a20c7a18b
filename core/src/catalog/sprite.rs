//! Sprite catalog: flat frame vector plus a sprite-index -> frame-block
//! association (spec §4.5).

use crate::constants::DIRECTION_FRAME_COUNT;
use crate::geometry::Direction;
use crate::netobj::{self, NetObj};

/// Frame slot layout within one sprite's 10-frame block:
/// `{N, NA1, NA2, S, SA1, SA2, W, WA, E, EA}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    North,
    NorthAlt1,
    NorthAlt2,
    South,
    SouthAlt1,
    SouthAlt2,
    West,
    WestAlt,
    East,
    EastAlt,
}

impl FrameSlot {
    pub fn index(self) -> usize {
        match self {
            FrameSlot::North => 0,
            FrameSlot::NorthAlt1 => 1,
            FrameSlot::NorthAlt2 => 2,
            FrameSlot::South => 3,
            FrameSlot::SouthAlt1 => 4,
            FrameSlot::SouthAlt2 => 5,
            FrameSlot::West => 6,
            FrameSlot::WestAlt => 7,
            FrameSlot::East => 8,
            FrameSlot::EastAlt => 9,
        }
    }

    /// Base (non-alt) frame slot for a direction. `Direction::None` has no
    /// sprite representation.
    pub fn base_for(dir: Direction) -> Option<FrameSlot> {
        match dir {
            Direction::Up => Some(FrameSlot::North),
            Direction::Down => Some(FrameSlot::South),
            Direction::Left => Some(FrameSlot::West),
            Direction::Right => Some(FrameSlot::East),
            Direction::None => None,
        }
    }

    /// The alt-walking frame slot for `dir`, alternated by an even/odd
    /// counter. Up/down carry two alts; left/right carry one (spec §4.5).
    pub fn alt_for(dir: Direction, frame_alt: u32) -> Option<FrameSlot> {
        match dir {
            Direction::Up => Some(if frame_alt % 2 == 0 {
                FrameSlot::NorthAlt1
            } else {
                FrameSlot::NorthAlt2
            }),
            Direction::Down => Some(if frame_alt % 2 == 0 {
                FrameSlot::SouthAlt1
            } else {
                FrameSlot::SouthAlt2
            }),
            Direction::Left => Some(FrameSlot::WestAlt),
            Direction::Right => Some(FrameSlot::EastAlt),
            Direction::None => None,
        }
    }
}

#[derive(Debug)]
pub struct SpriteCatalog {
    sprite_count: u16,
    netobj_id: u32,
}

impl SpriteCatalog {
    /// `sprite_count == 0` is a valid, if uninteresting, catalog: no
    /// renderable characters (spec §8 boundary case).
    pub fn new(sprite_count: u16) -> Self {
        Self {
            sprite_count,
            netobj_id: netobj::registry().allocate(),
        }
    }

    pub fn sprite_count(&self) -> u16 {
        self.sprite_count
    }

    /// Start index of `sprite_index`'s 10-frame block in the flat frame
    /// vector.
    pub fn block_start(&self, sprite_index: u16) -> Option<usize> {
        if sprite_index >= self.sprite_count {
            return None;
        }
        Some(sprite_index as usize * DIRECTION_FRAME_COUNT)
    }

    pub fn frame_index(&self, sprite_index: u16, slot: FrameSlot) -> Option<usize> {
        self.block_start(sprite_index).map(|base| base + slot.index())
    }
}

impl NetObj for SpriteCatalog {
    fn netobj_id(&self) -> u32 {
        self.netobj_id
    }
}

impl Drop for SpriteCatalog {
    fn drop(&mut self) {
        netobj::registry().unregister(self.netobj_id);
    }
}

impl Clone for SpriteCatalog {
    fn clone(&self) -> Self {
        Self {
            sprite_count: self.sprite_count,
            netobj_id: netobj::registry().allocate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_is_valid() {
        let cat = SpriteCatalog::new(0);
        assert_eq!(cat.block_start(0), None);
    }

    #[test]
    fn block_start_is_stride_ten() {
        let cat = SpriteCatalog::new(3);
        assert_eq!(cat.block_start(0), Some(0));
        assert_eq!(cat.block_start(1), Some(10));
        assert_eq!(cat.block_start(2), Some(20));
        assert_eq!(cat.block_start(3), None);
    }

    #[test]
    fn alt_for_up_down_alternates() {
        assert_eq!(
            FrameSlot::alt_for(Direction::Up, 0),
            Some(FrameSlot::NorthAlt1)
        );
        assert_eq!(
            FrameSlot::alt_for(Direction::Up, 1),
            Some(FrameSlot::NorthAlt2)
        );
    }

    #[test]
    fn alt_for_left_right_is_fixed() {
        assert_eq!(FrameSlot::alt_for(Direction::Left, 0), Some(FrameSlot::WestAlt));
        assert_eq!(FrameSlot::alt_for(Direction::Left, 1), Some(FrameSlot::WestAlt));
    }

    #[test]
    fn dropping_a_sprite_catalog_frees_its_netobj_id() {
        let cat = SpriteCatalog::new(2);
        let id = cat.netobj_id();
        assert!(crate::netobj::registry().is_live(id));
        drop(cat);
        assert!(!crate::netobj::registry().is_live(id));
    }
}
