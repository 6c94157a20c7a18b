//! Character render context: owns the dense list of `CharacterContext`s
//! and resolves which on-screen rectangle (if any) a character falls
//! into for the renderer (spec §3, §4.8).

use crate::character::Character;
use crate::character_context::CharacterContext;
use crate::map_render_context::MapRenderContext;

pub struct CharacterSlot {
    pub character: Character,
    pub context: CharacterContext,
}

#[derive(Default)]
pub struct CharacterRenderContext {
    slots: Vec<CharacterSlot>,
}

impl CharacterRenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, character: Character, context: CharacterContext) -> usize {
        self.slots.push(CharacterSlot { character, context });
        self.slots.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<CharacterSlot> {
        if index < self.slots.len() {
            Some(self.slots.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&CharacterSlot> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CharacterSlot> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterSlot> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CharacterSlot> {
        self.slots.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True if any other character already occupies `chunk_pos`/`tile_pos`
    /// on `map_no` — used by the update loop's collision check after a
    /// successful `move` (spec §4.11 step 2).
    pub fn occupied_by_other(&self, exclude: usize, slot: &CharacterSlot) -> bool {
        self.slots.iter().enumerate().any(|(i, other)| {
            i != exclude
                && other.character.map_no == slot.character.map_no
                && other.character.chunk_pos == slot.character.chunk_pos
                && other.character.tile_pos == slot.character.tile_pos
        })
    }

    /// Resolves the pixel origin to draw `index`'s sprite at, combining
    /// the visible chunk rectangle, the tile offset within it, the map
    /// render context's scroll offset, and the character's own animation
    /// offset. Returns `None` if the character is not on a currently
    /// visible chunk (spec §4.8: "A character not on a visible chunk is
    /// not drawn").
    pub fn screen_position(
        &self,
        index: usize,
        map_rc: &MapRenderContext,
        tile_pixels: i32,
    ) -> Option<(i32, i32)> {
        let slot = self.slots.get(index)?;
        let info = map_rc.render_info_for(slot.character.chunk_pos)?;
        let base_x = info.px + slot.character.tile_pos.column as i32 * tile_pixels;
        let base_y = info.py + slot.character.tile_pos.row as i32 * tile_pixels;
        Some((
            base_x + map_rc.offset.0 + slot.context.offset.0,
            base_y + map_rc.offset.1 + slot.context.offset.1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Location, Point};

    fn make_character(chunk: Point, tile: Location) -> Character {
        Character::new(0, 1, chunk, tile)
    }

    #[test]
    fn occupied_by_other_detects_collision() {
        let mut rc = CharacterRenderContext::new();
        let ctx = CharacterContext::new(4, 8);
        let a = rc.add(
            make_character(Point::new(0, 0), Location::new(5, 5)),
            CharacterContext::new(4, 8),
        );
        rc.add(make_character(Point::new(0, 0), Location::new(5, 6)), ctx);
        let slot = rc.get(a).unwrap();
        assert!(!rc.occupied_by_other(a, slot));
    }

    #[test]
    fn empty_context_has_no_characters() {
        let rc = CharacterRenderContext::new();
        assert!(rc.is_empty());
    }
}
