//! Tile catalog: indexed frame set, terrain classification, animation
//! chains (spec §4.5, wire form §6.1).

use std::collections::HashMap;

use crate::error::{ErrorKind, PokError, TileCatalogError};
use crate::netobj::{self, NetObj};

/// One node of a tile's animation chain: `{ticks, forward_id, backward_id,
/// total_ticks}`. `forward_id == 0` marks the turn-around point where the
/// walk direction flips from forward to backward.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationEntry {
    pub ticks: u8,
    pub forward_id: u16,
    pub backward_id: u16,
    pub total_ticks: u32,
}

/// Tile ids grouped by terrain class, in the fixed wire order §6 names:
/// cuttable, headbuttable, water, ice, lava, waterfall, whirlpool,
/// ledge-down, ledge-left, ledge-right.
#[derive(Debug, Clone, Default)]
pub struct TerrainClass {
    pub cuttable: Vec<u16>,
    pub headbuttable: Vec<u16>,
    pub water: Vec<u16>,
    pub ice: Vec<u16>,
    pub lava: Vec<u16>,
    pub waterfall: Vec<u16>,
    pub whirlpool: Vec<u16>,
    pub ledge_down: Vec<u16>,
    pub ledge_left: Vec<u16>,
    pub ledge_right: Vec<u16>,
}

#[derive(Debug)]
pub struct TileCatalog {
    tile_count: u16,
    impassability: u16,
    animations: HashMap<u16, AnimationEntry>,
    terrain: TerrainClass,
    netobj_id: u32,
}

impl TileCatalog {
    /// Builds a catalog, precomputing every animated tile's `total_ticks`
    /// (spec §4.5: "must be precomputed when the table is loaded").
    pub fn new(
        tile_count: u16,
        impassability: u16,
        mut animations: HashMap<u16, AnimationEntry>,
        terrain: TerrainClass,
    ) -> Result<Self, PokError> {
        if tile_count == 0 {
            return Err(PokError::new(
                ErrorKind::TileCatalog(TileCatalogError::ZeroTiles),
                "tile catalog must carry at least one tile",
            ));
        }
        let ids: Vec<u16> = animations.keys().copied().collect();
        for id in ids {
            if animations[&id].total_ticks != 0 {
                continue;
            }
            let total = Self::compute_round_trip(&animations, id);
            animations.get_mut(&id).unwrap().total_ticks = total;
        }
        Ok(Self {
            tile_count,
            impassability,
            animations,
            terrain,
            netobj_id: netobj::registry().allocate(),
        })
    }

    fn advance(animations: &HashMap<u16, AnimationEntry>, current: u16, dir: &mut bool) -> u16 {
        let entry = animations[&current];
        if *dir {
            if entry.forward_id == 0 {
                *dir = false;
                entry.backward_id
            } else {
                entry.forward_id
            }
        } else {
            entry.backward_id
        }
    }

    /// Sums tick durations around the chain starting at `start` until the
    /// walk returns to `start`, guarding against a malformed chain with no
    /// cycle back.
    fn compute_round_trip(animations: &HashMap<u16, AnimationEntry>, start: u16) -> u32 {
        let mut current = start;
        let mut dir = true;
        let mut total: u32 = 0;
        let guard = animations.len().saturating_mul(2).max(1);
        for _ in 0..guard {
            total += animations[&current].ticks as u32;
            let next = Self::advance(animations, current, &mut dir);
            if next == start || !animations.contains_key(&next) {
                break;
            }
            current = next;
        }
        total.max(1)
    }

    /// The frame id visible at elapsed tick count `t` for an animated tile
    /// (non-animated tiles simply render as themselves — callers check
    /// `is_animated` first).
    pub fn animated_frame(&self, id: u16, t: u64) -> u16 {
        let Some(start) = self.animations.get(&id) else {
            return id;
        };
        if start.total_ticks == 0 {
            return id;
        }
        let mut rem = (t % start.total_ticks as u64) as u32;
        let mut current = id;
        let mut dir = true;
        loop {
            let entry = self.animations[&current];
            if rem < entry.ticks as u32 {
                return current;
            }
            rem -= entry.ticks as u32;
            current = Self::advance(&self.animations, current, &mut dir);
        }
    }

    pub fn is_animated(&self, id: u16) -> bool {
        self.animations.contains_key(&id)
    }

    pub fn tile_count(&self) -> u16 {
        self.tile_count
    }

    pub fn impassability(&self) -> u16 {
        self.impassability
    }

    /// Base passability before per-tile override bits (spec §4.5, §4.7):
    /// id 0 is always impassable; ids in `1..=impassability` are
    /// base-impassable; ids above are base-passable.
    pub fn is_base_impassable(&self, id: u16) -> bool {
        id <= self.impassability
    }

    pub fn terrain(&self) -> &TerrainClass {
        &self.terrain
    }
}

impl NetObj for TileCatalog {
    fn netobj_id(&self) -> u32 {
        self.netobj_id
    }
}

impl Drop for TileCatalog {
    fn drop(&mut self) {
        netobj::registry().unregister(self.netobj_id);
    }
}

/// Manual `Clone` rather than a derive: a clone is a distinct netobj with
/// its own freshly allocated id, not a second handle to the original's.
impl Clone for TileCatalog {
    fn clone(&self) -> Self {
        Self {
            tile_count: self.tile_count,
            impassability: self.impassability,
            animations: self.animations.clone(),
            terrain: self.terrain.clone(),
            netobj_id: netobj::registry().allocate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frame_chain() -> HashMap<u16, AnimationEntry> {
        let mut m = HashMap::new();
        m.insert(
            1,
            AnimationEntry {
                ticks: 10,
                forward_id: 2,
                backward_id: 1,
                total_ticks: 0,
            },
        );
        m.insert(
            2,
            AnimationEntry {
                ticks: 10,
                forward_id: 0,
                backward_id: 1,
                total_ticks: 0,
            },
        );
        m
    }

    #[test]
    fn total_ticks_is_precomputed() {
        let cat =
            TileCatalog::new(8, 2, two_frame_chain(), TerrainClass::default()).unwrap();
        assert_eq!(cat.animations[&1].total_ticks, 20);
        assert_eq!(cat.animations[&2].total_ticks, 20);
    }

    #[test]
    fn animated_frame_is_periodic() {
        let cat =
            TileCatalog::new(8, 2, two_frame_chain(), TerrainClass::default()).unwrap();
        for t in 0..40u64 {
            assert_eq!(cat.animated_frame(1, t), cat.animated_frame(1, t + 20));
        }
    }

    #[test]
    fn animated_frame_walks_forward_then_backward() {
        let cat =
            TileCatalog::new(8, 2, two_frame_chain(), TerrainClass::default()).unwrap();
        assert_eq!(cat.animated_frame(1, 0), 1);
        assert_eq!(cat.animated_frame(1, 10), 2);
        assert_eq!(cat.animated_frame(1, 19), 1);
    }

    #[test]
    fn zero_tiles_is_rejected() {
        assert!(TileCatalog::new(0, 0, HashMap::new(), TerrainClass::default()).is_err());
    }

    #[test]
    fn base_impassability_follows_cutoff() {
        let cat = TileCatalog::new(8, 2, HashMap::new(), TerrainClass::default()).unwrap();
        assert!(cat.is_base_impassable(0));
        assert!(cat.is_base_impassable(2));
        assert!(!cat.is_base_impassable(3));
    }

    #[test]
    fn clone_allocates_a_distinct_netobj_id() {
        let cat = TileCatalog::new(8, 2, HashMap::new(), TerrainClass::default()).unwrap();
        let original_id = cat.netobj_id();
        let clone = cat.clone();
        assert_ne!(clone.netobj_id(), original_id);
        assert!(crate::netobj::registry().is_live(original_id));
        assert!(crate::netobj::registry().is_live(clone.netobj_id()));
    }

    #[test]
    fn dropping_a_catalog_frees_its_netobj_id() {
        let cat = TileCatalog::new(8, 2, HashMap::new(), TerrainClass::default()).unwrap();
        let id = cat.netobj_id();
        drop(cat);
        assert!(!crate::netobj::registry().is_live(id));
    }
}
