//! `GameInfo`: the root struct holding everything the update and I/O
//! loops share (spec §3), grounded on `server/src/game_loop.rs`'s
//! `GameState` struct-of-arrays root.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{SpriteCatalog, TileCatalog};
use crate::character::Character;
use crate::character_context::CharacterContext;
use crate::character_render_context::CharacterRenderContext;
use crate::effect::{DaycycleEffect, FadeoutEffect};
use crate::intermsg::Mailbox;
use crate::map_render_context::MapRenderContext;
use crate::timeout::TimeoutInterval;
use crate::world::World;

/// Graphics subsystem parameters received in the intermediate exchange
/// (spec §6); the windowing backend itself is out of scope (spec §1), so
/// this carries only the fields the engine needs to reason about (window
/// dimension, player screen offset).
#[derive(Debug, Clone, Copy)]
pub struct GraphicsSettings {
    pub window_columns: u32,
    pub window_rows: u32,
    pub tile_pixels: i32,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            window_columns: 9,
            window_rows: 7,
            tile_pixels: 32,
        }
    }
}

/// Coarse game-context state tag driving the post-fadeout transition
/// table in the update loop (spec §4.11 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameContext {
    Intro,
    World,
    WarpFadeout { cave: bool },
    WarpLatentFadeout { cave: bool },
    WarpFadein,
}

/// Cached warp target installed by the update loop when a warp fadeout
/// begins, and applied when it completes (spec §4.11 step 4, §8 scenario
/// 4/6).
#[derive(Debug, Clone, Copy, Default)]
pub struct MapTransition {
    pub map_no: u32,
    pub chunk_pos: crate::geometry::Point,
    pub tile_pos: crate::geometry::Location,
    pub one_tile_move: Option<crate::geometry::Direction>,
}

pub struct GameInfo {
    pub graphics: GraphicsSettings,
    pub tile_catalog: Arc<RwLock<TileCatalog>>,
    pub sprite_catalog: Arc<RwLock<SpriteCatalog>>,
    pub world: World,
    pub map_rc: MapRenderContext,
    pub character_rc: CharacterRenderContext,
    pub player: Character,
    pub player_context: CharacterContext,
    /// update -> io mailbox.
    pub to_io: Mailbox,
    /// io -> update mailbox.
    pub to_update: Mailbox,
    pub update_timeout: TimeoutInterval,
    pub io_timeout: TimeoutInterval,
    pub game_context: GameContext,
    pub map_trans: MapTransition,
    pub fadeout_effect: FadeoutEffect,
    pub daycycle_effect: DaycycleEffect,
    /// Cleared to signal the update loop to exit (spec §3, §5).
    pub running: bool,
}

impl GameInfo {
    pub fn request_shutdown(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TerrainClass;
    use crate::geometry::{Point, Size};
    use crate::map::MapKind;
    use std::collections::HashMap;

    fn sample_game() -> GameInfo {
        let tile_catalog = Arc::new(RwLock::new(
            TileCatalog::new(8, 2, HashMap::new(), TerrainClass::default()).unwrap(),
        ));
        let sprite_catalog = Arc::new(RwLock::new(SpriteCatalog::new(1)));
        let mut world = World::new();
        let map = crate::map::Map::single_chunk(Size::new(10, 10), 1, MapKind::Static).unwrap();
        let origin = map.origin.clone();
        world.insert(map).unwrap();
        let mut map_rc = MapRenderContext::new(
            1,
            Size::new(10, 10),
            Size::new(9, 7),
            tile_catalog.clone(),
            4,
            8,
        );
        map_rc.align(origin);

        GameInfo {
            graphics: GraphicsSettings::default(),
            tile_catalog,
            sprite_catalog,
            world,
            map_rc,
            character_rc: CharacterRenderContext::new(),
            player: Character::player(0, 1, Point::new(0, 0), crate::geometry::Location::new(5, 5)),
            player_context: CharacterContext::new(4, 8),
            to_io: Mailbox::new(),
            to_update: Mailbox::new(),
            update_timeout: TimeoutInterval::new(std::time::Duration::from_millis(50)),
            io_timeout: TimeoutInterval::new(std::time::Duration::from_millis(50)),
            game_context: GameContext::Intro,
            map_trans: MapTransition::default(),
            fadeout_effect: FadeoutEffect::new(),
            daycycle_effect: DaycycleEffect::new(),
            running: true,
        }
    }

    #[test]
    fn shutdown_clears_running_flag() {
        let mut game = sample_game();
        assert!(game.running);
        game.request_shutdown();
        assert!(!game.running);
    }
}
