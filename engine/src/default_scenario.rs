//! The local default scenario: stands in for a real peer session when
//! none is configured, so the engine can come up and render a world
//! without a socket (DESIGN.md open question resolution #3). It answers
//! the intermediate exchange synchronously with a single fully passable
//! chunk instead of reading one off a `ByteChannel`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use pokcore::catalog::{SpriteCatalog, TerrainClass, TileCatalog};
use pokcore::character::Character;
use pokcore::character_context::CharacterContext;
use pokcore::character_render_context::CharacterRenderContext;
use pokcore::constants::DEFAULT_CHUNK_SIZE;
use pokcore::effect::{DaycycleEffect, FadeoutEffect};
use pokcore::game::{GameContext, GameInfo, GraphicsSettings, MapTransition};
use pokcore::geometry::{Location, Size};
use pokcore::intermsg::{InterMsg, Mailbox};
use pokcore::map::{Map, MapKind};
use pokcore::map_render_context::MapRenderContext;
use pokcore::timeout::TimeoutInterval;
use pokcore::world::World;

const DEFAULT_MAP_NO: u32 = 0;
const DEFAULT_GRANULARITY: i32 = 4;
const DEFAULT_SCROLL_TICKS_AMT: u32 = 8;
const DEFAULT_ANI_TICKS_AMT: u32 = 8;
/// Tile id 0 is reserved as "blank" and is always base-impassable (spec
/// §4.5); the default chunk fills every cell with id 1 instead so nothing
/// in it blocks movement.
const DEFAULT_FLOOR_TILE: u16 = 1;

/// Builds a ready-to-play `GameInfo` with a single fully passable chunk,
/// the player standing at its center, and no peer connection. Every cell
/// is filled with `DEFAULT_FLOOR_TILE`, which sits above the catalog's
/// zero impassability cutoff, so nothing in the chunk blocks movement.
pub fn build_default_game() -> GameInfo {
    let chunk_size = Size::new(DEFAULT_CHUNK_SIZE as u32, DEFAULT_CHUNK_SIZE as u32);
    let graphics = GraphicsSettings::default();

    let tile_catalog = Arc::new(RwLock::new(
        TileCatalog::new(2, 0, HashMap::new(), TerrainClass::default())
            .expect("a two-tile catalog with no animations is always valid"),
    ));
    let sprite_catalog = Arc::new(RwLock::new(SpriteCatalog::new(1)));

    let map = Map::single_chunk(chunk_size, DEFAULT_MAP_NO, MapKind::Static)
        .expect("a non-zero default chunk size is always valid");
    let origin = map.origin.clone();
    let origin_pos = map.origin_pos;
    {
        let mut chunk = origin.write();
        for row in 0..chunk_size.rows {
            for column in 0..chunk_size.columns {
                chunk.set_tile(
                    column,
                    row,
                    pokcore::tile::Tile {
                        tile_id: DEFAULT_FLOOR_TILE,
                        ..pokcore::tile::Tile::blank()
                    },
                );
            }
        }
    }

    let mut world = World::new();
    world
        .insert(map)
        .expect("the default map number is only ever inserted once");

    let window_size = Size::new(graphics.window_columns, graphics.window_rows);
    let mut map_rc = MapRenderContext::new(
        DEFAULT_MAP_NO,
        chunk_size,
        window_size,
        tile_catalog.clone(),
        DEFAULT_GRANULARITY,
        DEFAULT_SCROLL_TICKS_AMT,
    );
    let center = Location::new(chunk_size.columns / 2, chunk_size.rows / 2);
    map_rc.align(origin);
    map_rc.relpos = center;
    map_rc.chunkpos = origin_pos;

    let player = Character::player(0, DEFAULT_MAP_NO, origin_pos, center);

    GameInfo {
        graphics,
        tile_catalog,
        sprite_catalog,
        world,
        map_rc,
        character_rc: CharacterRenderContext::new(),
        player,
        player_context: CharacterContext::new(DEFAULT_GRANULARITY, DEFAULT_ANI_TICKS_AMT),
        to_io: Mailbox::new(),
        to_update: Mailbox::new(),
        update_timeout: TimeoutInterval::new(std::time::Duration::from_millis(
            pokcore::constants::DEFAULT_TICK_MS,
        )),
        io_timeout: TimeoutInterval::new(std::time::Duration::from_millis(
            pokcore::constants::DEFAULT_TICK_MS,
        )),
        game_context: GameContext::Intro,
        map_trans: MapTransition::default(),
        fadeout_effect: FadeoutEffect::new(),
        daycycle_effect: DaycycleEffect::new(),
        running: true,
    }
}

/// Leaves a `Noop` waiting in the update loop's mailbox, as a real peer's
/// I/O loop would after completing its own intermediate exchange (spec
/// §4.12). Safe to call repeatedly: `Mailbox::post` itself preserves an
/// already-queued, unprocessed message by swapping in a `Noop` rather than
/// dropping it.
pub fn seed_mailbox(game: &mut GameInfo) {
    game.to_update.post(InterMsg::noop());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_game_places_the_player_on_the_chunk_center() {
        let game = build_default_game();
        let expected = Location::new(
            (DEFAULT_CHUNK_SIZE as u32) / 2,
            (DEFAULT_CHUNK_SIZE as u32) / 2,
        );
        assert_eq!(game.player.tile_pos, expected);
        assert_eq!(game.map_rc.relpos, expected);
    }

    #[test]
    fn default_chunk_is_fully_passable() {
        let game = build_default_game();
        let catalog = game.tile_catalog.read();
        assert!(!catalog.is_base_impassable(DEFAULT_FLOOR_TILE));

        let chunk = game.world.get(DEFAULT_MAP_NO).unwrap().origin.clone();
        assert_eq!(chunk.read().tile(0, 0).tile_id, DEFAULT_FLOOR_TILE);
    }

    #[test]
    fn seeding_the_mailbox_leaves_a_noop_ready() {
        let mut game = build_default_game();
        seed_mailbox(&mut game);
        let msg = game.to_update.take().unwrap();
        assert_eq!(msg.kind, pokcore::intermsg::InterMsgKind::Noop);
    }
}
