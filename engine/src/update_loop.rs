//! Update loop: the cooperative single-thread loop owning input and tick
//! pacing (spec §4.11), grounded on `server/src/game_loop.rs::game_loop`'s
//! single-iteration-function shape with `ltime`/`tdiff` pacing and
//! sleep-to-rate.

use std::time::Duration;

use pokcore::character_context::Effect;
use pokcore::chunk::ChunkHandle;
use pokcore::effect::{FadeoutKind, FadeoutOutcome};
use pokcore::error::PokError;
use pokcore::game::{GameContext, GameInfo};
use pokcore::geometry::Direction;
use pokcore::intermsg::InterMsg;
use pokcore::keyboard::KeyboardState;
use pokcore::map_render_context::{MapRenderContext, MoveOutcome};
use pokcore::tile::{WarpKind, WarpMetadata};

/// Accumulates elapsed milliseconds toward the 250 ms tile-animation
/// sub-counter bump (spec §4.11 step 5).
#[derive(Default)]
pub struct TileAniAccumulator {
    accrued_ms: u32,
}

const TILE_ANI_BUMP_MS: u32 = 250;
const WARP_FADE_MS: u32 = 320;

impl TileAniAccumulator {
    pub fn accrue(&mut self, elapsed_ms: u32, game: &mut GameInfo) {
        self.accrued_ms += elapsed_ms;
        if self.accrued_ms >= TILE_ANI_BUMP_MS {
            self.accrued_ms -= TILE_ANI_BUMP_MS;
            game.map_rc.tile_ani_ticks += 1;
        }
    }
}

/// One iteration of the update loop (spec §4.11 steps 1-5). The caller
/// (`run`) owns step 6 (sleep pacing) and the exit condition.
pub fn update_tick(
    game: &mut GameInfo,
    keys: KeyboardState,
    elapsed_ticks: u32,
    tile_ani: &mut TileAniAccumulator,
) {
    if game.game_context == GameContext::World
        && !game.map_rc.update
        && !game.player_context.is_updating()
    {
        if let Some(dir) = keys.pressed_direction() {
            handle_direction_input(game, dir);
        }
    }

    let dimension = game.graphics.tile_pixels;
    game.map_rc.update_scroll(dimension, elapsed_ticks);
    game.player_context.update(dimension, elapsed_ticks);

    if game.fadeout_effect.update(elapsed_ticks) == FadeoutOutcome::Completed {
        apply_post_fadeout_transition(game);
    }

    if !game.map_rc.update && !game.player_context.is_updating() {
        tile_ani.accrue(elapsed_ticks, game);
    }
}

fn handle_direction_input(game: &mut GameInfo, dir: Direction) {
    if let Some(warp_kind) = tile_warp_kind(game) {
        if warp_kind.latent_direction() == Some(dir) && game.player.direction == dir {
            if let Some(meta) = current_tile_warp_metadata(game) {
                arm_warp_fadeout(game, meta, warp_kind, Some(dir));
                return;
            }
        }
    }

    let turning = dir != game.player.direction;
    game.player.direction = dir;

    if turning {
        let _ = game.player_context.set_update(dir, Effect::Normal, 0);
        return;
    }

    let snapshot = (game.map_rc.relpos, game.map_rc.chunkpos, game.map_rc.focus);
    let mut outcome = game.map_rc.move_dir(dir, true);

    if outcome == MoveOutcome::Moved && player_collides_with_other(game) {
        game.map_rc.relpos = snapshot.0;
        game.map_rc.chunkpos = snapshot.1;
        game.map_rc.focus = snapshot.2;
        outcome = MoveOutcome::Blocked;
    }

    game.player_context.slow_down = outcome == MoveOutcome::Blocked;

    if outcome == MoveOutcome::Moved {
        if let Some(kind) = tile_warp_kind(game) {
            if kind != WarpKind::None && kind.latent_direction().is_none() {
                if let Some(meta) = current_tile_warp_metadata(game) {
                    arm_warp_fadeout(game, meta, kind, None);
                    return;
                }
            }
        }
        game.map_rc.set_update(dir, game.graphics.tile_pixels);
        game.player.chunk_pos = game.map_rc.chunkpos;
        game.player.tile_pos = game.map_rc.relpos;
        let _ = game
            .player_context
            .set_update(dir, Effect::Normal, game.graphics.tile_pixels);
    } else {
        let _ = game.player_context.set_update(dir, Effect::Normal, 0);
    }
}

fn arm_warp_fadeout(
    game: &mut GameInfo,
    meta: WarpMetadata,
    kind: WarpKind,
    one_tile_move: Option<Direction>,
) {
    game.map_trans.map_no = meta.warp_map;
    game.map_trans.chunk_pos = meta.warp_chunk;
    game.map_trans.tile_pos = meta.warp_location;
    game.map_trans.one_tile_move = one_tile_move;
    game.game_context = if one_tile_move.is_some() {
        GameContext::WarpLatentFadeout { cave: kind.is_cave() }
    } else {
        GameContext::WarpFadeout { cave: kind.is_cave() }
    };
    game.fadeout_effect
        .set_update(WARP_FADE_MS, FadeoutKind::BlackScreen, false, 0);
}

fn current_chunk_handle(map_rc: &MapRenderContext) -> Option<ChunkHandle> {
    map_rc
        .viewing_chunks
        .get(map_rc.focus.1 as usize)?
        .get(map_rc.focus.0 as usize)?
        .as_ref()?
        .upgrade()
}

fn tile_warp_kind(game: &GameInfo) -> Option<WarpKind> {
    let chunk = current_chunk_handle(&game.map_rc)?;
    let guard = chunk.read();
    Some(
        guard
            .tile(game.map_rc.relpos.column, game.map_rc.relpos.row)
            .warp_kind,
    )
}

fn current_tile_warp_metadata(game: &GameInfo) -> Option<WarpMetadata> {
    let chunk = current_chunk_handle(&game.map_rc)?;
    let guard = chunk.read();
    guard
        .tile(game.map_rc.relpos.column, game.map_rc.relpos.row)
        .warp
}

fn player_collides_with_other(game: &GameInfo) -> bool {
    game.character_rc.iter().any(|slot| {
        slot.character.map_no == game.player.map_no
            && slot.character.chunk_pos == game.map_rc.chunkpos
            && slot.character.tile_pos == game.map_rc.relpos
    })
}

fn apply_post_fadeout_transition(game: &mut GameInfo) {
    match game.game_context {
        GameContext::Intro => {
            game.game_context = GameContext::World;
        }
        GameContext::WarpFadeout { .. } => {
            install_map_transition(game);
            game.game_context = GameContext::WarpFadein;
            game.fadeout_effect
                .set_update(WARP_FADE_MS, FadeoutKind::BlackScreen, true, 0);
        }
        GameContext::WarpLatentFadeout { .. } => {
            install_map_transition(game);
            if let Some(dir) = game.map_trans.one_tile_move {
                game.map_rc.move_dir(dir, false);
                game.map_rc.set_update(dir, game.graphics.tile_pixels);
                game.player.chunk_pos = game.map_rc.chunkpos;
                game.player.tile_pos = game.map_rc.relpos;
                let _ = game.player_context.set_update(
                    dir,
                    Effect::Normal,
                    game.graphics.tile_pixels,
                );
            }
            game.game_context = GameContext::WarpFadein;
            game.fadeout_effect
                .set_update(WARP_FADE_MS, FadeoutKind::BlackScreen, true, 0);
        }
        GameContext::WarpFadein => {
            game.game_context = GameContext::World;
        }
        GameContext::World => {}
    }
}

/// Moves the player onto `map_trans`'s target. When the destination map
/// differs from the currently rendered one, the new map's own origin chunk
/// anchors the walk (spec §4.6: there is no adjacency between chunk graphs
/// belonging to different maps); otherwise `center_on` walks the existing
/// graph from wherever the context currently sits.
fn install_map_transition(game: &mut GameInfo) {
    game.player.map_no = game.map_trans.map_no;
    game.player.chunk_pos = game.map_trans.chunk_pos;
    game.player.tile_pos = game.map_trans.tile_pos;

    if game.map_trans.map_no != game.map_rc.map_no {
        if let Some(map) = game.world.get(game.map_trans.map_no) {
            let origin = map.origin.clone();
            let origin_pos = map.origin_pos;
            game.map_rc.map_no = game.map_trans.map_no;
            game.map_rc.chunkpos = origin_pos;
            let _ =
                game.map_rc
                    .center_on(origin, game.map_trans.chunk_pos, game.map_trans.tile_pos);
        }
    } else if let Some(current) = current_chunk_handle(&game.map_rc) {
        let _ =
            game.map_rc
                .center_on(current, game.map_trans.chunk_pos, game.map_trans.tile_pos);
    }
}

/// Reads the `io -> update` direction of an `InterMsg`, i.e. whatever the
/// I/O loop or default scenario last posted for us (spec §4.12).
pub fn poll_incoming(game: &mut GameInfo) -> Option<InterMsg> {
    game.to_update.take()
}

pub fn post_outgoing(game: &mut GameInfo, msg: InterMsg) {
    game.to_io.post(msg);
}

/// Drives `update_tick` at a fixed rate until `game.running` is cleared.
/// `poll_keys` and `sleep` are injected so tests and the headless harness
/// can supply deterministic key snapshots and avoid real sleeping.
///
/// Pacing goes through `game.update_timeout` rather than sleeping `tick`
/// blindly each iteration: `tick` is applied to the interval once up front,
/// then every iteration sleeps only for whatever `remaining()` reports
/// before re-polling, so a caller that drives this loop from a cooperative
/// scheduler (where iterations don't line up exactly on `tick` boundaries)
/// still advances at the configured rate rather than drifting.
pub fn run(
    game: &mut GameInfo,
    tick: Duration,
    mut poll_keys: impl FnMut() -> KeyboardState,
    mut sleep: impl FnMut(Duration),
) -> Result<(), PokError> {
    let mut tile_ani = TileAniAccumulator::default();
    let elapsed_ticks = tick.as_millis() as u32;
    game.update_timeout.set_amount(tick);
    while game.running {
        if game.update_timeout.poll() {
            let keys = poll_keys();
            update_tick(game, keys, elapsed_ticks, &mut tile_ani);
        } else {
            sleep(game.update_timeout.remaining());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokcore::catalog::{SpriteCatalog, TerrainClass, TileCatalog};
    use pokcore::character::Character;
    use pokcore::character_context::CharacterContext;
    use pokcore::character_render_context::CharacterRenderContext;
    use pokcore::effect::{DaycycleEffect, FadeoutEffect};
    use pokcore::geometry::{Location, Point, Size};
    use pokcore::intermsg::Mailbox;
    use pokcore::map::{Map, MapKind};
    use pokcore::timeout::TimeoutInterval;
    use pokcore::world::World;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sample_game() -> GameInfo {
        let tile_catalog = Arc::new(parking_lot::RwLock::new(
            TileCatalog::new(8, 0, HashMap::new(), TerrainClass::default()).unwrap(),
        ));
        let sprite_catalog = Arc::new(parking_lot::RwLock::new(SpriteCatalog::new(1)));
        let mut world = World::new();
        let map = Map::single_chunk(Size::new(10, 10), 1, MapKind::Static).unwrap();
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
        map_rc.relpos = Location::new(5, 5);

        GameInfo {
            graphics: pokcore::game::GraphicsSettings::default(),
            tile_catalog,
            sprite_catalog,
            world,
            map_rc,
            character_rc: CharacterRenderContext::new(),
            player: Character::player(0, 1, Point::new(0, 0), Location::new(5, 5)),
            player_context: CharacterContext::new(4, 8),
            to_io: Mailbox::new(),
            to_update: Mailbox::new(),
            update_timeout: TimeoutInterval::new(Duration::from_millis(50)),
            io_timeout: TimeoutInterval::new(Duration::from_millis(50)),
            game_context: GameContext::World,
            map_trans: Default::default(),
            fadeout_effect: FadeoutEffect::new(),
            daycycle_effect: DaycycleEffect::new(),
            running: true,
        }
    }

    #[test]
    fn walking_into_open_space_advances_relpos_and_arms_animation() {
        let mut game = sample_game();
        let mut keys = KeyboardState::default();
        keys.down = true;
        let mut tile_ani = TileAniAccumulator::default();
        update_tick(&mut game, keys, 8, &mut tile_ani);
        assert_eq!(game.player.tile_pos, Location::new(5, 6));
        assert!(game.player_context.is_updating());
    }

    #[test]
    fn turning_without_moving_just_faces_the_new_direction() {
        let mut game = sample_game();
        game.player.direction = Direction::Down;
        let mut keys = KeyboardState::default();
        keys.left = true;
        let mut tile_ani = TileAniAccumulator::default();
        update_tick(&mut game, keys, 8, &mut tile_ani);
        assert_eq!(game.player.direction, Direction::Left);
        assert_eq!(game.player.tile_pos, Location::new(5, 5));
    }

    #[test]
    fn colliding_with_another_character_undoes_the_move() {
        let mut game = sample_game();
        game.character_rc.add(
            Character::new(1, 1, Point::new(0, 0), Location::new(5, 6)),
            CharacterContext::new(4, 8),
        );
        game.player.direction = Direction::Down;
        let mut keys = KeyboardState::default();
        keys.down = true;
        let mut tile_ani = TileAniAccumulator::default();
        update_tick(&mut game, keys, 8, &mut tile_ani);
        assert_eq!(game.player.tile_pos, Location::new(5, 5));
        assert!(game.player_context.slow_down);
    }
}
