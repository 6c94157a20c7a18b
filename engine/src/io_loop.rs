//! I/O loop: drives the peer protocol (spec §4.12, §6) one non-blocking
//! step at a time, so it can share a thread-pool slot or be polled
//! cooperatively alongside the update loop without ever calling a blocking
//! read. Grounded on `client/src/network/mod.rs`'s phase-tagged resumable
//! session driver.

use std::time::Duration;

use pokcore::channel::ByteChannel;
use pokcore::codec;
use pokcore::error::PokError;
use pokcore::game::GameInfo;
use pokcore::lock_table::{key_of, GameLockTable};

use crate::protocol::{
    self, GraphicsParams, GreetingExchange, IntermediateMask, SpriteCatalogReader,
    TileCatalogReader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoPhase {
    Greeting,
    MaskByte,
    Graphics,
    Tiles,
    Sprites,
    General,
}

/// Resumable driver for one peer session: greeting, then the
/// bitmask-gated intermediate exchange, then the steady-state `InterMsg`
/// relay (spec §4.12).
pub struct IoLoop {
    phase: IoPhase,
    greeting: GreetingExchange,
    mask: IntermediateMask,
    graphics: Option<GraphicsParams>,
    tiles_reader: Option<TileCatalogReader>,
    tiles: Option<pokcore::catalog::TileCatalog>,
    sprites_reader: Option<SpriteCatalogReader>,
    sprites: Option<pokcore::catalog::SpriteCatalog>,
}

impl IoLoop {
    pub fn new() -> Self {
        Self {
            phase: IoPhase::Greeting,
            greeting: GreetingExchange::new(),
            mask: IntermediateMask::empty(),
            graphics: None,
            tiles_reader: None,
            tiles: None,
            sprites_reader: None,
            sprites: None,
        }
    }

    /// Advances the session by as much as the currently-buffered bytes
    /// allow. `Err` carrying a retryable `PokError` means "come back once
    /// more bytes arrive"; any other `Err` ends the session.
    pub fn drive(
        &mut self,
        ch: &mut dyn ByteChannel,
        game: &mut GameInfo,
        lock_table: &GameLockTable,
    ) -> Result<(), PokError> {
        loop {
            match self.phase {
                IoPhase::Greeting => {
                    let _ = self.greeting.poll(ch)?;
                    self.phase = IoPhase::MaskByte;
                }
                IoPhase::MaskByte => {
                    let byte = codec::read_u8(ch)?;
                    self.mask = IntermediateMask::from_bits_truncate(byte);
                    self.phase = IoPhase::Graphics;
                }
                IoPhase::Graphics => {
                    if self.mask.contains(IntermediateMask::GRAPHICS) {
                        self.graphics = Some(protocol::read_graphics_params(ch)?);
                    }
                    self.phase = IoPhase::Tiles;
                }
                IoPhase::Tiles => {
                    if self.mask.contains(IntermediateMask::TILES) {
                        let sheet_dim = game.graphics.tile_pixels as u32;
                        let reader = self
                            .tiles_reader
                            .get_or_insert_with(|| TileCatalogReader::new(sheet_dim));
                        self.tiles = Some(reader.poll(ch)?);
                        self.tiles_reader = None;
                    }
                    self.phase = IoPhase::Sprites;
                }
                IoPhase::Sprites => {
                    if self.mask.contains(IntermediateMask::SPRITES) {
                        let tile_dim = game.graphics.tile_pixels as u32;
                        let reader = self
                            .sprites_reader
                            .get_or_insert_with(|| SpriteCatalogReader::new(tile_dim));
                        self.sprites = Some(reader.poll(ch)?);
                        self.sprites_reader = None;
                    }
                    install(game, lock_table, self.graphics.take(), self.tiles.take(), self.sprites.take());
                    self.phase = IoPhase::General;
                }
                IoPhase::General => {
                    return drive_general(ch, game);
                }
            }
        }
    }
}

impl Default for IoLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs whatever the intermediate exchange delivered under a single
/// lock-table key so the update loop never observes a half-swapped
/// graphics/catalog triple (spec §4.12).
fn install(
    game: &mut GameInfo,
    lock_table: &GameLockTable,
    graphics: Option<GraphicsParams>,
    tiles: Option<pokcore::catalog::TileCatalog>,
    sprites: Option<pokcore::catalog::SpriteCatalog>,
) {
    let key = key_of(game);
    lock_table.modify(key, || {
        if let Some(g) = graphics {
            game.graphics.window_columns = g.window_columns;
            game.graphics.window_rows = g.window_rows;
        }
        if let Some(catalog) = tiles {
            *game.tile_catalog.write() = catalog;
        }
        if let Some(catalog) = sprites {
            *game.sprite_catalog.write() = catalog;
        }
    });
}

/// One steady-state relay step: read at most one framed `InterMsg` into
/// `to_update`, then write at most one from `to_io` (spec §4.12).
fn drive_general(ch: &mut dyn ByteChannel, game: &mut GameInfo) -> Result<(), PokError> {
    match protocol::read_intermsg(ch) {
        Ok(msg) => game.to_update.post(msg),
        Err(e) if e.is_retryable() => {}
        Err(e) => return Err(e),
    }

    if let Some(msg) = game.to_io.take() {
        protocol::write_intermsg(ch, &msg)?;
        ch.flush()?;
    }

    if ch.end_of_comms() {
        return Err(PokError::end_of_comms());
    }
    Ok(())
}

/// Drives `io` at a fixed rate until the session ends or `game.running`
/// is cleared. Transient (`is_retryable`) errors are swallowed and retried
/// next tick; anything else stops the loop.
///
/// Paced through `game.io_timeout` rather than an unconditional per-call
/// sleep, the same way `update_loop::run` paces through `update_timeout`:
/// `tick` is applied once up front, then each iteration either drives one
/// step (interval due) or sleeps only the interval's `remaining()`.
pub fn run(
    mut io: IoLoop,
    ch: &mut dyn ByteChannel,
    game: &mut GameInfo,
    lock_table: &GameLockTable,
    tick: Duration,
    mut sleep: impl FnMut(Duration),
) -> Result<(), PokError> {
    game.io_timeout.set_amount(tick);
    loop {
        if !game.running {
            return Ok(());
        }
        if game.io_timeout.poll() {
            match io.drive(ch, game, lock_table) {
                Ok(()) => {}
                Err(e) if e.is_retryable() => {}
                Err(e) => return Err(e),
            }
        } else {
            sleep(game.io_timeout.remaining());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokcore::catalog::TerrainClass;
    use pokcore::channel::MemoryChannel;
    use pokcore::character::Character;
    use pokcore::character_context::CharacterContext;
    use pokcore::character_render_context::CharacterRenderContext;
    use pokcore::effect::{DaycycleEffect, FadeoutEffect};
    use pokcore::game::{GameContext, GraphicsSettings, MapTransition};
    use pokcore::geometry::{Location, Point, Size};
    use pokcore::intermsg::{InterMsg, Mailbox};
    use pokcore::keyboard::Key;
    use pokcore::map::{Map, MapKind};
    use pokcore::map_render_context::MapRenderContext;
    use pokcore::timeout::TimeoutInterval;
    use pokcore::world::World;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sample_game() -> GameInfo {
        let tile_catalog = Arc::new(parking_lot::RwLock::new(
            pokcore::catalog::TileCatalog::new(8, 0, HashMap::new(), TerrainClass::default())
                .unwrap(),
        ));
        let sprite_catalog = Arc::new(parking_lot::RwLock::new(
            pokcore::catalog::SpriteCatalog::new(1),
        ));
        let mut world = World::new();
        let map = Map::single_chunk(Size::new(4, 4), 1, MapKind::Static).unwrap();
        let origin = map.origin.clone();
        world.insert(map).unwrap();
        let mut map_rc =
            MapRenderContext::new(1, Size::new(4, 4), Size::new(9, 7), tile_catalog.clone(), 4, 8);
        map_rc.align(origin);

        GameInfo {
            graphics: GraphicsSettings::default(),
            tile_catalog,
            sprite_catalog,
            world,
            map_rc,
            character_rc: CharacterRenderContext::new(),
            player: Character::player(0, 1, Point::new(0, 0), Location::new(0, 0)),
            player_context: CharacterContext::new(4, 8),
            to_io: Mailbox::new(),
            to_update: Mailbox::new(),
            update_timeout: TimeoutInterval::new(Duration::from_millis(50)),
            io_timeout: TimeoutInterval::new(Duration::from_millis(50)),
            game_context: GameContext::Intro,
            map_trans: MapTransition::default(),
            fadeout_effect: FadeoutEffect::new(),
            daycycle_effect: DaycycleEffect::new(),
            running: true,
        }
    }

    #[test]
    fn drives_greeting_mask_and_one_general_message() {
        let mut ch = MemoryChannel::new();
        let mut game = sample_game();
        let lock_table = GameLockTable::new();
        let mut io = IoLoop::new();

        ch.feed(b"POKGAME-GREETING\nBINARY\ndefault\n").unwrap();
        ch.feed(&[0u8]).unwrap(); // empty intermediate mask
        protocol::write_intermsg(&mut ch, &InterMsg::key_input(Key::Down)).unwrap();
        let relay_bytes = ch.drain_output();
        ch.feed(&relay_bytes).unwrap();

        io.drive(&mut ch, &mut game, &lock_table).unwrap();

        let delivered = game.to_update.take().unwrap();
        assert_eq!(delivered.kind, pokcore::intermsg::InterMsgKind::KeyInput);
    }

    #[test]
    fn pending_mid_greeting_is_retryable_and_resumable() {
        let mut ch = MemoryChannel::new();
        let mut game = sample_game();
        let lock_table = GameLockTable::new();
        let mut io = IoLoop::new();

        ch.feed(b"POKGAME-GREE").unwrap();
        let err = io.drive(&mut ch, &mut game, &lock_table).unwrap_err();
        assert!(err.is_retryable());

        ch.feed(b"TING\nBINARY\ndefault\n").unwrap();
        ch.feed(&[0u8]).unwrap();
        io.drive(&mut ch, &mut game, &lock_table).unwrap();
    }
}
