//! Peer version protocol: greeting, intermediate, and general exchanges
//! (spec §6), grounded on `client/src/network/mod.rs`'s framed-read loop
//! and `original_source/src/net.h` / `protocol.h` for the exchange shape.

use std::collections::HashMap;

use pokcore::catalog::{AnimationEntry, SpriteCatalog, TerrainClass, TileCatalog};
use pokcore::channel::ByteChannel;
use pokcore::codec;
use pokcore::error::{ErrorKind, MapError, PokError};
use pokcore::geometry::{Location, Point};
use pokcore::intermsg::{InterMsg, InterMsgKind, InterMsgModFlags, InterMsgPayload};
use pokcore::keyboard::Key;
use pokcore::tile::{OverrideBits, Tile, WarpKind, WarpMetadata};

pub const GREETING_LINE: &str = "POKGAME-GREETING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    Binary,
    Text,
}

impl ProtocolMode {
    fn parse(line: &str) -> Result<Self, PokError> {
        match line.trim() {
            "BINARY" => Ok(ProtocolMode::Binary),
            "TEXT" => Ok(ProtocolMode::Text),
            other => Err(PokError::new(
                ErrorKind::Map(MapError::BadFormat),
                format!("unrecognized protocol mode line {other:?}"),
            )),
        }
    }
}

const LINE_PEEK_CHUNK: usize = 256;

/// Reads up to `\n` or end-of-stream, returning `Pending` (without
/// discarding progress — `buf` keeps what was read so far) if the line is
/// not yet complete. Mirrors `read_string_zero_terminated` but on a line
/// terminator, since the greeting exchange is ASCII line-oriented (spec
/// §6). Scans buffered bytes with `peek` and only `pop`s what the line
/// actually consumed, rather than reading one byte at a time.
pub fn read_line(ch: &mut dyn ByteChannel, buf: &mut Vec<u8>) -> Result<String, PokError> {
    loop {
        let chunk = ch.peek(LINE_PEEK_CHUNK)?;
        if chunk.is_empty() {
            return Err(PokError::pending());
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                buf.extend_from_slice(&chunk[..idx]);
                ch.pop(idx + 1)?;
                return Ok(String::from_utf8_lossy(buf).into_owned());
            }
            None => {
                buf.extend_from_slice(&chunk);
                ch.pop(chunk.len())?;
            }
        }
    }
}

pub fn write_line(ch: &mut dyn ByteChannel, line: &str) -> Result<(), PokError> {
    let mut full = line.as_bytes().to_vec();
    full.push(b'\n');
    let written = ch.write(&full)?;
    if written < full.len() {
        ch.save(&full[written..])?;
    }
    Ok(())
}

/// Resumable state for the three-line greeting exchange: our greeting is
/// sent eagerly (best-effort single write); the peer's greeting, mode,
/// and label lines are read incrementally across suspended calls.
#[derive(Default)]
pub struct GreetingExchange {
    sent: bool,
    peer_greeting: Option<String>,
    mode: Option<ProtocolMode>,
    label: Option<String>,
    line_buf: Vec<u8>,
}

pub struct GreetingResult {
    pub mode: ProtocolMode,
    pub label: String,
}

impl GreetingExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives the exchange one step further; returns `Ok(Some(result))`
    /// once all three lines have been read, `Err(pending)` if more bytes
    /// are needed, or a hard error on malformed input.
    pub fn poll(&mut self, ch: &mut dyn ByteChannel) -> Result<Option<GreetingResult>, PokError> {
        if !self.sent {
            write_line(ch, GREETING_LINE)?;
            self.sent = true;
        }
        if self.peer_greeting.is_none() {
            let line = read_line(ch, &mut self.line_buf)?;
            self.line_buf.clear();
            if line.trim() != GREETING_LINE {
                return Err(PokError::new(
                    ErrorKind::Map(MapError::BadFormat),
                    "peer did not send the expected greeting line",
                ));
            }
            self.peer_greeting = Some(line);
        }
        if self.mode.is_none() {
            let line = read_line(ch, &mut self.line_buf)?;
            self.line_buf.clear();
            self.mode = Some(ProtocolMode::parse(&line)?);
        }
        if self.label.is_none() {
            let line = read_line(ch, &mut self.line_buf)?;
            self.line_buf.clear();
            self.label = Some(line);
        }
        Ok(Some(GreetingResult {
            mode: self.mode.unwrap(),
            label: self.label.clone().unwrap(),
        }))
    }
}

bitflags::bitflags! {
    /// Intermediate-exchange bitmask: which structures the peer will
    /// send (spec §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IntermediateMask: u8 {
        const GRAPHICS = 0b0000_0001;
        const TILES    = 0b0000_0010;
        const SPRITES  = 0b0000_0100;
    }
}

pub struct GraphicsParams {
    pub window_columns: u32,
    pub window_rows: u32,
}

/// Reads the graphics subsystem parameters selected by the intermediate
/// exchange's bitmask (spec §6): window dimension in tiles.
pub fn read_graphics_params(ch: &mut dyn ByteChannel) -> Result<GraphicsParams, PokError> {
    let window_columns = codec::read_u32(ch)?;
    let window_rows = codec::read_u32(ch)?;
    Ok(GraphicsParams {
        window_columns,
        window_rows,
    })
}

/// Reads one tile in its wire form (spec §6): `u16 tile_id; u8 warp_kind;
/// if warp_kind != none: u32 warp_map, Point warp_chunk, Location
/// warp_location; u8 override_bits`. Delegates to `Tile::read`, which the
/// map loader shares for its on-disk/in-memory grids.
pub fn read_tile(ch: &mut dyn ByteChannel) -> Result<Tile, PokError> {
    Tile::read(ch)
}

pub fn write_tile(ch: &mut dyn ByteChannel, tile: &Tile) -> Result<(), PokError> {
    tile.write(ch)
}

/// Resumable reader for one length-prefixed `u16` list (spec §6's terrain
/// lists): the count and whatever items have landed so far persist across
/// suspended calls, the way `GreetingExchange` persists its lines.
#[derive(Default)]
struct U16ListReader {
    count: Option<u16>,
    items: Vec<u16>,
}

impl U16ListReader {
    fn poll(&mut self, ch: &mut dyn ByteChannel) -> Result<Vec<u16>, PokError> {
        if self.count.is_none() {
            self.count = Some(codec::read_u16(ch)?);
        }
        let count = self.count.unwrap();
        while self.items.len() < count as usize {
            self.items.push(codec::read_u16(ch)?);
        }
        Ok(std::mem::take(&mut self.items))
    }
}

/// Resumable reader for a tile catalog in its wire form (spec §6):
/// tile_count, impassability, an image sheet (skipped here — pixel
/// decoding is external per spec §1, so we only consume its byte length),
/// an animation table, and four terrain-class lists in the fixed order
/// `water, lava, waterfall, whirlpool`. (The remaining classes listed in
/// spec §4.5 — cuttable, headbuttable, ice, ledge-down/-left/-right —
/// are not part of the wire form and are left at their default empty
/// state, populated only by the map/tile authoring tools outside this
/// engine's scope.)
///
/// Every field read here persists on `self` rather than in a local, so a
/// `Pending` partway through the sheet skip or the animation table
/// resumes on the next `poll` instead of re-reading bytes the channel has
/// already consumed.
pub struct TileCatalogReader {
    sheet_dim: u32,
    tile_count: Option<u16>,
    impassability: Option<u16>,
    bytes_per_pixel: Option<usize>,
    sheet_bytes_read: usize,
    ani_count: Option<u16>,
    ani_index: u16,
    animations: HashMap<u16, AnimationEntry>,
    partial_ticks: Option<u8>,
    partial_forward_id: Option<u16>,
    water: Option<Vec<u16>>,
    lava: Option<Vec<u16>>,
    waterfall: Option<Vec<u16>>,
    whirlpool: Option<Vec<u16>>,
    water_reader: U16ListReader,
    lava_reader: U16ListReader,
    waterfall_reader: U16ListReader,
    whirlpool_reader: U16ListReader,
}

impl TileCatalogReader {
    pub fn new(sheet_dim: u32) -> Self {
        Self {
            sheet_dim,
            tile_count: None,
            impassability: None,
            bytes_per_pixel: None,
            sheet_bytes_read: 0,
            ani_count: None,
            ani_index: 0,
            animations: HashMap::new(),
            partial_ticks: None,
            partial_forward_id: None,
            water: None,
            lava: None,
            waterfall: None,
            whirlpool: None,
            water_reader: U16ListReader::default(),
            lava_reader: U16ListReader::default(),
            waterfall_reader: U16ListReader::default(),
            whirlpool_reader: U16ListReader::default(),
        }
    }

    pub fn poll(&mut self, ch: &mut dyn ByteChannel) -> Result<TileCatalog, PokError> {
        if self.tile_count.is_none() {
            self.tile_count = Some(codec::read_u16(ch)?);
        }
        if self.impassability.is_none() {
            self.impassability = Some(codec::read_u16(ch)?);
        }
        if self.bytes_per_pixel.is_none() {
            let flag = codec::read_u8(ch)?;
            self.bytes_per_pixel = Some(if flag == 0 { 3 } else { 4 });
        }

        let tile_count = self.tile_count.unwrap();
        let bytes_per_pixel = self.bytes_per_pixel.unwrap();
        let sheet_bytes =
            self.sheet_dim as usize * (tile_count as usize * self.sheet_dim as usize) * bytes_per_pixel;
        while self.sheet_bytes_read < sheet_bytes {
            let chunk = ch.read((sheet_bytes - self.sheet_bytes_read).min(4096))?;
            if chunk.is_empty() {
                return Err(PokError::pending());
            }
            self.sheet_bytes_read += chunk.len();
        }

        if self.ani_count.is_none() {
            self.ani_count = Some(codec::read_u16(ch)?);
        }
        let ani_count = self.ani_count.unwrap();
        while self.ani_index < ani_count {
            if self.partial_ticks.is_none() {
                self.partial_ticks = Some(codec::read_u8(ch)?);
            }
            if self.partial_forward_id.is_none() {
                self.partial_forward_id = Some(codec::read_u16(ch)?);
            }
            let backward_id = codec::read_u16(ch)?;
            self.animations.insert(
                self.ani_index,
                AnimationEntry {
                    ticks: self.partial_ticks.take().unwrap(),
                    forward_id: self.partial_forward_id.take().unwrap(),
                    backward_id,
                    total_ticks: 0,
                },
            );
            self.ani_index += 1;
        }

        if self.water.is_none() {
            self.water = Some(self.water_reader.poll(ch)?);
        }
        if self.lava.is_none() {
            self.lava = Some(self.lava_reader.poll(ch)?);
        }
        if self.waterfall.is_none() {
            self.waterfall = Some(self.waterfall_reader.poll(ch)?);
        }
        if self.whirlpool.is_none() {
            self.whirlpool = Some(self.whirlpool_reader.poll(ch)?);
        }

        let terrain = TerrainClass {
            water: self.water.take().unwrap(),
            lava: self.lava.take().unwrap(),
            waterfall: self.waterfall.take().unwrap(),
            whirlpool: self.whirlpool.take().unwrap(),
            ..Default::default()
        };

        TileCatalog::new(
            tile_count,
            self.impassability.unwrap(),
            std::mem::take(&mut self.animations),
            terrain,
        )
    }
}

/// Resumable reader for a sprite catalog in its wire form (spec §6):
/// `sprite_set_count` plus an image sheet whose pixel bytes are outside
/// this crate's scope.
pub struct SpriteCatalogReader {
    tile_dim: u32,
    sprite_set_count: Option<u16>,
    sheet_bytes_read: usize,
}

impl SpriteCatalogReader {
    pub fn new(tile_dim: u32) -> Self {
        Self {
            tile_dim,
            sprite_set_count: None,
            sheet_bytes_read: 0,
        }
    }

    pub fn poll(&mut self, ch: &mut dyn ByteChannel) -> Result<SpriteCatalog, PokError> {
        if self.sprite_set_count.is_none() {
            self.sprite_set_count = Some(codec::read_u16(ch)?);
        }
        let sprite_set_count = self.sprite_set_count.unwrap();
        let sheet_bytes =
            (10 * self.tile_dim) as usize * (sprite_set_count as usize * self.tile_dim as usize) * 4;
        while self.sheet_bytes_read < sheet_bytes {
            let chunk = ch.read((sheet_bytes - self.sheet_bytes_read).min(4096))?;
            if chunk.is_empty() {
                return Err(PokError::pending());
            }
            self.sheet_bytes_read += chunk.len();
        }
        Ok(SpriteCatalog::new(sprite_set_count))
    }
}

/// Reads one `InterMsg` in its wire form (spec §6): `u8 kind; u8
/// modflags; payload`.
pub fn read_intermsg(ch: &mut dyn ByteChannel) -> Result<InterMsg, PokError> {
    let kind_byte = codec::read_u8(ch)?;
    let modflags_byte = codec::read_u8(ch)?;
    let modflags = match modflags_byte {
        1 => InterMsgModFlags::MessageMenu,
        2 => InterMsgModFlags::InputMenu,
        _ => InterMsgModFlags::None,
    };
    let (kind, payload) = match kind_byte {
        0 => (InterMsgKind::Uninitialized, InterMsgPayload::None),
        1 => (InterMsgKind::Noop, InterMsgPayload::None),
        2 => {
            let key_code = codec::read_u16(ch)?;
            (InterMsgKind::KeyInput, InterMsgPayload::Key(decode_key(key_code)?))
        }
        3 => {
            let mut buf = Vec::new();
            let text = codec::read_string_zero_terminated(ch, &mut buf)?;
            (InterMsgKind::Menu, InterMsgPayload::Text(text))
        }
        4 => {
            let mut buf = Vec::new();
            let text = codec::read_string_zero_terminated(ch, &mut buf)?;
            (InterMsgKind::StringInput, InterMsgPayload::Text(text))
        }
        other => {
            return Err(PokError::new(
                ErrorKind::Map(MapError::BadFormat),
                format!("unrecognized InterMsg kind byte {other}"),
            ))
        }
    };
    Ok(InterMsg {
        kind,
        modflags,
        ready: true,
        processed: false,
        payload,
    })
}

pub fn write_intermsg(ch: &mut dyn ByteChannel, msg: &InterMsg) -> Result<(), PokError> {
    let kind_byte: u8 = match msg.kind {
        InterMsgKind::Uninitialized => 0,
        InterMsgKind::Noop => 1,
        InterMsgKind::KeyInput => 2,
        InterMsgKind::Menu => 3,
        InterMsgKind::StringInput => 4,
    };
    let modflags_byte: u8 = match msg.modflags {
        InterMsgModFlags::None => 0,
        InterMsgModFlags::MessageMenu => 1,
        InterMsgModFlags::InputMenu => 2,
    };
    codec::write_u8(ch, kind_byte)?;
    codec::write_u8(ch, modflags_byte)?;
    match &msg.payload {
        InterMsgPayload::None => {}
        InterMsgPayload::Key(key) => codec::write_u16(ch, encode_key(*key))?,
        InterMsgPayload::Text(text) => codec::write_string_zero_terminated(ch, text)?,
    }
    Ok(())
}

fn encode_key(key: Key) -> u16 {
    match key {
        Key::A => 0,
        Key::B => 1,
        Key::Enter => 2,
        Key::Back => 3,
        Key::Del => 4,
        Key::Up => 5,
        Key::Down => 6,
        Key::Left => 7,
        Key::Right => 8,
    }
}

fn decode_key(code: u16) -> Result<Key, PokError> {
    Ok(match code {
        0 => Key::A,
        1 => Key::B,
        2 => Key::Enter,
        3 => Key::Back,
        4 => Key::Del,
        5 => Key::Up,
        6 => Key::Down,
        7 => Key::Left,
        8 => Key::Right,
        other => {
            return Err(PokError::new(
                ErrorKind::Map(MapError::BadFormat),
                format!("unrecognized key code {other}"),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokcore::channel::MemoryChannel;

    #[test]
    fn read_line_resumes_without_losing_partial_bytes() {
        let mut ch = MemoryChannel::new();
        let mut buf = Vec::new();
        ch.feed(b"POKGAME-GREE").unwrap();
        assert!(read_line(&mut ch, &mut buf).unwrap_err().is_retryable());
        ch.feed(b"TING\n").unwrap();
        assert_eq!(read_line(&mut ch, &mut buf).unwrap(), "POKGAME-GREETING");
    }

    #[test]
    fn read_line_splits_on_first_newline_and_leaves_rest_buffered() {
        let mut ch = MemoryChannel::new();
        let mut buf = Vec::new();
        ch.feed(b"BINARY\ndefault\n").unwrap();
        assert_eq!(read_line(&mut ch, &mut buf).unwrap(), "BINARY");
        buf.clear();
        assert_eq!(read_line(&mut ch, &mut buf).unwrap(), "default");
    }

    #[test]
    fn greeting_exchange_completes_after_three_lines() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"POKGAME-GREETING\nBINARY\nMy Game\n").unwrap();
        let mut exchange = GreetingExchange::new();
        let result = exchange.poll(&mut ch).unwrap().unwrap();
        assert_eq!(result.mode, ProtocolMode::Binary);
        assert_eq!(result.label, "My Game");
    }

    #[test]
    fn tile_catalog_reader_resumes_without_losing_already_consumed_bytes() {
        // Build the wire bytes for: tile_count=1, impassability=0, flag=0
        // (3 bytes/pixel), a 1x1x3-byte sheet, one animation entry, and
        // four terrain lists (only `water` non-empty).
        let mut writer = MemoryChannel::new();
        codec::write_u16(&mut writer, 1).unwrap();
        codec::write_u16(&mut writer, 0).unwrap();
        codec::write_u8(&mut writer, 0).unwrap();
        codec::write_u8(&mut writer, 10).unwrap();
        codec::write_u8(&mut writer, 20).unwrap();
        codec::write_u8(&mut writer, 30).unwrap();
        codec::write_u16(&mut writer, 1).unwrap();
        codec::write_u8(&mut writer, 2).unwrap();
        codec::write_u16(&mut writer, 5).unwrap();
        codec::write_u16(&mut writer, 6).unwrap();
        codec::write_u16(&mut writer, 1).unwrap();
        codec::write_u16(&mut writer, 9).unwrap();
        codec::write_u16(&mut writer, 0).unwrap();
        codec::write_u16(&mut writer, 0).unwrap();
        codec::write_u16(&mut writer, 0).unwrap();
        let full = writer.drain_output();

        let mut ch = MemoryChannel::new();
        let mut reader = TileCatalogReader::new(1);

        // First delivery stops one byte into the sheet skip.
        ch.feed(&full[..6]).unwrap();
        assert!(reader.poll(&mut ch).unwrap_err().is_retryable());

        // Second delivery finishes the sheet and stops mid animation entry
        // (after `ticks`, before `forward_id`/`backward_id`) — the exact
        // spot a function-local byte counter would lose track of already
        // consumed bytes on re-entry.
        ch.feed(&full[6..12]).unwrap();
        assert!(reader.poll(&mut ch).unwrap_err().is_retryable());

        ch.feed(&full[12..]).unwrap();
        let catalog = reader.poll(&mut ch).unwrap();
        assert_eq!(catalog.tile_count(), 1);
        assert!(catalog.is_animated(0));
    }

    #[test]
    fn sprite_catalog_reader_resumes_across_a_split_sheet() {
        let mut writer = MemoryChannel::new();
        codec::write_u16(&mut writer, 1).unwrap();
        for b in 0u8..40 {
            codec::write_u8(&mut writer, b).unwrap();
        }
        let full = writer.drain_output();

        let mut ch = MemoryChannel::new();
        let mut reader = SpriteCatalogReader::new(1);

        ch.feed(&full[..20]).unwrap();
        assert!(reader.poll(&mut ch).unwrap_err().is_retryable());

        ch.feed(&full[20..]).unwrap();
        let catalog = reader.poll(&mut ch).unwrap();
        assert_eq!(catalog.sprite_count(), 1);
    }

    #[test]
    fn greeting_resumes_across_partial_delivery() {
        let mut ch = MemoryChannel::new();
        ch.feed(b"POKGAME-GREE").unwrap();
        let mut exchange = GreetingExchange::new();
        assert!(exchange.poll(&mut ch).unwrap_err().is_retryable());
        ch.feed(b"TING\nTEXT\nv2\n").unwrap();
        let result = exchange.poll(&mut ch).unwrap().unwrap();
        assert_eq!(result.mode, ProtocolMode::Text);
        assert_eq!(result.label, "v2");
    }

    #[test]
    fn tile_round_trips_without_warp() {
        let mut ch = MemoryChannel::new();
        let tile = Tile::blank();
        write_tile(&mut ch, &tile).unwrap();
        let bytes = ch.drain_output();
        ch.feed(&bytes).unwrap();
        let back = read_tile(&mut ch).unwrap();
        assert_eq!(back.tile_id, tile.tile_id);
        assert_eq!(back.warp_kind, tile.warp_kind);
    }

    #[test]
    fn tile_round_trips_with_warp_metadata() {
        let mut ch = MemoryChannel::new();
        let tile = Tile {
            tile_id: 5,
            warp_kind: WarpKind::Instant,
            warp: Some(WarpMetadata {
                warp_map: 7,
                warp_chunk: Point::new(0, 0),
                warp_location: Location::new(1, 1),
            }),
            overrides: OverrideBits::empty(),
        };
        write_tile(&mut ch, &tile).unwrap();
        let bytes = ch.drain_output();
        ch.feed(&bytes).unwrap();
        let back = read_tile(&mut ch).unwrap();
        assert_eq!(back.warp_kind, WarpKind::Instant);
        assert_eq!(back.warp.unwrap().warp_map, 7);
    }

    #[test]
    fn intermsg_key_input_round_trips() {
        let mut ch = MemoryChannel::new();
        write_intermsg(&mut ch, &InterMsg::key_input(Key::Up)).unwrap();
        let bytes = ch.drain_output();
        ch.feed(&bytes).unwrap();
        let back = read_intermsg(&mut ch).unwrap();
        assert_eq!(back.kind, InterMsgKind::KeyInput);
        match back.payload {
            InterMsgPayload::Key(k) => assert_eq!(k, Key::Up),
            _ => panic!("expected key payload"),
        }
    }
}
