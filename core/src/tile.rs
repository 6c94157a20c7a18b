//! Tile and warp metadata (spec §3, wire form §6).

use crate::channel::ByteChannel;
use crate::codec;
use crate::error::{ErrorKind, PokError, TileError};
use crate::geometry::{Location, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpKind {
    None,
    Instant,
    CaveEnter,
    CaveExit,
    LatentUp,
    LatentDown,
    LatentLeft,
    LatentRight,
    LatentCaveUp,
    LatentCaveDown,
    LatentCaveLeft,
    LatentCaveRight,
    Spin,
    Fall,
}

impl WarpKind {
    pub fn from_wire(byte: u8) -> Result<Self, PokError> {
        Ok(match byte {
            0 => WarpKind::None,
            1 => WarpKind::Instant,
            2 => WarpKind::CaveEnter,
            3 => WarpKind::CaveExit,
            4 => WarpKind::LatentUp,
            5 => WarpKind::LatentDown,
            6 => WarpKind::LatentLeft,
            7 => WarpKind::LatentRight,
            8 => WarpKind::LatentCaveUp,
            9 => WarpKind::LatentCaveDown,
            10 => WarpKind::LatentCaveLeft,
            11 => WarpKind::LatentCaveRight,
            12 => WarpKind::Spin,
            13 => WarpKind::Fall,
            _ => {
                return Err(PokError::new(
                    ErrorKind::Tile(TileError::BadWarpKind),
                    format!("unrecognized warp kind byte {byte}"),
                ))
            }
        })
    }

    pub fn to_wire(self) -> u8 {
        match self {
            WarpKind::None => 0,
            WarpKind::Instant => 1,
            WarpKind::CaveEnter => 2,
            WarpKind::CaveExit => 3,
            WarpKind::LatentUp => 4,
            WarpKind::LatentDown => 5,
            WarpKind::LatentLeft => 6,
            WarpKind::LatentRight => 7,
            WarpKind::LatentCaveUp => 8,
            WarpKind::LatentCaveDown => 9,
            WarpKind::LatentCaveLeft => 10,
            WarpKind::LatentCaveRight => 11,
            WarpKind::Spin => 12,
            WarpKind::Fall => 13,
        }
    }

    pub fn has_metadata(self) -> bool {
        self != WarpKind::None
    }

    /// The direction this latent warp fires on, if any (the player must
    /// be facing this direction and attempting to walk off the tile for
    /// the warp to trigger, per spec §4.11 step 2 and glossary "Latent
    /// warp").
    pub fn latent_direction(self) -> Option<crate::geometry::Direction> {
        use crate::geometry::Direction;
        match self {
            WarpKind::LatentUp | WarpKind::LatentCaveUp => Some(Direction::Up),
            WarpKind::LatentDown | WarpKind::LatentCaveDown => Some(Direction::Down),
            WarpKind::LatentLeft | WarpKind::LatentCaveLeft => Some(Direction::Left),
            WarpKind::LatentRight | WarpKind::LatentCaveRight => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn is_cave(self) -> bool {
        matches!(
            self,
            WarpKind::LatentCaveUp
                | WarpKind::LatentCaveDown
                | WarpKind::LatentCaveLeft
                | WarpKind::LatentCaveRight
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WarpMetadata {
    pub warp_map: u32,
    pub warp_chunk: Point,
    pub warp_location: Location,
}

bitflags::bitflags! {
    /// Per-tile passability override bits (spec §3): `impass` forces an
    /// otherwise-passable tile impassable, `pass` forces an otherwise
    /// impassable tile passable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OverrideBits: u8 {
        const IMPASS = 0b0000_0001;
        const PASS   = 0b0000_0010;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub tile_id: u16,
    pub warp_kind: WarpKind,
    pub warp: Option<WarpMetadata>,
    pub overrides: OverrideBits,
}

impl Tile {
    pub fn blank() -> Self {
        Self {
            tile_id: 0,
            warp_kind: WarpKind::None,
            warp: None,
            overrides: OverrideBits::empty(),
        }
    }

    pub fn is_impass_override(&self) -> bool {
        self.overrides.contains(OverrideBits::IMPASS)
    }

    pub fn is_pass_override(&self) -> bool {
        self.overrides.contains(OverrideBits::PASS)
    }

    /// Reads one tile in its wire/disk form (spec §6): `u16 tile_id; u8
    /// warp_kind; if warp_kind != none: u32 warp_map, Point warp_chunk,
    /// Location warp_location; u8 override_bits`. Shared by the peer
    /// protocol's tile reads and the map loader's on-disk/in-memory
    /// grids, since both use the same per-tile encoding.
    pub fn read(ch: &mut dyn ByteChannel) -> Result<Self, PokError> {
        let tile_id = codec::read_u16(ch)?;
        let warp_byte = codec::read_u8(ch)?;
        let warp_kind = WarpKind::from_wire(warp_byte)?;
        let warp = if warp_kind.has_metadata() {
            let warp_map = codec::read_u32(ch)?;
            let warp_chunk = read_point(ch)?;
            let warp_location = read_location(ch)?;
            Some(WarpMetadata {
                warp_map,
                warp_chunk,
                warp_location,
            })
        } else {
            None
        };
        let override_byte = codec::read_u8(ch)?;
        Ok(Tile {
            tile_id,
            warp_kind,
            warp,
            overrides: OverrideBits::from_bits_truncate(override_byte),
        })
    }

    pub fn write(&self, ch: &mut dyn ByteChannel) -> Result<(), PokError> {
        codec::write_u16(ch, self.tile_id)?;
        codec::write_u8(ch, self.warp_kind.to_wire())?;
        if let Some(warp) = &self.warp {
            codec::write_u32(ch, warp.warp_map)?;
            codec::write_u32(ch, warp.warp_chunk.x as u32)?;
            codec::write_u32(ch, warp.warp_chunk.y as u32)?;
            codec::write_u32(ch, warp.warp_location.column)?;
            codec::write_u32(ch, warp.warp_location.row)?;
        }
        codec::write_u8(ch, self.overrides.bits())
    }
}

/// Resumable counterpart to `Tile::read` for a possibly-nonblocking
/// channel: `Tile::read` itself reads several fields back to back, and a
/// retryable error partway through (e.g. after `tile_id` but before the
/// warp metadata) would otherwise leave the channel's cursor past
/// `tile_id` while the caller still believes nothing was read, so a
/// re-entry would reparse the wrong bytes as `tile_id`. Each field here is
/// stashed once read so re-entry only attempts whatever is still missing.
#[derive(Default)]
pub struct TileNetRead {
    tile_id: Option<u16>,
    warp_kind: Option<WarpKind>,
    warp_map: Option<u32>,
    warp_chunk_x: Option<i32>,
    warp_chunk_y: Option<i32>,
    warp_location_col: Option<u32>,
    warp_location_row: Option<u32>,
    overrides: Option<u8>,
}

impl TileNetRead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, ch: &mut dyn ByteChannel) -> Result<Tile, PokError> {
        if self.tile_id.is_none() {
            self.tile_id = Some(codec::read_u16(ch)?);
        }
        if self.warp_kind.is_none() {
            let byte = codec::read_u8(ch)?;
            self.warp_kind = Some(WarpKind::from_wire(byte)?);
        }
        let warp_kind = self.warp_kind.unwrap();

        if warp_kind.has_metadata() {
            if self.warp_map.is_none() {
                self.warp_map = Some(codec::read_u32(ch)?);
            }
            if self.warp_chunk_x.is_none() {
                self.warp_chunk_x = Some(codec::read_u32(ch)? as i32);
            }
            if self.warp_chunk_y.is_none() {
                self.warp_chunk_y = Some(codec::read_u32(ch)? as i32);
            }
            if self.warp_location_col.is_none() {
                self.warp_location_col = Some(codec::read_u32(ch)?);
            }
            if self.warp_location_row.is_none() {
                self.warp_location_row = Some(codec::read_u32(ch)?);
            }
        }

        if self.overrides.is_none() {
            self.overrides = Some(codec::read_u8(ch)?);
        }

        let warp = if warp_kind.has_metadata() {
            Some(WarpMetadata {
                warp_map: self.warp_map.unwrap(),
                warp_chunk: Point::new(self.warp_chunk_x.unwrap(), self.warp_chunk_y.unwrap()),
                warp_location: Location::new(
                    self.warp_location_col.unwrap(),
                    self.warp_location_row.unwrap(),
                ),
            })
        } else {
            None
        };

        Ok(Tile {
            tile_id: self.tile_id.unwrap(),
            warp_kind,
            warp,
            overrides: OverrideBits::from_bits_truncate(self.overrides.unwrap()),
        })
    }
}

fn read_point(ch: &mut dyn ByteChannel) -> Result<Point, PokError> {
    let x = codec::read_u32(ch)? as i32;
    let y = codec::read_u32(ch)? as i32;
    Ok(Point::new(x, y))
}

fn read_location(ch: &mut dyn ByteChannel) -> Result<Location, PokError> {
    let column = codec::read_u32(ch)?;
    let row = codec::read_u32(ch)?;
    Ok(Location::new(column, row))
}
