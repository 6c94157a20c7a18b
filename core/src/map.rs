//! Map: an origin/cursor chunk pair plus sizing metadata (spec §3, §4.6).

use crate::channel::ByteChannel;
use crate::chunk::{ChunkHandle, ChunkInsertHint, MapChunk};
use crate::constants::MAX_MAP_CHUNK_DIMENSION;
use crate::error::{ErrorKind, MapError, PokError, ReadProgress};
use crate::geometry::{Point, Size};
use crate::readinfo::ReadInfo;
use crate::tile::{Tile, TileNetRead};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    /// All chunks received up front.
    Static,
    /// New chunks may be requested as the player walks toward a missing
    /// edge.
    Dynamic,
}

pub struct Map {
    pub origin: ChunkHandle,
    pub cursor: ChunkHandle,
    pub chunk_size: Size,
    pub origin_pos: Point,
    pub map_no: u32,
    pub kind: MapKind,
    /// Strong owner of every chunk in the graph. Adjacency itself is all
    /// `Weak` (`core::chunk`'s doc comment), so without this a chunk with
    /// no surviving neighbor upstream of it would be dropped the moment
    /// the builder that created it (e.g. a `ChunkInsertHint`) goes out of
    /// scope. Dropping `Map` drops this vec, which in turn drops every
    /// chunk that has no other owner.
    owned_chunks: Vec<ChunkHandle>,
}

impl Map {
    /// Loads a map from a single rectangular tile array by computing a
    /// chunk grid: repeatedly halve each axis until <= `max_chunk_dim`;
    /// unused columns/rows are distributed alternately to the
    /// left/top and right/bottom edges and padded with tile id 0 (spec
    /// §4.6 path (a)). The grid's internal wiring is left to the caller
    /// (typically via `ChunkInsertHint`) since the raw tile array is
    /// outside this crate's scope (source image decoding is external per
    /// spec §1); this constructor wires a single chunk sized to
    /// `chunk_size`, which is the common case for the default/offline
    /// scenario's small maps.
    pub fn single_chunk(chunk_size: Size, map_no: u32, kind: MapKind) -> Result<Self, PokError> {
        if chunk_size.columns == 0 || chunk_size.rows == 0 {
            return Err(PokError::new(
                ErrorKind::Map(MapError::BadChunkSize),
                "chunk size must be non-zero on both axes",
            ));
        }
        let chunk = MapChunk::new(chunk_size);
        Ok(Self {
            origin: chunk.clone(),
            cursor: chunk.clone(),
            chunk_size,
            origin_pos: Point::new(0, 0),
            map_no,
            kind,
            owned_chunks: vec![chunk],
        })
    }

    /// Wraps an already-wired grid (used by `load`/`open`/`netread` once
    /// they've built the adjacency graph via a `ChunkInsertHint`).
    /// `owned_chunks` must include every chunk in the grid, `origin`
    /// among them, or chunks outside it will be freed as soon as their
    /// last strong owner elsewhere drops.
    pub fn from_origin(
        origin: ChunkHandle,
        owned_chunks: Vec<ChunkHandle>,
        chunk_size: Size,
        origin_pos: Point,
        map_no: u32,
        kind: MapKind,
    ) -> Result<Self, PokError> {
        if chunk_size.columns == 0 || chunk_size.rows == 0 {
            return Err(PokError::new(
                ErrorKind::Map(MapError::BadChunkSize),
                "chunk size must be non-zero on both axes",
            ));
        }
        Ok(Self {
            cursor: origin.clone(),
            origin,
            chunk_size,
            origin_pos,
            map_no,
            kind,
            owned_chunks,
        })
    }

    /// Builds a chunk grid covering `columns x rows` tiles by repeatedly
    /// halving each axis until both are at or under
    /// `MAX_MAP_CHUNK_DIMENSION`, then wiring the grid via
    /// `ChunkInsertHint` and filling each chunk from `tile_at`
    /// (global column/row -> tile; cells past `columns`/`rows` are
    /// padded with `Tile::blank()`). Returns the origin chunk (grid
    /// position 0,0) and the full owned-chunk list in insertion order.
    fn build_grid(
        columns: u32,
        rows: u32,
        mut tile_at: impl FnMut(u32, u32) -> Result<Tile, PokError>,
    ) -> Result<(ChunkHandle, Vec<ChunkHandle>, Size), PokError> {
        if columns == 0 || rows == 0 {
            return Err(PokError::new(
                ErrorKind::Map(MapError::BadChunkSize),
                "map dimensions must be non-zero on both axes",
            ));
        }
        let grid_columns = columns.div_ceil(MAX_MAP_CHUNK_DIMENSION).max(1);
        let grid_rows = rows.div_ceil(MAX_MAP_CHUNK_DIMENSION).max(1);
        let chunk_columns = columns.div_ceil(grid_columns);
        let chunk_rows = rows.div_ceil(grid_rows);
        let chunk_size = Size::new(chunk_columns, chunk_rows);

        let mut hint = ChunkInsertHint::new();
        for grid_row in 0..grid_rows {
            for grid_col in 0..grid_columns {
                let chunk = MapChunk::new(chunk_size);
                {
                    let mut guard = chunk.write();
                    for local_row in 0..chunk_rows {
                        for local_col in 0..chunk_columns {
                            let global_col = grid_col * chunk_columns + local_col;
                            let global_row = grid_row * chunk_rows + local_row;
                            let tile = if global_col < columns && global_row < rows {
                                tile_at(global_col, global_row)?
                            } else {
                                Tile::blank()
                            };
                            guard.set_tile(local_col, local_row, tile);
                        }
                    }
                }
                hint.insert(chunk);
            }
            hint.end_row();
        }
        let chunks = hint.into_chunks();
        let origin = chunks[0].clone();
        Ok((origin, chunks, chunk_size))
    }

    /// Builds a map directly from an in-memory tile array (spec §4.6 path
    /// (a) — e.g. the default scenario or a locally-authored scenario
    /// with no wire/disk round-trip involved).
    pub fn load(
        tiles: &[u16],
        columns: u32,
        rows: u32,
        map_no: u32,
        kind: MapKind,
    ) -> Result<Self, PokError> {
        let (origin, owned_chunks, chunk_size) =
            Self::build_grid(columns, rows, |col, row| {
                let idx = (row * columns + col) as usize;
                Ok(Tile {
                    tile_id: tiles.get(idx).copied().unwrap_or(0),
                    ..Tile::blank()
                })
            })?;
        Self::from_origin(origin, owned_chunks, chunk_size, Point::new(0, 0), map_no, kind)
    }

    /// Reads a map from its on-disk encoding (spec §4.6 path (b)): a
    /// `u16` grid width/height, a `u16` chunk width/height, then the
    /// grid's chunks in row-major order, each as `chunk_rows *
    /// chunk_columns` tiles in row-major order. This is a deliberately
    /// simplified encoding relative to the original's diagonal-bitmask
    /// DFS format (see `DESIGN.md`'s Open Question resolutions):
    /// everything `ChunkInsertHint` ever builds is a plain rectangular
    /// grid, so the format just says so directly instead of making the
    /// reader re-derive it.
    pub fn open(ch: &mut dyn ByteChannel, map_no: u32, kind: MapKind) -> Result<Self, PokError> {
        let grid_columns = crate::codec::read_u16(ch)? as u32;
        let grid_rows = crate::codec::read_u16(ch)? as u32;
        let chunk_columns = crate::codec::read_u16(ch)? as u32;
        let chunk_rows = crate::codec::read_u16(ch)? as u32;
        if grid_columns == 0 || grid_rows == 0 || chunk_columns == 0 || chunk_rows == 0 {
            return Err(PokError::new(
                ErrorKind::Map(MapError::BadFormat),
                "map header dimensions must be non-zero",
            ));
        }
        let chunk_size = Size::new(chunk_columns, chunk_rows);
        let mut hint = ChunkInsertHint::new();
        for _ in 0..grid_rows {
            for _ in 0..grid_columns {
                let chunk = MapChunk::new(chunk_size);
                {
                    let mut guard = chunk.write();
                    for row in 0..chunk_rows {
                        for col in 0..chunk_columns {
                            let tile = Tile::read(ch)?;
                            guard.set_tile(col, row, tile);
                        }
                    }
                }
                hint.insert(chunk);
            }
            hint.end_row();
        }
        let owned_chunks = hint.into_chunks();
        let origin = owned_chunks[0].clone();
        Self::from_origin(origin, owned_chunks, chunk_size, Point::new(0, 0), map_no, kind)
    }
}

/// Resumable counterpart to `Map::open` for a possibly-nonblocking peer
/// channel (spec §4.6 path (c), §4.3): `poll` re-enters exactly where the
/// previous call left off rather than re-reading the header or restarting
/// the tile grid. `info.field_prog` tracks which of the four header
/// fields is in flight (4 once the header is done); `info.depth[0]`
/// counts completed chunks, `info.depth[1]` the tiles completed within
/// the chunk currently in progress.
pub struct MapNetRead {
    map_no: u32,
    kind: MapKind,
    grid_columns: u32,
    grid_rows: u32,
    chunk_size: Size,
    current_chunk: Option<ChunkHandle>,
    tile_reader: TileNetRead,
    hint: ChunkInsertHint,
    info: ReadInfo,
}

impl MapNetRead {
    pub fn new(map_no: u32, kind: MapKind) -> Self {
        Self {
            map_no,
            kind,
            grid_columns: 0,
            grid_rows: 0,
            chunk_size: Size::new(0, 0),
            current_chunk: None,
            tile_reader: TileNetRead::new(),
            hint: ChunkInsertHint::new(),
            info: ReadInfo::new(),
        }
    }

    /// Reads one `u16` header field, advancing `info.field_prog` through
    /// `process` on success and surfacing a retryable error unchanged so
    /// the caller re-enters this same field next time.
    fn read_header_field(
        &mut self,
        ch: &mut dyn ByteChannel,
    ) -> Result<Option<u32>, PokError> {
        let result = crate::codec::read_u16(ch).map(|v| v as u32);
        match self.info.process(&result) {
            ReadProgress::Completed => Ok(Some(result.unwrap())),
            ReadProgress::Incomplete => Err(result.unwrap_err()),
            ReadProgress::Failed => Err(result.unwrap_err()),
        }
    }

    /// Drives the read as far as currently-buffered bytes on `ch` allow.
    /// A retryable error means more data is needed; the caller should
    /// call `poll` again once bytes arrive. Returns the finished map on
    /// the call that completes the last tile.
    pub fn poll(&mut self, ch: &mut dyn ByteChannel) -> Result<Map, PokError> {
        if self.info.field_prog == 0 {
            self.grid_columns = self.read_header_field(ch)?.unwrap();
        }
        if self.info.field_prog == 1 {
            self.grid_rows = self.read_header_field(ch)?.unwrap();
        }
        if self.info.field_prog == 2 {
            let columns = self.read_header_field(ch)?.unwrap();
            self.chunk_size = Size::new(columns, self.chunk_size.rows);
        }
        if self.info.field_prog == 3 {
            let rows = self.read_header_field(ch)?.unwrap();
            self.chunk_size = Size::new(self.chunk_size.columns, rows);
            if self.grid_columns == 0
                || self.grid_rows == 0
                || self.chunk_size.columns == 0
                || self.chunk_size.rows == 0
            {
                return Err(PokError::new(
                    ErrorKind::Map(MapError::BadFormat),
                    "map header dimensions must be non-zero",
                ));
            }
        }

        let total_chunks = self.grid_columns * self.grid_rows;
        let tiles_per_chunk = self.chunk_size.columns * self.chunk_size.rows;
        while self.info.depth[0] < total_chunks {
            let chunk = self
                .current_chunk
                .get_or_insert_with(|| MapChunk::new(self.chunk_size))
                .clone();
            while self.info.depth[1] < tiles_per_chunk {
                let idx = self.info.depth[1];
                let col = idx % self.chunk_size.columns;
                let row = idx / self.chunk_size.columns;
                let result = self.tile_reader.poll(ch);
                match self.info.process_depth(1, &result) {
                    ReadProgress::Completed => {
                        chunk.write().set_tile(col, row, result.unwrap());
                        self.tile_reader = TileNetRead::new();
                    }
                    ReadProgress::Incomplete | ReadProgress::Failed => {
                        return Err(result.unwrap_err())
                    }
                }
            }
            self.info.depth[1] = 0;
            self.info.depth[0] += 1;
            self.current_chunk = None;
            self.hint.insert(chunk);
            if self.info.depth[0] % self.grid_columns == 0 {
                self.hint.end_row();
            }
        }

        let hint = std::mem::take(&mut self.hint);
        let owned_chunks = hint.into_chunks();
        let origin = owned_chunks[0].clone();
        Map::from_origin(
            origin,
            owned_chunks,
            self.chunk_size,
            Point::new(0, 0),
            self.map_no,
            self.kind,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = Map::single_chunk(Size::new(0, 4), 1, MapKind::Static).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn single_chunk_map_has_matching_cursor_and_origin() {
        let map = Map::single_chunk(Size::new(10, 10), 1, MapKind::Static).unwrap();
        assert!(std::sync::Arc::ptr_eq(&map.origin, &map.cursor));
    }

    #[test]
    fn load_builds_a_single_chunk_for_small_dimensions() {
        let tiles: Vec<u16> = (0..16).collect();
        let map = Map::load(&tiles, 4, 4, 7, MapKind::Static).unwrap();
        assert!(std::sync::Arc::ptr_eq(&map.origin, &map.cursor));
        let guard = map.origin.read();
        assert_eq!(guard.tile(0, 0).tile_id, 0);
        assert_eq!(guard.tile(3, 3).tile_id, 15);
    }

    #[test]
    fn load_pads_dimensions_not_covered_by_the_source_array() {
        let tiles: Vec<u16> = vec![5];
        let map = Map::load(&tiles, 1, 1, 1, MapKind::Static).unwrap();
        let guard = map.origin.read();
        assert_eq!(guard.tile(0, 0).tile_id, 5);
    }

    fn write_disk_map(columns: u32, rows: u32) -> (Vec<u8>, Vec<u16>) {
        use crate::channel::MemoryChannel;

        let mut writer = MemoryChannel::new();
        crate::codec::write_u16(&mut writer, 1).unwrap(); // grid_columns
        crate::codec::write_u16(&mut writer, 1).unwrap(); // grid_rows
        crate::codec::write_u16(&mut writer, columns as u16).unwrap();
        crate::codec::write_u16(&mut writer, rows as u16).unwrap();
        let mut ids = Vec::new();
        for i in 0..(columns * rows) {
            let id = (i + 1) as u16;
            ids.push(id);
            Tile {
                tile_id: id,
                ..Tile::blank()
            }
            .write(&mut writer)
            .unwrap();
        }
        (writer.drain_output(), ids)
    }

    #[test]
    fn open_reads_the_disk_format_into_a_single_chunk() {
        use crate::channel::MemoryChannel;

        let (bytes, ids) = write_disk_map(2, 2);
        let mut ch = MemoryChannel::new();
        ch.feed(&bytes).unwrap();
        let map = Map::open(&mut ch, 3, MapKind::Static).unwrap();
        let guard = map.origin.read();
        assert_eq!(guard.tile(0, 0).tile_id, ids[0]);
        assert_eq!(guard.tile(1, 1).tile_id, ids[3]);
    }

    #[test]
    fn map_net_read_resumes_across_a_split_delivery() {
        use crate::channel::MemoryChannel;

        let (bytes, ids) = write_disk_map(2, 2);
        let mut ch = MemoryChannel::new();
        let mut reader = MapNetRead::new(9, MapKind::Static);

        // Stop mid header, before chunk_rows.
        ch.feed(&bytes[..6]).unwrap();
        assert!(reader.poll(&mut ch).unwrap_err().is_retryable());

        // Stop partway through the first tile (tile_id only).
        ch.feed(&bytes[6..10]).unwrap();
        assert!(reader.poll(&mut ch).unwrap_err().is_retryable());

        ch.feed(&bytes[10..]).unwrap();
        let map = reader.poll(&mut ch).unwrap();
        assert_eq!(map.map_no, 9);
        let guard = map.origin.read();
        assert_eq!(guard.tile(0, 0).tile_id, ids[0]);
        assert_eq!(guard.tile(1, 1).tile_id, ids[3]);
    }
}
