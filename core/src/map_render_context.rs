//! The scroll/move state machine (spec §4.7) — grounded on
//! `original_source/src/map-render.h` / `map-render.c` field-for-field,
//! and `client/src/map.rs`'s `scroll_left/right/up/down` family for the
//! offset-decay style of a scroll tick.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::TileCatalog;
use crate::character_context::step_axis;
use crate::chunk::{ChunkHandle, ChunkWeak};
use crate::error::{ErrorKind, MapError, PokError};
use crate::geometry::{Direction, Location, Point, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    InProgress,
    Completed,
}

/// Per-frame draw plan for one of up to four chunks contributing to the
/// visible screen.
#[derive(Clone)]
pub struct ChunkRenderInfo {
    pub px: i32,
    pub py: i32,
    pub across: u32,
    pub down: u32,
    pub src_column: u32,
    pub src_row: u32,
    pub chunk_pos: Point,
    pub chunk: ChunkWeak,
}

pub struct MapRenderContext {
    /// Which of the nine 3x3 slots (column, row) holds the current chunk.
    pub focus: (u8, u8),
    pub offset: (i32, i32),
    pub viewing_chunks: [[Option<ChunkWeak>; 3]; 3],
    pub relpos: Location,
    pub chunkpos: Point,
    pub map_no: u32,
    pub chunk_size: Size,
    pub tile_catalog: Arc<RwLock<TileCatalog>>,
    pub render_info: [Option<ChunkRenderInfo>; 4],
    pub granularity: i32,
    pub tile_ani_ticks: u64,
    pub scroll_ticks: u32,
    pub scroll_ticks_amt: u32,
    pub groove: bool,
    pub changed: bool,
    pub update: bool,
    /// Visible window size in tiles, not counting the 1-tile border.
    pub window_size: Size,
}

impl MapRenderContext {
    pub fn new(
        map_no: u32,
        chunk_size: Size,
        window_size: Size,
        tile_catalog: Arc<RwLock<TileCatalog>>,
        granularity: i32,
        scroll_ticks_amt: u32,
    ) -> Self {
        Self {
            focus: (1, 1),
            offset: (0, 0),
            viewing_chunks: Default::default(),
            relpos: Location::new(0, 0),
            chunkpos: Point::new(0, 0),
            map_no,
            chunk_size,
            tile_catalog,
            render_info: [None, None, None, None],
            granularity,
            tile_ani_ticks: 0,
            scroll_ticks: 0,
            scroll_ticks_amt,
            groove: false,
            changed: true,
            update: false,
            window_size,
        }
    }

    fn current_handle(&self) -> Option<ChunkHandle> {
        self.viewing_chunks[self.focus.1 as usize][self.focus.0 as usize]
            .as_ref()
            .and_then(|w| w.upgrade())
    }

    /// Walks the adjacency graph from the current chunk toward
    /// `chunk_pos`: advance along X until ΔX = 0 (preferring the
    /// sign-appropriate neighbor), then along Y, falling back to
    /// whichever axis still has a neighbor when the preferred one is
    /// missing. Leaves the context unchanged on failure.
    pub fn center_on(
        &mut self,
        origin: ChunkHandle,
        chunk_pos: Point,
        rel_pos: Location,
    ) -> Result<(), PokError> {
        let mut current = origin;
        let mut pos = self.chunkpos;
        let mut dx = chunk_pos.x - pos.x;
        let mut dy = chunk_pos.y - pos.y;

        while dx != 0 || dy != 0 {
            let preferred = if dx != 0 {
                if dx > 0 { Direction::Right } else { Direction::Left }
            } else if dy > 0 {
                Direction::Down
            } else {
                Direction::Up
            };
            let fallback = if dx != 0 && dy != 0 {
                Some(if dy > 0 { Direction::Down } else { Direction::Up })
            } else {
                None
            };

            let next = current
                .read()
                .adjacent_handle(preferred)
                .map(|h| (h, preferred))
                .or_else(|| {
                    fallback.and_then(|f| current.read().adjacent_handle(f).map(|h| (h, f)))
                });

            match next {
                Some((handle, dir)) => {
                    current = handle;
                    pos = pos.step(dir);
                    match dir {
                        Direction::Right => dx -= 1,
                        Direction::Left => dx += 1,
                        Direction::Down => dy -= 1,
                        Direction::Up => dy += 1,
                        Direction::None => {}
                    }
                }
                None => {
                    return Err(PokError::new(
                        ErrorKind::Map(MapError::BadPosition),
                        "no adjacency path to requested chunk",
                    ))
                }
            }
        }

        self.chunkpos = chunk_pos;
        self.relpos = rel_pos;
        self.align(current);
        self.changed = true;
        Ok(())
    }

    /// Places `current` at `viewing_chunks[1][1]` and fills the other
    /// eight slots from two-step traversals of `adjacent`. Diagonals use
    /// either (north->east) or (east->north) — when both exist the
    /// chunk-graph invariant guarantees agreement.
    pub fn align(&mut self, current: ChunkHandle) {
        self.focus = (1, 1);
        let mut grid: [[Option<ChunkWeak>; 3]; 3] = Default::default();
        grid[1][1] = Some(Arc::downgrade(&current));

        let up = current.read().adjacent_handle(Direction::Up);
        let down = current.read().adjacent_handle(Direction::Down);
        let left = current.read().adjacent_handle(Direction::Left);
        let right = current.read().adjacent_handle(Direction::Right);

        if let Some(h) = &up {
            grid[0][1] = Some(Arc::downgrade(h));
        }
        if let Some(h) = &down {
            grid[2][1] = Some(Arc::downgrade(h));
        }
        if let Some(h) = &left {
            grid[1][0] = Some(Arc::downgrade(h));
        }
        if let Some(h) = &right {
            grid[1][2] = Some(Arc::downgrade(h));
        }

        grid[0][0] = diagonal(&up, &left, Direction::Left, Direction::Up);
        grid[0][2] = diagonal(&up, &right, Direction::Right, Direction::Up);
        grid[2][0] = diagonal(&down, &left, Direction::Left, Direction::Down);
        grid[2][2] = diagonal(&down, &right, Direction::Right, Direction::Down);

        self.viewing_chunks = grid;
    }

    fn is_impassable(&self, chunk: &ChunkHandle, column: u32, row: u32) -> bool {
        let guard = chunk.read();
        let tile = guard.tile(column, row);
        let catalog = self.tile_catalog.read();
        if catalog.is_base_impassable(tile.tile_id) {
            !tile.is_pass_override()
        } else {
            tile.is_impass_override()
        }
    }

    /// Atomic attempt to move one tile in `direction` (spec §4.7).
    pub fn move_dir(&mut self, direction: Direction, check_passable: bool) -> MoveOutcome {
        let Some(current) = self.current_handle() else {
            return MoveOutcome::Blocked;
        };
        let cols = self.chunk_size.columns;
        let rows = self.chunk_size.rows;

        let (dc, dr): (i64, i64) = match direction {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::None => (0, 0),
        };

        let new_col = self.relpos.column as i64 + dc;
        let new_row = self.relpos.row as i64 + dr;

        let stays_inside =
            new_col >= 0 && (new_col as u32) < cols && new_row >= 0 && (new_row as u32) < rows;

        if stays_inside {
            let (nc, nr) = (new_col as u32, new_row as u32);
            if check_passable && self.is_impassable(&current, nc, nr) {
                return MoveOutcome::Blocked;
            }
            self.relpos = Location::new(nc, nr);
            if self.touches_edge(direction) {
                self.align(current);
            }
            self.changed = true;
            return MoveOutcome::Moved;
        }

        let (fc, fr) = (self.focus.0 as i32, self.focus.1 as i32);
        let (target_col, target_row) = match direction {
            Direction::Up => (fc, fr - 1),
            Direction::Down => (fc, fr + 1),
            Direction::Left => (fc - 1, fr),
            Direction::Right => (fc + 1, fr),
            Direction::None => (fc, fr),
        };
        if !(0..3).contains(&target_col) || !(0..3).contains(&target_row) {
            return MoveOutcome::Blocked;
        }
        let Some(neighbor) = self.viewing_chunks[target_row as usize][target_col as usize]
            .as_ref()
            .and_then(|w| w.upgrade())
        else {
            return MoveOutcome::Blocked;
        };

        let (edge_col, edge_row) = match direction {
            Direction::Up => (self.relpos.column, rows - 1),
            Direction::Down => (self.relpos.column, 0),
            Direction::Left => (cols - 1, self.relpos.row),
            Direction::Right => (0, self.relpos.row),
            Direction::None => (self.relpos.column, self.relpos.row),
        };

        if check_passable && self.is_impassable(&neighbor, edge_col, edge_row) {
            return MoveOutcome::Blocked;
        }

        self.relpos = Location::new(edge_col, edge_row);
        self.chunkpos = self.chunkpos.step(direction);
        self.focus = (target_col as u8, target_row as u8);
        self.align(neighbor);
        self.changed = true;
        MoveOutcome::Moved
    }

    /// True if `relpos` is now within half a chunk of the 3x3 window
    /// edge matching `direction` (`focus` equals 0 or 2 on the relevant
    /// axis) — the realignment trigger from spec §4.7 step 1.
    fn touches_edge(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up | Direction::Down => self.focus.1 == 0 || self.focus.1 == 2,
            Direction::Left | Direction::Right => self.focus.0 == 0 || self.focus.0 == 2,
            Direction::None => false,
        }
    }

    /// Installs an outgoing scroll animation: the offset is primed with
    /// `±dimension` opposite to travel so painting shifts toward the old
    /// position and decays to zero.
    pub fn set_update(&mut self, direction: Direction, dimension: i32) {
        self.offset = match direction {
            Direction::Up => (0, dimension),
            Direction::Down => (0, -dimension),
            Direction::Left => (dimension, 0),
            Direction::Right => (-dimension, 0),
            Direction::None => (0, 0),
        };
        self.scroll_ticks = 0;
        self.groove = false;
        self.update = true;
    }

    /// Advances the scroll animation by `elapsed_ticks` (spec §4.7).
    pub fn update_scroll(&mut self, dimension: i32, elapsed_ticks: u32) -> ScrollOutcome {
        self.scroll_ticks += elapsed_ticks;
        if self.update {
            if self.scroll_ticks >= self.scroll_ticks_amt {
                let mut inc = dimension / self.granularity.max(1);
                let times = (self.scroll_ticks / self.scroll_ticks_amt.max(1)) as i32;
                if inc == 0 {
                    inc = times;
                } else {
                    inc *= times;
                }
                self.scroll_ticks %= self.scroll_ticks_amt.max(1);

                if self.offset.0 != 0 {
                    self.offset.0 = step_axis(self.offset.0, inc);
                } else if self.offset.1 != 0 {
                    self.offset.1 = step_axis(self.offset.1, inc);
                }

                if self.offset == (0, 0) {
                    self.update = false;
                    self.groove = true;
                    return ScrollOutcome::Completed;
                }
            }
        } else if self.groove
            && self.scroll_ticks >= self.scroll_ticks_amt * (self.granularity - 1).max(0) as u32
        {
            self.groove = false;
        }
        ScrollOutcome::InProgress
    }

    /// Finds the render info rectangle containing `chunk_pos`, if any —
    /// used by the character render context to resolve a character's
    /// screen position.
    pub fn render_info_for(&self, chunk_pos: Point) -> Option<&ChunkRenderInfo> {
        self.render_info
            .iter()
            .filter_map(|slot| slot.as_ref())
            .find(|info| info.chunk_pos == chunk_pos)
    }

    /// Recomputes the four `ChunkRenderInfo`s if `changed`, per the
    /// windowed-tiling algorithm of spec §4.7.
    pub fn render(&mut self, tile_pixels: i32) {
        if self.changed {
            self.compute_chunk_render_info(tile_pixels);
            self.changed = false;
        }
    }

    /// The visible window widened by one tile in all directions,
    /// anchored on the current chunk and extended with up to three
    /// neighbor rectangles when the window overspills an edge.
    pub fn compute_chunk_render_info(&mut self, dimension: i32) {
        let Some(current) = self.current_handle() else {
            self.render_info = [None, None, None, None];
            return;
        };

        let across = self.window_size.columns + 2;
        let down = self.window_size.rows + 2;
        let player_col = self.window_size.columns / 2;
        let player_row = self.window_size.rows / 2;

        let mut info0 = ChunkRenderInfo {
            px: -dimension,
            py: -dimension,
            across,
            down,
            src_column: self.relpos.column.saturating_sub(player_col + 1),
            src_row: self.relpos.row.saturating_sub(player_row + 1),
            chunk_pos: self.chunkpos,
            chunk: Arc::downgrade(&current),
        };

        let mut slots: [Option<ChunkRenderInfo>; 4] = [None, None, None, None];

        let i = self.relpos.column as i64 - player_col as i64 - 1;
        if i < 0 {
            let overspill = (-i) as u32;
            info0.px += overspill as i32 * dimension;
            info0.across = info0.across.saturating_sub(overspill);
            info0.src_column = 0;
            if let Some(west) = current.read().adjacent_handle(Direction::Left) {
                slots[1] = Some(ChunkRenderInfo {
                    px: -dimension,
                    py: info0.py,
                    across: overspill,
                    down: info0.down,
                    src_column: self.chunk_size.columns.saturating_sub(overspill),
                    src_row: info0.src_row,
                    chunk_pos: self.chunkpos.step(Direction::Left),
                    chunk: Arc::downgrade(&west),
                });
            }
        } else {
            let remaining_east = self.chunk_size.columns.saturating_sub(i as u32);
            if remaining_east < across {
                if let Some(east) = current.read().adjacent_handle(Direction::Right) {
                    let overspill = across - remaining_east;
                    slots[1] = Some(ChunkRenderInfo {
                        px: info0.px + remaining_east as i32 * dimension,
                        py: info0.py,
                        across: overspill,
                        down: info0.down,
                        src_column: 0,
                        src_row: info0.src_row,
                        chunk_pos: self.chunkpos.step(Direction::Right),
                        chunk: Arc::downgrade(&east),
                    });
                    info0.across = remaining_east;
                }
            }
        }

        let j = self.relpos.row as i64 - player_row as i64 - 1;
        if j < 0 {
            let overspill = (-j) as u32;
            info0.py += overspill as i32 * dimension;
            info0.down = info0.down.saturating_sub(overspill);
            info0.src_row = 0;
            if let Some(north) = current.read().adjacent_handle(Direction::Up) {
                slots[2] = Some(ChunkRenderInfo {
                    px: info0.px,
                    py: -dimension,
                    across: info0.across,
                    down: overspill,
                    src_column: info0.src_column,
                    src_row: self.chunk_size.rows.saturating_sub(overspill),
                    chunk_pos: self.chunkpos.step(Direction::Up),
                    chunk: Arc::downgrade(&north),
                });
            }
        } else {
            let remaining_south = self.chunk_size.rows.saturating_sub(j as u32);
            if remaining_south < down {
                if let Some(south) = current.read().adjacent_handle(Direction::Down) {
                    let overspill = down - remaining_south;
                    slots[2] = Some(ChunkRenderInfo {
                        px: info0.px,
                        py: info0.py + remaining_south as i32 * dimension,
                        across: info0.across,
                        down: overspill,
                        src_column: info0.src_column,
                        src_row: 0,
                        chunk_pos: self.chunkpos.step(Direction::Down),
                        chunk: Arc::downgrade(&south),
                    });
                    info0.down = remaining_south;
                }
            }
        }

        if slots[1].is_some() && slots[2].is_some() {
            let west = slots[1].as_ref().unwrap();
            let north = slots[2].as_ref().unwrap();
            slots[3] = Some(ChunkRenderInfo {
                px: west.px,
                py: north.py,
                across: west.across,
                down: north.down,
                src_column: west.src_column,
                src_row: north.src_row,
                chunk_pos: Point::new(west.chunk_pos.x, north.chunk_pos.y),
                chunk: west.chunk.clone(),
            });
        }

        info0.across = info0.across.min(self.chunk_size.columns);
        info0.down = info0.down.min(self.chunk_size.rows);
        slots[0] = Some(info0);
        for slot in slots.iter_mut().flatten() {
            slot.across = slot.across.min(self.chunk_size.columns);
            slot.down = slot.down.min(self.chunk_size.rows);
        }
        self.render_info = slots;
    }
}

fn diagonal(
    primary: &Option<ChunkHandle>,
    secondary: &Option<ChunkHandle>,
    secondary_dir: Direction,
    primary_dir: Direction,
) -> Option<ChunkWeak> {
    if let Some(p) = primary {
        if let Some(d) = p.read().adjacent_handle(secondary_dir) {
            return Some(Arc::downgrade(&d));
        }
    }
    if let Some(s) = secondary {
        if let Some(d) = s.read().adjacent_handle(primary_dir) {
            return Some(Arc::downgrade(&d));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TerrainClass;
    use crate::chunk::{link, MapChunk};
    use std::collections::HashMap;

    fn catalog() -> Arc<RwLock<TileCatalog>> {
        Arc::new(RwLock::new(
            TileCatalog::new(8, 0, HashMap::new(), TerrainClass::default()).unwrap(),
        ))
    }

    fn rc(chunk_size: Size) -> MapRenderContext {
        let mut ctx = MapRenderContext::new(1, chunk_size, Size::new(9, 7), catalog(), 4, 8);
        let chunk = MapChunk::new(chunk_size);
        ctx.align(chunk);
        ctx
    }

    #[test]
    fn move_inside_chunk_updates_relpos() {
        let mut ctx = rc(Size::new(10, 10));
        ctx.relpos = Location::new(5, 5);
        assert_eq!(ctx.move_dir(Direction::Down, false), MoveOutcome::Moved);
        assert_eq!(ctx.relpos, Location::new(5, 6));
    }

    #[test]
    fn move_into_missing_neighbor_is_blocked() {
        let mut ctx = rc(Size::new(4, 4));
        ctx.relpos = Location::new(3, 0);
        let before = (ctx.relpos, ctx.chunkpos);
        assert_eq!(ctx.move_dir(Direction::Right, false), MoveOutcome::Blocked);
        assert_eq!((ctx.relpos, ctx.chunkpos), before);
    }

    #[test]
    fn move_crosses_into_linked_neighbor() {
        let size = Size::new(4, 4);
        let a = MapChunk::new(size);
        let b = MapChunk::new(size);
        link(&a, Direction::Right, &b);
        let mut ctx = MapRenderContext::new(1, size, Size::new(9, 7), catalog(), 4, 8);
        ctx.align(a);
        ctx.relpos = Location::new(3, 2);
        assert_eq!(ctx.move_dir(Direction::Right, false), MoveOutcome::Moved);
        assert_eq!(ctx.relpos, Location::new(0, 2));
        assert_eq!(ctx.chunkpos, Point::new(1, 0));
        assert_eq!(ctx.focus, (1, 1));
    }

    #[test]
    fn scroll_with_coarse_granularity_falls_back_to_times() {
        let mut ctx = rc(Size::new(10, 10));
        ctx.granularity = 100;
        ctx.set_update(Direction::Down, 32);
        let outcome = ctx.update_scroll(32, 8);
        assert_eq!(outcome, ScrollOutcome::InProgress);
        assert_ne!(ctx.offset, (0, -32));
    }

    #[test]
    fn scroll_completes_and_sets_groove() {
        let mut ctx = rc(Size::new(10, 10));
        ctx.set_update(Direction::Down, 32);
        let mut outcome = ScrollOutcome::InProgress;
        for _ in 0..50 {
            outcome = ctx.update_scroll(32, 8);
            if outcome == ScrollOutcome::Completed {
                break;
            }
        }
        assert_eq!(outcome, ScrollOutcome::Completed);
        assert_eq!(ctx.offset, (0, 0));
        assert!(ctx.groove);
    }
}
