//! Map chunk and its 4-neighbor adjacency graph (spec §3, §4.6). Cyclic
//! graphs need arena-style shared ownership (Design Notes §9); we use
//! `Arc<RwLock<MapChunk>>` nodes with `Weak` back-references for the four
//! neighbor slots, matching the teacher's per-object `parking_lot`
//! locking style rather than a bare `Mutex`.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::geometry::{Direction, Size};
use crate::netobj::{self, NetObj};
use crate::tile::Tile;

pub type ChunkHandle = Arc<RwLock<MapChunk>>;
pub type ChunkWeak = Weak<RwLock<MapChunk>>;

/// Owns a `Size.rows x Size.columns` grid of tiles plus the four
/// adjacency slots.
pub struct MapChunk {
    pub size: Size,
    tiles: Vec<Tile>,
    pub adjacent: [Option<ChunkWeak>; 4],
    pub netobj_id: u32,
    /// DFS visited bit for the free walk (spec §4.6).
    discov: bool,
}

impl MapChunk {
    pub fn new(size: Size) -> ChunkHandle {
        let count = (size.columns * size.rows) as usize;
        Arc::new(RwLock::new(Self {
            size,
            tiles: vec![Tile::blank(); count],
            adjacent: [None, None, None, None],
            netobj_id: netobj::registry().allocate(),
            discov: false,
        }))
    }

    pub fn tile(&self, column: u32, row: u32) -> &Tile {
        &self.tiles[(row * self.size.columns + column) as usize]
    }

    pub fn tile_mut(&mut self, column: u32, row: u32) -> &mut Tile {
        &mut self.tiles[(row * self.size.columns + column) as usize]
    }

    pub fn set_tile(&mut self, column: u32, row: u32, tile: Tile) {
        *self.tile_mut(column, row) = tile;
    }

    pub fn adjacent_handle(&self, dir: Direction) -> Option<ChunkHandle> {
        let idx = dir.index()?;
        self.adjacent[idx].as_ref().and_then(Weak::upgrade)
    }
}

impl NetObj for MapChunk {
    fn netobj_id(&self) -> u32 {
        self.netobj_id
    }
}

impl Drop for MapChunk {
    fn drop(&mut self) {
        netobj::registry().unregister(self.netobj_id);
    }
}

/// Links `a.adjacent[dir] = b` and `b.adjacent[opposite(dir)] = a`,
/// maintaining the invariant spec §8 invariant 1 requires. Both locks are
/// taken write; caller must not already hold either.
pub fn link(a: &ChunkHandle, dir: Direction, b: &ChunkHandle) {
    let idx = dir.index().expect("link requires an orthogonal direction");
    let opp_idx = dir.opposite().index().unwrap();
    a.write().adjacent[idx] = Some(Arc::downgrade(b));
    b.write().adjacent[opp_idx] = Some(Arc::downgrade(a));
}

/// Cursor used while incrementally building the adjacency graph (spec
/// §4.6): links each new chunk to the previous same-row chunk (west) and
/// the same-column chunk from the previous row (north), then cross-links
/// diagonals opportunistically by following already-set adjacencies.
pub struct ChunkInsertHint {
    /// Chunk at the start of the row currently being built, indexed as we
    /// move west->east; `row_chunks[col]` holds the previous row's chunk
    /// at that column once the row is complete.
    previous_row: Vec<ChunkHandle>,
    current_row: Vec<ChunkHandle>,
    west: Option<ChunkHandle>,
    /// Every chunk inserted so far, in insertion order. This is the grid's
    /// only strong-owner collection: `previous_row`/`current_row`/`west`
    /// are scratch state that gets discarded as the build advances, so
    /// without this a caller that drops the hint after building keeps
    /// nothing alive but whatever it separately held onto (spec §4.6 —
    /// the chunk graph itself is all `Weak`, by design, so something
    /// outside it must hold the `Arc`s).
    all: Vec<ChunkHandle>,
}

impl ChunkInsertHint {
    pub fn new() -> Self {
        Self {
            previous_row: Vec::new(),
            current_row: Vec::new(),
            west: None,
            all: Vec::new(),
        }
    }

    /// Inserts `chunk` at the next row-major position, wiring west/north
    /// links and reconciling diagonals.
    pub fn insert(&mut self, chunk: ChunkHandle) {
        if let Some(west) = &self.west {
            link(west, Direction::Right, &chunk);
        }
        let col = self.current_row.len();
        if let Some(north) = self.previous_row.get(col) {
            link(north, Direction::Down, &chunk);
        }
        // Diagonal reconciliation: if both the west neighbor's north
        // neighbor and the north neighbor's west neighbor are already
        // known, they must name the same chunk (spec §3's diagonal
        // agreement rule); we simply adopt whichever is already linked
        // rather than re-deriving it, since `link` above already
        // established both directly-adjacent edges.
        self.all.push(chunk.clone());
        self.current_row.push(chunk.clone());
        self.west = Some(chunk);
    }

    /// Call after finishing a row of chunks.
    pub fn end_row(&mut self) {
        self.previous_row = std::mem::take(&mut self.current_row);
        self.west = None;
    }

    /// All chunks inserted so far, in row-major insertion order. Consumes
    /// the hint since its scratch rows have no further use once the grid
    /// is handed off to its real owner.
    pub fn into_chunks(self) -> Vec<ChunkHandle> {
        self.all
    }

    pub fn chunks(&self) -> &[ChunkHandle] {
        &self.all
    }
}

impl Default for ChunkInsertHint {
    fn default() -> Self {
        Self::new()
    }
}

/// Frees `root` and every chunk reachable from it via a DFS with a
/// visited bit (spec §4.6), nulling any inbound adjacency from a
/// surviving neighbor so it is never left dangling. Chunks with no other
/// surviving `Arc` owner are dropped when this function returns.
pub fn free_chunk_graph(root: &ChunkHandle) {
    let mut stack = vec![root.clone()];
    let mut visited: Vec<ChunkHandle> = Vec::new();

    while let Some(chunk) = stack.pop() {
        {
            let mut guard = chunk.write();
            if guard.discov {
                continue;
            }
            guard.discov = true;
        }
        let neighbors: Vec<(usize, ChunkHandle)> = {
            let guard = chunk.read();
            Direction::ORTHOGONAL
                .iter()
                .filter_map(|d| {
                    let idx = d.index().unwrap();
                    guard.adjacent[idx]
                        .as_ref()
                        .and_then(Weak::upgrade)
                        .map(|h| (idx, h))
                })
                .collect()
        };
        for (_, neighbor) in &neighbors {
            stack.push(neighbor.clone());
        }
        visited.push(chunk);
    }

    for chunk in &visited {
        let neighbors: Vec<ChunkWeak> = chunk.read().adjacent.to_vec();
        for (idx, weak) in neighbors.iter().enumerate() {
            if let Some(neighbor) = weak.as_ref().and_then(Weak::upgrade) {
                neighbor.write().adjacent[opposite_index(idx)] = None;
            }
        }
        chunk.write().adjacent = [None, None, None, None];
    }
}

fn opposite_index(idx: usize) -> usize {
    match idx {
        0 => 1,
        1 => 0,
        2 => 3,
        3 => 2,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size() -> Size {
        Size::new(4, 4)
    }

    #[test]
    fn link_maintains_reciprocal_invariant() {
        let a = MapChunk::new(size());
        let b = MapChunk::new(size());
        link(&a, Direction::Right, &b);
        assert!(Arc::ptr_eq(
            &a.read().adjacent_handle(Direction::Right).unwrap(),
            &b
        ));
        assert!(Arc::ptr_eq(
            &b.read().adjacent_handle(Direction::Left).unwrap(),
            &a
        ));
    }

    #[test]
    fn insert_hint_wires_grid() {
        let mut hint = ChunkInsertHint::new();
        let chunks: Vec<ChunkHandle> = (0..4).map(|_| MapChunk::new(size())).collect();
        hint.insert(chunks[0].clone());
        hint.insert(chunks[1].clone());
        hint.end_row();
        hint.insert(chunks[2].clone());
        hint.insert(chunks[3].clone());
        hint.end_row();

        assert!(Arc::ptr_eq(
            &chunks[0].read().adjacent_handle(Direction::Right).unwrap(),
            &chunks[1]
        ));
        assert!(Arc::ptr_eq(
            &chunks[0].read().adjacent_handle(Direction::Down).unwrap(),
            &chunks[2]
        ));
        assert!(Arc::ptr_eq(
            &chunks[1].read().adjacent_handle(Direction::Down).unwrap(),
            &chunks[3]
        ));

        let owned = hint.into_chunks();
        assert_eq!(owned.len(), 4);
        assert!(Arc::ptr_eq(&owned[0], &chunks[0]));
        assert!(Arc::ptr_eq(&owned[3], &chunks[3]));
    }

    #[test]
    fn netobj_ids_are_unique_and_freed_on_drop() {
        let a = MapChunk::new(size());
        let b = MapChunk::new(size());
        let id_a = a.read().netobj_id();
        let id_b = b.read().netobj_id();
        assert_ne!(id_a, id_b);
        assert!(crate::netobj::registry().is_live(id_a));
        drop(a);
        assert!(!crate::netobj::registry().is_live(id_a));
        assert!(crate::netobj::registry().is_live(id_b));
    }

    #[test]
    fn free_chunk_graph_handles_cycle_without_hanging() {
        let a = MapChunk::new(size());
        let b = MapChunk::new(size());
        link(&a, Direction::Right, &b);
        link(&b, Direction::Down, &a);
        free_chunk_graph(&a);
        assert!(a.read().adjacent_handle(Direction::Right).is_none());
        assert!(b.read().adjacent_handle(Direction::Up).is_none());
    }
}
