//! Shared numeric constants, mirrored from the original's headers.

// === tile/grid geometry ===
pub const TILE_PIXELS: u32 = 32;
pub const DEFAULT_CHUNK_SIZE: u16 = 32;
pub const MIN_CHUNK_SIZE: u16 = 4;
/// Ceiling on one chunk axis a loaded/received map will ever carry; `load`'s
/// halving algorithm stops subdividing once both axes are at or under this
/// (spec §4.6 path (a)).
pub const MAX_MAP_CHUNK_DIMENSION: u32 = 128;

// === channel / wire ===
pub const CHANNEL_RING_SIZE: usize = 4096;
pub const MAX_STRING_LENGTH: usize = 4096;

// === animation ===
pub const DIRECTION_FRAME_COUNT: usize = 10;

// === tick pacing ===
pub const DEFAULT_TICK_MS: u64 = 50;
