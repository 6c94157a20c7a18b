//! Typed error taxonomy (spec §7), replacing the original's thread-local
//! exception stack with explicit `Result<T, PokError>` per Design Notes §9.

use std::fmt;

/// Net-module exception ids (mirrors `pok_ex_net`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    Unspecified,
    Interrupted,
    WouldBlock,
    Pending,
    BrokenPipe,
    EndOfComms,
    NoRoom,
    FileDoesNotExist,
    FileAlreadyExists,
    FilePermissionDenied,
    FileBadPath,
    CouldNotCreateLocal,
    CouldNotCreateNamedLocal,
    CouldNotCreateRemote,
    CouldNotCreateProcess,
    BadProgram,
    ProgramNotFound,
    ExecuteDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetObjError {
    BadId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsError {
    BadDimension,
    BadWindowSize,
    BadPlayerLocation,
    BadPlayerOffset,
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    UnrecognizedFormat,
    BadColorFormat,
    TooBig,
    InvalidSubimage,
    AlreadyLoaded,
    IncompleteFromFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCatalogError {
    ZeroTiles,
    TooFewAnimationEntries,
    AlreadyConfigured,
    BadImageDimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteCatalogError {
    AlreadyConfigured,
    BadImageDimension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileError {
    BadWarpKind,
    /// A well-formed but not-yet-specified character effect (spec §9 open
    /// question): `jump`/`spin_off`/`spin_on`/`slide`.
    UnsupportedEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    BadChunkSize,
    ZeroChunks,
    AlreadyLoaded,
    NotLoaded,
    BadFormat,
    NonUniqueChunk,
    BadPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultError {
    Undocumented,
    MemoryAllocationFailure,
}

/// Top-level exception category (mirrors `pok_ex_kind`, expanded with the
/// categories §7 enumerates individually).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Default(DefaultError),
    Net(NetError),
    NetObj(NetObjError),
    Graphics(GraphicsError),
    Image(ImageError),
    TileCatalog(TileCatalogError),
    SpriteCatalog(SpriteCatalogError),
    Tile(TileError),
    Map(MapError),
}

/// Severity policy from spec §7: warning/unimplemented log and continue,
/// fatal logs and terminates the owning loop/process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Unimplemented,
    Fatal,
}

impl ErrorKind {
    /// Classifies severity the way spec §7 assigns it: protocol/net
    /// failures during a peer exchange are fatal to that session (the I/O
    /// loop falls back to the default scenario); bad-id/bad-format/etc are
    /// warnings a caller can usually recover from by rejecting the input.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Default(DefaultError::MemoryAllocationFailure) => Severity::Fatal,
            ErrorKind::Default(DefaultError::Undocumented) => Severity::Warning,
            ErrorKind::Net(NetError::WouldBlock) | ErrorKind::Net(NetError::Pending) => {
                Severity::Warning
            }
            ErrorKind::Net(_) => Severity::Fatal,
            ErrorKind::NetObj(_) => Severity::Fatal,
            ErrorKind::Map(MapError::BadFormat) | ErrorKind::Map(MapError::NonUniqueChunk) => {
                Severity::Fatal
            }
            ErrorKind::Map(_) => Severity::Warning,
            ErrorKind::Tile(TileError::UnsupportedEffect) => Severity::Unimplemented,
            ErrorKind::Tile(_) => Severity::Warning,
            ErrorKind::TileCatalog(_) | ErrorKind::SpriteCatalog(_) => Severity::Fatal,
            ErrorKind::Graphics(_) | ErrorKind::Image(_) => Severity::Warning,
        }
    }
}

/// A single reported exception: category plus a human-readable message.
#[derive(Debug, Clone)]
pub struct PokError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PokError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Convenience constructor for the two non-fatal net ids the
    /// resumable-read context (§4.3) recognizes specially.
    pub fn would_block() -> Self {
        Self::new(ErrorKind::Net(NetError::WouldBlock), "would block")
    }

    pub fn pending() -> Self {
        Self::new(ErrorKind::Net(NetError::Pending), "pending")
    }

    pub fn no_room() -> Self {
        Self::new(ErrorKind::Net(NetError::NoRoom), "no room in buffer")
    }

    pub fn end_of_comms() -> Self {
        Self::new(ErrorKind::Net(NetError::EndOfComms), "end of communication")
    }

    /// True for the two ids the resumable-read context treats as
    /// "try again later" rather than a real failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Net(NetError::WouldBlock) | ErrorKind::Net(NetError::Pending)
        )
    }
}

impl fmt::Display for PokError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PokError {}

/// The outcome of a resumable netread/netwrite step, replacing the
/// original's thread-local exception-stack sentinel with an explicit enum
/// (Design Notes §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadProgress {
    Completed,
    Incomplete,
    Failed,
}
