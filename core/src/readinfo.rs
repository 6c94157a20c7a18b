//! Resumable-read progress record (spec §4.3), ported field-for-field from
//! `original_source/src/netobj.h`'s `pok_netobj_readinfo`.

use crate::error::{PokError, ReadProgress};

/// Typed auxiliary payload a concrete netread stashes between suspended
/// calls (e.g. a partially filled tile row count, a partially read
/// animation-table index).
#[derive(Debug, Clone, Default)]
pub enum ReadAux {
    #[default]
    None,
    Count(u32),
    Bytes(Vec<u8>),
}

/// A resumable composite-read progress marker: a field-progress counter,
/// two depth counters (for 2D loops over rows/columns), an auxiliary slot,
/// a child `ReadInfo` for nested structures, and a pending flag.
#[derive(Debug, Clone, Default)]
pub struct ReadInfo {
    pub field_prog: u32,
    pub depth: [u32; 2],
    pub aux: ReadAux,
    pub child: Option<Box<ReadInfo>>,
    pub pending: bool,
}

impl ReadInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child_mut(&mut self) -> &mut ReadInfo {
        self.child.get_or_insert_with(|| Box::new(ReadInfo::new()))
    }

    pub fn reset(&mut self) {
        *self = ReadInfo::new();
    }

    /// Inspects the outcome of a primitive read. On a retryable error
    /// (`WouldBlock`/`Pending`) notes `pending` and reports `Incomplete`;
    /// on success advances `field_prog` and reports `Completed`; any other
    /// error reports `Failed` and leaves `field_prog` where it was so a
    /// caller that chooses to retry re-enters the same step.
    pub fn process<T>(&mut self, result: &Result<T, PokError>) -> ReadProgress {
        match result {
            Ok(_) => {
                self.pending = false;
                self.field_prog += 1;
                ReadProgress::Completed
            }
            Err(e) if e.is_retryable() => {
                self.pending = true;
                ReadProgress::Incomplete
            }
            Err(_) => ReadProgress::Failed,
        }
    }

    /// 2D variant: advances `depth[axis]` instead of `field_prog` on
    /// success, for nested row/column loops that reuse the same
    /// `field_prog` step across many iterations.
    pub fn process_depth<T>(&mut self, axis: usize, result: &Result<T, PokError>) -> ReadProgress {
        match result {
            Ok(_) => {
                self.pending = false;
                self.depth[axis] += 1;
                ReadProgress::Completed
            }
            Err(e) if e.is_retryable() => {
                self.pending = true;
                ReadProgress::Incomplete
            }
            Err(_) => ReadProgress::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PokError;

    #[test]
    fn process_advances_field_prog_on_success() {
        let mut info = ReadInfo::new();
        let r: Result<u8, PokError> = Ok(1);
        assert_eq!(info.process(&r), ReadProgress::Completed);
        assert_eq!(info.field_prog, 1);
        assert!(!info.pending);
    }

    #[test]
    fn process_marks_pending_on_would_block() {
        let mut info = ReadInfo::new();
        let r: Result<u8, PokError> = Err(PokError::would_block());
        assert_eq!(info.process(&r), ReadProgress::Incomplete);
        assert!(info.pending);
        assert_eq!(info.field_prog, 0);
    }

    #[test]
    fn process_depth_advances_matching_axis() {
        let mut info = ReadInfo::new();
        let r: Result<u8, PokError> = Ok(1);
        assert_eq!(info.process_depth(1, &r), ReadProgress::Completed);
        assert_eq!(info.depth, [0, 1]);
    }

    #[test]
    fn child_is_lazily_created() {
        let mut info = ReadInfo::new();
        assert!(info.child.is_none());
        info.child_mut().field_prog = 5;
        assert_eq!(info.child.as_ref().unwrap().field_prog, 5);
    }
}
