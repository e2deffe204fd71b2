//! Which writer compacts the engine after its epochs.
//!
//! At most one writer of a run ever compacts.

/// Lower bound of the compacted key range.
pub const COMPACT_START: &[u8] = b"";

/// Upper bound of the compacted key range.
pub const COMPACT_END: &[u8] = &[0xFF];

/// Index of the writer that compacts when compaction is enabled.
pub const COMPACTING_WRITER: usize = 0;

/// The compaction decision for a run, fixed at startup.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CompactionPolicy {
    enabled: bool,
}

impl CompactionPolicy {
    /// Creates the policy.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether any writer compacts in this run.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the writer with the given index compacts after each of its epochs.
    pub fn compacts(&self, writer: usize) -> bool {
        self.enabled && writer == COMPACTING_WRITER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_writer_compacts() {
        let policy = CompactionPolicy::new(true);
        assert!(policy.compacts(0));
        assert!((1..16).all(|writer| !policy.compacts(writer)));

        let policy = CompactionPolicy::new(false);
        assert!((0..16).all(|writer| !policy.compacts(writer)));
    }
}
