//! Detached chunk lists
//!
//! A [`ChunkList`] is the atomic unit of transfer between the global pool
//! and a thread-local cache: an ordered chain of block groups plus its
//! aggregate bookkeeping. Once an operation returns a list, the pool holds
//! no reference to any of its groups; passing the list back into an
//! exchange operation consumes it. The list is deliberately not `Clone`:
//! ownership transfer by move is the only synchronization between the pool
//! and its callers.

use core::fmt;
use core::mem::ManuallyDrop;

use crate::arena::NodeHandle;
use crate::size_class::SizeClass;

/// A detached, exclusively owned chain of block groups
///
/// Produced and consumed only by pool operations. The aggregate counts are
/// fixed at detach time; the authoritative group descriptors travel with
/// the chain inside the owning pool's node arena.
pub struct ChunkList {
    pub(crate) pool_id: u64,
    pub(crate) size_class: SizeClass,
    pub(crate) head: Option<NodeHandle>,
    pub(crate) groups: usize,
    pub(crate) free_blocks: usize,
    pub(crate) total_blocks: usize,
    pub(crate) bytes: usize,
}

/// Raw fields of a dissolved list, used by the pool when merging it back
pub(crate) struct ListParts {
    pub(crate) pool_id: u64,
    pub(crate) size_class: SizeClass,
    pub(crate) head: Option<NodeHandle>,
    pub(crate) groups: usize,
}

impl ChunkList {
    pub(crate) fn detached(
        pool_id: u64,
        size_class: SizeClass,
        head: Option<NodeHandle>,
        groups: usize,
        free_blocks: usize,
        total_blocks: usize,
        bytes: usize,
    ) -> Self {
        Self {
            pool_id,
            size_class,
            head,
            groups,
            free_blocks,
            total_blocks,
            bytes,
        }
    }

    /// Size class every group in this list belongs to
    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    /// Number of block groups in the list
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Free blocks across all groups, as counted at detach time
    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    /// Total block capacity across all groups
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// Bytes of backing memory the list's groups occupy
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// True when the list carries no groups
    pub fn is_empty(&self) -> bool {
        self.groups == 0
    }

    /// Dissolve the list into its raw fields without running `Drop`
    pub(crate) fn into_raw(self) -> ListParts {
        let this = ManuallyDrop::new(self);
        ListParts {
            pool_id: this.pool_id,
            size_class: this.size_class,
            head: this.head,
            groups: this.groups,
        }
    }
}

impl fmt::Debug for ChunkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkList")
            .field("size_class", &self.size_class)
            .field("groups", &self.groups)
            .field("free_blocks", &self.free_blocks)
            .field("total_blocks", &self.total_blocks)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for ChunkList {
    fn drop(&mut self) {
        // A list must travel back through an exchange or return operation;
        // dropping it strands its groups outside every lane.
        if self.groups > 0 {
            tracing::warn!(
                size_class = %self.size_class,
                groups = self.groups,
                "chunk list dropped without being returned; its groups leak"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_reports_empty() {
        let sc = SizeClass::from_size(64);
        let list = ChunkList::detached(1, sc, None, 0, 0, 0, 0);
        assert!(list.is_empty());
        assert_eq!(list.free_blocks(), 0);
        assert_eq!(list.bytes(), 0);
    }

    #[test]
    fn into_raw_skips_drop_warning() {
        let sc = SizeClass::from_size(64);
        let list = ChunkList::detached(7, sc, None, 3, 10, 12, 4096);
        let parts = list.into_raw();
        assert_eq!(parts.pool_id, 7);
        assert_eq!(parts.groups, 3);
    }
}
