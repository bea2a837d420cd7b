//! Block-group descriptors

use crate::segment::SegmentRegion;
use crate::size_class::{blocks_per_group, SizeClass};

/// Descriptor of one fixed-capacity group of same-sized blocks
///
/// The pool moves groups around and counts their blocks but never touches
/// the memory the region token names; block layout belongs to the
/// block-handle layer. A group belongs to one size class for its whole
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGroup {
    region: SegmentRegion,
    size_class: SizeClass,
    block_size: usize,
    capacity: u32,
    free: u32,
    exact: bool,
}

impl BlockGroup {
    /// A standard group carrying the class's full block batch, all free
    pub fn standard(size_class: SizeClass, region: SegmentRegion) -> Self {
        let capacity = blocks_per_group(size_class) as u32;
        Self {
            region,
            size_class,
            block_size: size_class.block_size(),
            capacity,
            free: capacity,
            exact: false,
        }
    }

    /// A single-block group sized precisely to an exact-size request
    pub fn exact(size_class: SizeClass, region: SegmentRegion, bytes: usize) -> Self {
        Self {
            region,
            size_class,
            block_size: bytes,
            capacity: 1,
            free: 1,
            exact: true,
        }
    }

    /// Size class this group belongs to
    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    /// Backing region token
    pub fn region(&self) -> SegmentRegion {
        self.region
    }

    /// Size of each block in this group
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Total blocks the group can hold
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Blocks currently free
    pub fn free_blocks(&self) -> usize {
        self.free as usize
    }

    /// Bytes of backing memory the group occupies
    pub fn bytes(&self) -> usize {
        self.region.bytes
    }

    /// True when every block is free
    pub fn is_fully_free(&self) -> bool {
        self.free == self.capacity
    }

    /// True when no block is free
    pub fn is_depleted(&self) -> bool {
        self.free == 0
    }

    /// True when this group came from the exact-size path
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Mark `n` blocks as handed out; saturates at zero free
    ///
    /// The allocation exchange uses this to park handed-back groups as
    /// depleted.
    pub fn note_allocated(&mut self, n: usize) {
        self.free = self.free.saturating_sub(n as u32);
    }

    /// Mark `n` blocks as freed back into the group; saturates at capacity
    pub fn note_freed(&mut self, n: usize) {
        self.free = (self.free + n as u32).min(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> SegmentRegion {
        SegmentRegion::new(0x1000, 64 * 1024)
    }

    #[test]
    fn standard_group_starts_fully_free() {
        let sc = SizeClass::from_size(64);
        let g = BlockGroup::standard(sc, region());
        assert!(g.is_fully_free());
        assert!(!g.is_depleted());
        assert!(!g.is_exact());
        assert_eq!(g.free_blocks(), g.capacity());
        assert_eq!(g.block_size(), 64);
    }

    #[test]
    fn exact_group_is_single_block() {
        let sc = SizeClass::from_size(5000);
        let g = BlockGroup::exact(sc, SegmentRegion::new(0x2000, 5000), 5000);
        assert!(g.is_exact());
        assert_eq!(g.capacity(), 1);
        assert_eq!(g.block_size(), 5000);
        assert_eq!(g.bytes(), 5000);
    }

    #[test]
    fn allocation_bookkeeping_saturates() {
        let sc = SizeClass::from_size(64);
        let mut g = BlockGroup::standard(sc, region());
        let cap = g.capacity();
        g.note_allocated(cap + 10);
        assert!(g.is_depleted());
        g.note_freed(cap + 10);
        assert!(g.is_fully_free());
    }
}
