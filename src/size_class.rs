//! Size classes and block-group geometry
//!
//! Allocation sizes are bucketed into a fixed, small number of power-of-two
//! classes. Every block group belongs to exactly one class for its whole
//! lifetime; the class fixes the block size and, together with the target
//! group byte size, how many blocks one group carries.

use core::fmt;

/// Number of discrete size classes
pub const NUM_SIZE_CLASSES: usize = 32;

/// log2 of the smallest class block size (16 bytes)
const MIN_CLASS_SHIFT: u32 = 4;

/// Smallest block size served by class 0
pub const MIN_BLOCK_SIZE: usize = 1 << MIN_CLASS_SHIFT;

/// A size-class index
///
/// A small integer in `0..NUM_SIZE_CLASSES` identifying one fixed block
/// size. Cheap to copy; used as an array index throughout the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

impl SizeClass {
    /// Create a size class from a raw index
    ///
    /// Returns `None` when `index` is out of range.
    pub fn new(index: usize) -> Option<Self> {
        (index < NUM_SIZE_CLASSES).then(|| Self(index as u8))
    }

    /// The class whose block size is the smallest one fitting `bytes`
    ///
    /// Requests of zero bytes map to class 0. Requests larger than the
    /// largest class saturate to the last class; callers route such sizes
    /// through the exact-size path instead.
    pub fn from_size(bytes: usize) -> Self {
        if bytes <= MIN_BLOCK_SIZE {
            return Self(0);
        }
        // ceil(log2(bytes)) without overflowing near usize::MAX
        let bits = usize::BITS - (bytes - 1).leading_zeros();
        let index = bits.saturating_sub(MIN_CLASS_SHIFT);
        Self(index.min(NUM_SIZE_CLASSES as u32 - 1) as u8)
    }

    /// Raw index in `0..NUM_SIZE_CLASSES`
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Fixed block size of this class in bytes
    pub fn block_size(self) -> usize {
        1usize << (self.0 as u32 + MIN_CLASS_SHIFT)
    }

    /// Iterate over all size classes in index order
    pub fn all() -> impl Iterator<Item = SizeClass> {
        (0..NUM_SIZE_CLASSES as u8).map(SizeClass)
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target byte size of one block group
///
/// Groups of small classes carry many blocks so that one pool round trip
/// amortizes over a whole batch; large classes degrade to one block per
/// group.
pub const TARGET_GROUP_BYTES: usize = 64 * 1024;

/// Blocks per group for a class: fill the target group size, at least one
pub fn blocks_per_group(class: SizeClass) -> usize {
    (TARGET_GROUP_BYTES / class.block_size()).max(1)
}
