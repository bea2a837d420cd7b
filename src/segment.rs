//! Segment manager interface
//!
//! The segment manager is the pool's upstream supplier: it carves raw
//! address space into block groups and chunk-list nodes, and takes surplus
//! groups back. The pool consumes it through the [`SegmentManager`] trait
//! and never looks inside the regions it hands out.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{PoolError, PoolResult};
use crate::size_class::{blocks_per_group, SizeClass};

/// Opaque region of backing memory named by the segment manager
///
/// The pool treats a region as a token: it records which group the region
/// backs and eventually returns it, but never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentRegion {
    /// Offset of the region within the segment manager's address range
    pub offset: usize,
    /// Length of the region in bytes
    pub bytes: usize,
}

impl SegmentRegion {
    /// Create a region token
    pub fn new(offset: usize, bytes: usize) -> Self {
        Self { offset, bytes }
    }
}

/// Supplier and sink of raw block groups and chunk-list nodes
///
/// The segment manager has its own synchronization; the pool may call it
/// while holding its guard. All acquisition is fallible; a refusal is
/// surfaced to the pool's caller as [`PoolError`] and never retried.
pub trait SegmentManager {
    /// Acquire backing regions for `count` block groups of `size_class`
    ///
    /// Each region must be large enough for one full group
    /// (`blocks_per_group(size_class) * size_class.block_size()` bytes).
    /// Either all `count` regions are supplied or the call fails; partial
    /// grants are not permitted.
    fn acquire_block_groups(
        &self,
        size_class: SizeClass,
        count: usize,
    ) -> PoolResult<Vec<SegmentRegion>>;

    /// Acquire one region sized precisely to `bytes` for the exact-size path
    fn acquire_exact_group(&self, size_class: SizeClass, bytes: usize) -> PoolResult<SegmentRegion>;

    /// Acquire backing memory for `count` chunk-list bookkeeping nodes
    ///
    /// Returns the number of nodes granted (all-or-nothing, like group
    /// acquisition). Node memory is never returned.
    fn acquire_list_nodes(&self, count: usize) -> PoolResult<usize>;

    /// Take back regions the pool no longer needs
    fn release_block_groups(&self, regions: Vec<SegmentRegion>);
}

/// Byte budget carve-out segment manager
///
/// Hands out regions from a monotonically advancing offset until a byte
/// budget is exhausted, and keeps atomic accounting of everything that
/// crossed the interface. Released bytes are credited back to the budget
/// but their address range is not recycled; this is a bookkeeping
/// collaborator, not a virtual-memory arena.
///
/// A budget of zero refuses every request, which is the standard way to
/// drive the pool's exhaustion paths in tests.
#[derive(Debug)]
pub struct BumpSegment {
    budget: usize,
    next_offset: AtomicUsize,
    bytes_in_use: AtomicUsize,
    groups_acquired: AtomicUsize,
    groups_released: AtomicUsize,
    nodes_acquired: AtomicUsize,
}

/// Offset of the first region handed out; keeps offset zero unused so a
/// zero offset can never be mistaken for a valid region in diagnostics.
const FIRST_OFFSET: usize = 0x1000;

impl BumpSegment {
    /// Create a segment manager with `budget` bytes available for groups
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            next_offset: AtomicUsize::new(FIRST_OFFSET),
            bytes_in_use: AtomicUsize::new(0),
            groups_acquired: AtomicUsize::new(0),
            groups_released: AtomicUsize::new(0),
            nodes_acquired: AtomicUsize::new(0),
        }
    }

    /// Create a segment manager with an effectively unlimited budget
    pub fn unbounded() -> Self {
        Self::with_budget(usize::MAX / 2)
    }

    /// Bytes currently held by the pool (acquired minus released)
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use.load(Ordering::Relaxed)
    }

    /// Total block groups handed out
    pub fn groups_acquired(&self) -> usize {
        self.groups_acquired.load(Ordering::Relaxed)
    }

    /// Total block groups taken back
    pub fn groups_released(&self) -> usize {
        self.groups_released.load(Ordering::Relaxed)
    }

    /// Total chunk-list nodes handed out
    pub fn nodes_acquired(&self) -> usize {
        self.nodes_acquired.load(Ordering::Relaxed)
    }

    fn reserve(&self, bytes: usize) -> Option<usize> {
        let mut in_use = self.bytes_in_use.load(Ordering::Relaxed);
        loop {
            let next = in_use.checked_add(bytes)?;
            if next > self.budget {
                return None;
            }
            match self.bytes_in_use.compare_exchange_weak(
                in_use,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => in_use = current,
            }
        }
        Some(self.next_offset.fetch_add(bytes, Ordering::Relaxed))
    }
}

impl SegmentManager for BumpSegment {
    fn acquire_block_groups(
        &self,
        size_class: SizeClass,
        count: usize,
    ) -> PoolResult<Vec<SegmentRegion>> {
        let group_bytes = blocks_per_group(size_class) * size_class.block_size();
        let total = group_bytes
            .checked_mul(count)
            .ok_or_else(|| PoolError::exhausted(size_class, usize::MAX))?;
        let Some(base) = self.reserve(total) else {
            tracing::debug!(%size_class, requested = total, "segment refused block groups");
            return Err(PoolError::exhausted(size_class, total));
        };
        self.groups_acquired.fetch_add(count, Ordering::Relaxed);
        Ok((0..count)
            .map(|i| SegmentRegion::new(base + i * group_bytes, group_bytes))
            .collect())
    }

    fn acquire_exact_group(&self, size_class: SizeClass, bytes: usize) -> PoolResult<SegmentRegion> {
        let Some(offset) = self.reserve(bytes) else {
            tracing::debug!(requested = bytes, "segment refused exact group");
            return Err(PoolError::exhausted(size_class, bytes));
        };
        self.groups_acquired.fetch_add(1, Ordering::Relaxed);
        Ok(SegmentRegion::new(offset, bytes))
    }

    fn acquire_list_nodes(&self, count: usize) -> PoolResult<usize> {
        if self.budget == 0 {
            return Err(PoolError::nodes_exhausted(count));
        }
        // Node memory is bookkeeping-sized and not charged against the
        // group budget.
        self.nodes_acquired.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    fn release_block_groups(&self, regions: Vec<SegmentRegion>) {
        let bytes: usize = regions.iter().map(|r| r.bytes).sum();
        self.groups_released.fetch_add(regions.len(), Ordering::Relaxed);
        self.bytes_in_use.fetch_sub(bytes, Ordering::Relaxed);
    }
}
