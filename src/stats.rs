//! Statistics counters and reporting
//!
//! All counters are relaxed atomics living outside the pool guard:
//! operations bump them on the way through, and [`PoolReport`] is built
//! from plain loads. Reads under concurrent mutation are best-effort, not
//! a consistent snapshot; counters are monotonic and never reset.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::size_class::{SizeClass, NUM_SIZE_CLASSES};

/// Per-size-class operation counters
#[derive(Debug, Default)]
pub struct ClassStats {
    pub(crate) acquires: AtomicU64,
    pub(crate) exchange_allocs: AtomicU64,
    pub(crate) exchange_releases: AtomicU64,
    pub(crate) exact_allocs: AtomicU64,
    pub(crate) returns: AtomicU64,
    pub(crate) refills: AtomicU64,
}

impl ClassStats {
    pub(crate) fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exchange_alloc(&self) {
        self.exchange_allocs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exchange_release(&self) {
        self.exchange_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exact_alloc(&self) {
        self.exact_allocs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refill(&self) {
        self.refills.fetch_add(1, Ordering::Relaxed);
    }

    /// True once any operation has touched this class
    pub fn is_used(&self) -> bool {
        self.snapshot().is_used()
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ClassStatsSnapshot {
        ClassStatsSnapshot {
            acquires: self.acquires.load(Ordering::Relaxed),
            exchange_allocs: self.exchange_allocs.load(Ordering::Relaxed),
            exchange_releases: self.exchange_releases.load(Ordering::Relaxed),
            exact_allocs: self.exact_allocs.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of one class's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassStatsSnapshot {
    /// `acquire_available` calls served
    pub acquires: u64,
    /// `exchange_allocate` calls served
    pub exchange_allocs: u64,
    /// `exchange_release` calls served
    pub exchange_releases: u64,
    /// `allocate_exact` calls served
    pub exact_allocs: u64,
    /// `return_memory` calls served
    pub returns: u64,
    /// Segment-manager refills performed on behalf of this class
    pub refills: u64,
}

impl ClassStatsSnapshot {
    /// True once any counter is non-zero
    pub fn is_used(&self) -> bool {
        self.acquires != 0
            || self.exchange_allocs != 0
            || self.exchange_releases != 0
            || self.exact_allocs != 0
            || self.returns != 0
            || self.refills != 0
    }
}

/// Pool-wide counters not tied to a single class
#[derive(Debug, Default)]
pub(crate) struct GlobalStats {
    pub(crate) refill_calls: AtomicU64,
    pub(crate) refill_groups: AtomicU64,
    pub(crate) node_allocs: AtomicU64,
    pub(crate) released_groups: AtomicU64,
}

impl GlobalStats {
    pub(crate) fn record_refill(&self, groups: usize) {
        self.refill_calls.fetch_add(1, Ordering::Relaxed);
        self.refill_groups.fetch_add(groups as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_node_alloc(&self, nodes: usize) {
        self.node_allocs.fetch_add(nodes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self, groups: usize) {
        self.released_groups.fetch_add(groups as u64, Ordering::Relaxed);
    }
}

/// Accumulated statistics for one pool, classes without traffic skipped
#[derive(Debug, Clone)]
pub struct PoolReport {
    /// Verbosity the report was built with
    pub level: usize,
    /// (class index, block size, counters) for every used class
    pub classes: Vec<(usize, usize, ClassStatsSnapshot)>,
    /// Total segment-manager refill calls
    pub refill_calls: u64,
    /// Total groups pulled across all refills
    pub refill_groups: u64,
    /// Total chunk-list nodes ever allocated
    pub node_allocs: u64,
    /// Total groups released back to the segment manager
    pub released_groups: u64,
}

impl PoolReport {
    pub(crate) fn build(
        level: usize,
        classes: &[ClassStats; NUM_SIZE_CLASSES],
        global: &GlobalStats,
    ) -> Self {
        let classes = SizeClass::all()
            .filter_map(|sc| {
                let snap = classes[sc.index()].snapshot();
                snap.is_used()
                    .then_some((sc.index(), sc.block_size(), snap))
            })
            .collect();
        Self {
            level,
            classes,
            refill_calls: global.refill_calls.load(Ordering::Relaxed),
            refill_groups: global.refill_groups.load(Ordering::Relaxed),
            node_allocs: global.node_allocs.load(Ordering::Relaxed),
            released_groups: global.released_groups.load(Ordering::Relaxed),
        }
    }
}

impl core::fmt::Display for PoolReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(
            f,
            "Pool: {} refills ({} groups), {} nodes allocated, {} groups released",
            self.refill_calls, self.refill_groups, self.node_allocs, self.released_groups
        )?;
        if self.level >= 1 {
            for (index, block_size, snap) in &self.classes {
                writeln!(
                    f,
                    "  class {index:2} ({block_size} B): acquires {}, xalloc {}, xrelease {}, \
                     exact {}, returns {}, refills {}",
                    snap.acquires,
                    snap.exchange_allocs,
                    snap.exchange_releases,
                    snap.exact_allocs,
                    snap.returns,
                    snap.refills,
                )?;
            }
        }
        Ok(())
    }
}
