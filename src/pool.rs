//! The global size-class pool
//!
//! One [`GlobalPool`] arbitrates block groups between the segment manager
//! and many thread-local caches. Each size class keeps two lanes: the
//! available lane holds groups ready to hand out, the reclaim lane holds
//! groups returned by callers and not yet consolidated. A single mutex per
//! pool guards all lane, arena, and reservoir mutation; statistics are
//! relaxed atomics outside the guard.
//!
//! Batching is the point of the design: callers cross into the pool once
//! per chunk list, not once per block, so the guard is taken once per batch.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::arena::{NodeArena, NodeHandle};
use crate::chunk::BlockGroup;
use crate::config::PoolTunables;
use crate::error::PoolResult;
use crate::list::ChunkList;
use crate::segment::{SegmentManager, SegmentRegion};
use crate::size_class::{blocks_per_group, SizeClass, NUM_SIZE_CLASSES};
use crate::stats::{ClassStats, GlobalStats, PoolReport};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// One lane: a linked chain of block-group nodes plus aggregates
#[derive(Debug, Default)]
struct LaneList {
    head: Option<NodeHandle>,
    groups: usize,
    free_blocks: usize,
    total_blocks: usize,
    bytes: usize,
}

impl LaneList {
    fn push(&mut self, arena: &mut NodeArena, handle: NodeHandle) {
        let Some(group) = arena.node(handle).group else {
            debug_assert!(false, "lane node without a group payload");
            return;
        };
        arena.node_mut(handle).next = self.head;
        self.head = Some(handle);
        self.groups += 1;
        self.free_blocks += group.free_blocks();
        self.total_blocks += group.capacity();
        self.bytes += group.bytes();
    }

    fn pop(&mut self, arena: &mut NodeArena) -> Option<NodeHandle> {
        let handle = self.head?;
        let node = arena.node_mut(handle);
        self.head = node.next.take();
        if let Some(group) = node.group {
            self.groups -= 1;
            self.free_blocks -= group.free_blocks();
            self.total_blocks -= group.capacity();
            self.bytes -= group.bytes();
        }
        Some(handle)
    }

    fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Available/reclaim lane pair for one size class
#[derive(Debug, Default)]
struct LanePair {
    available: LaneList,
    reclaim: LaneList,
}

/// Everything the pool guard protects
#[derive(Debug)]
struct PoolState {
    arena: NodeArena,
    lanes: [LanePair; NUM_SIZE_CLASSES],
}

impl PoolState {
    fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            lanes: Default::default(),
        }
    }

    /// Idle bytes parked in both lanes of one class
    fn class_idle_bytes(&self, sc: SizeClass) -> usize {
        let pair = &self.lanes[sc.index()];
        pair.available.bytes + pair.reclaim.bytes
    }

    /// Idle bytes parked in the pool across every class
    fn total_idle_bytes(&self) -> usize {
        self.lanes
            .iter()
            .map(|pair| pair.available.bytes + pair.reclaim.bytes)
            .sum()
    }
}

/// Lane occupancy of one size class at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassSnapshot {
    /// Groups in the available lane
    pub available_groups: usize,
    /// Free blocks in the available lane
    pub available_blocks: usize,
    /// Groups in the reclaim lane
    pub reclaim_groups: usize,
    /// Free blocks in the reclaim lane
    pub reclaim_blocks: usize,
    /// Total block capacity across both lanes
    pub total_blocks: usize,
    /// Idle bytes across both lanes
    pub idle_bytes: usize,
}

/// The global size-class pool
///
/// Supplies and reclaims chunk lists for thread-local caches. Tunables are
/// fixed at construction; the segment manager is consumed through its
/// trait and reachable via [`segment`](GlobalPool::segment) for
/// diagnostics.
///
/// The pool starts in single-threaded mode with guard acquisition elided;
/// [`enable_thread_support`](GlobalPool::enable_thread_support) must be
/// called before a second thread touches the pool.
#[derive(Debug)]
pub struct GlobalPool<S: SegmentManager> {
    id: u64,
    tunables: PoolTunables,
    segment: S,
    state: Mutex<PoolState>,
    concurrent: AtomicBool,
    class_stats: [ClassStats; NUM_SIZE_CLASSES],
    global_stats: GlobalStats,
}

impl<S: SegmentManager> GlobalPool<S> {
    /// Create a pool over `segment` with the given tunables
    pub fn new(segment: S, tunables: PoolTunables) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            tunables,
            segment,
            state: Mutex::new(PoolState::new()),
            concurrent: AtomicBool::new(false),
            class_stats: Default::default(),
            global_stats: GlobalStats::default(),
        }
    }

    /// The segment manager this pool draws from
    pub fn segment(&self) -> &S {
        &self.segment
    }

    /// Tunables this pool was built with
    pub fn tunables(&self) -> &PoolTunables {
        &self.tunables
    }

    /// Switch from the unguarded single-threaded fast path to guarded
    /// multi-threaded operation
    ///
    /// One-shot and irreversible. Must be called before any second thread
    /// calls into the pool; calling any pool operation concurrently with
    /// the transition is a contract violation.
    pub fn enable_thread_support(&self) {
        let was = self.concurrent.swap(true, Ordering::Release);
        debug_assert!(!was, "enable_thread_support must be called exactly once");
        if !was {
            tracing::debug!(pool = self.id, "entering multi-threaded mode");
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        if self.concurrent.load(Ordering::Acquire) {
            self.state.lock()
        } else {
            // Single-threaded mode: the guard is uncontended by contract,
            // so a failed try_lock means a second thread is already
            // calling in before enable_thread_support().
            match self.state.try_lock() {
                Some(guard) => guard,
                None => panic!("pool used from multiple threads before enable_thread_support"),
            }
        }
    }

    /// Detach a chunk list with at least `min_blocks` free blocks from the
    /// available lane, consolidating from reclaim and refilling from the
    /// segment manager as needed
    ///
    /// A `min_blocks` of zero returns a valid empty list without touching
    /// the segment manager. On exhaustion no lane has been mutated beyond
    /// consolidation already owed, and nothing is handed out.
    pub fn acquire_available(&self, sc: SizeClass, min_blocks: usize) -> PoolResult<ChunkList> {
        self.class_stats[sc.index()].record_acquire();
        let mut state = self.lock();
        if min_blocks == 0 {
            return Ok(self.empty_list(sc));
        }
        self.ensure_available(&mut state, sc, min_blocks)?;
        Ok(self.detach_at_least(&mut state, sc, min_blocks))
    }

    /// Hand back a depleted list and draw a fresh one from the available
    /// lane, replenishing from the segment manager if necessary
    ///
    /// The handed-back groups are marked depleted and parked in the reclaim
    /// lane; their blocks rejoin circulation only when the free path brings
    /// them back. They are never recycled into the replacement.
    pub fn exchange_allocate(&self, sc: SizeClass, list: ChunkList) -> PoolResult<ChunkList> {
        self.class_stats[sc.index()].record_exchange_alloc();
        let mut state = self.lock();
        self.park_depleted(&mut state, sc, list);
        let want = blocks_per_group(sc);
        self.ensure_available(&mut state, sc, want)?;
        Ok(self.detach_at_least(&mut state, sc, want))
    }

    /// Hand back a list whose blocks the caller no longer needs and
    /// receive an empty replacement
    ///
    /// Every block in the returned groups must be free again; descriptors
    /// are restored to fully free as they rejoin a lane, which is how
    /// groups that left depleted through
    /// [`exchange_allocate`](GlobalPool::exchange_allocate) regain their
    /// blocks. Returned groups go straight into the available lane while the
    /// class's idle bytes sit below `always_reuse_limit`, otherwise into
    /// the reclaim lane. When aggregate idle memory exceeds
    /// `thread_cache_limit`, surplus fully-free groups are released back
    /// to the segment manager. Never contacts the segment manager for new
    /// memory, so it cannot fail.
    pub fn exchange_release(&self, sc: SizeClass, list: ChunkList) -> ChunkList {
        self.class_stats[sc.index()].record_exchange_release();
        let mut state = self.lock();

        if self.tunables.reuse_directly(state.class_idle_bytes(sc)) {
            self.merge_into_available(&mut state, sc, list);
        } else {
            self.merge_into_reclaim(&mut state, sc, list);
        }

        if self.tunables.should_release(state.total_idle_bytes()) {
            self.release_surplus(&mut state, sc);
        }
        self.empty_list(sc)
    }

    /// Allocate one group sized precisely to `bytes`, bypassing the lanes
    ///
    /// The cold path for irregular sizes. The caller's list must carry no
    /// groups; its nodes are recycled through the reservoir.
    pub fn allocate_exact(
        &self,
        bytes: usize,
        sc: SizeClass,
        list: ChunkList,
    ) -> PoolResult<ChunkList> {
        self.class_stats[sc.index()].record_exact_alloc();
        let mut state = self.lock();
        debug_assert!(list.is_empty(), "allocate_exact expects a group-free list");
        self.dissolve_into_reservoir(&mut state, sc, list);

        let region = self.segment.acquire_exact_group(sc, bytes)?;
        let handle = match self.reserve_node(&mut state) {
            Ok(handle) => handle,
            Err(err) => {
                self.segment.release_block_groups(vec![region]);
                return Err(err);
            }
        };
        let group = BlockGroup::exact(sc, region, bytes);
        state.arena.node_mut(handle).group = Some(group);

        Ok(ChunkList::detached(
            self.id,
            sc,
            Some(handle),
            1,
            group.free_blocks(),
            group.capacity(),
            group.bytes(),
        ))
    }

    /// Return memory obtained from the exact-size path straight to the
    /// segment manager
    ///
    /// Irregularly sized groups are poor recycling candidates, so they
    /// bypass the lanes on the way out just as they did on the way in.
    pub fn return_memory(&self, sc: SizeClass, list: ChunkList) -> ChunkList {
        self.class_stats[sc.index()].record_return();
        let mut state = self.lock();
        let parts = self.check_list(sc, list);

        let handles: Vec<NodeHandle> =
            state.arena.chain(parts.head).map(|(h, _)| h).collect();
        let mut regions = Vec::with_capacity(handles.len());
        for handle in handles {
            let node = state.arena.node_mut(handle);
            node.next = None;
            if let Some(group) = node.group.take() {
                regions.push(group.region());
            }
            state.arena.recycle(handle);
        }
        if !regions.is_empty() {
            self.global_stats.record_release(regions.len());
            tracing::debug!(%sc, groups = regions.len(), "returning exact groups");
            self.segment.release_block_groups(regions);
        }
        self.empty_list(sc)
    }

    /// Accumulated statistics, skipping classes that were never used
    ///
    /// Reads counters only: takes no lock and never perturbs pool state.
    /// Under concurrent mutation the numbers are best-effort, not a
    /// consistent snapshot.
    pub fn report(&self, level: usize) -> PoolReport {
        PoolReport::build(level, &self.class_stats, &self.global_stats)
    }

    /// Lane occupancy of one class; diagnostics only
    pub fn class_snapshot(&self, sc: SizeClass) -> ClassSnapshot {
        let state = self.lock();
        let pair = &state.lanes[sc.index()];
        ClassSnapshot {
            available_groups: pair.available.groups,
            available_blocks: pair.available.free_blocks,
            reclaim_groups: pair.reclaim.groups,
            reclaim_blocks: pair.reclaim.free_blocks,
            total_blocks: pair.available.total_blocks + pair.reclaim.total_blocks,
            idle_bytes: pair.available.bytes + pair.reclaim.bytes,
        }
    }

    // ----- internal, guard held -------------------------------------------

    fn empty_list(&self, sc: SizeClass) -> ChunkList {
        ChunkList::detached(self.id, sc, None, 0, 0, 0, 0)
    }

    fn check_list(&self, sc: SizeClass, list: ChunkList) -> crate::list::ListParts {
        let parts = list.into_raw();
        debug_assert_eq!(parts.pool_id, self.id, "chunk list from a different pool");
        debug_assert_eq!(parts.size_class, sc, "chunk list from a different size class");
        parts
    }

    /// Park a handed-back depleted list in the reclaim lane
    ///
    /// The caller declares every block consumed, so each descriptor is
    /// marked depleted before it enters the lane; consolidation skips such
    /// groups and cannot hand the same blocks out twice.
    fn park_depleted(&self, state: &mut PoolState, sc: SizeClass, list: ChunkList) {
        let parts = self.check_list(sc, list);
        let handles: Vec<NodeHandle> =
            state.arena.chain(parts.head).map(|(h, _)| h).collect();
        for handle in handles {
            if let Some(group) = state.arena.node_mut(handle).group.as_mut() {
                let outstanding = group.free_blocks();
                group.note_allocated(outstanding);
            }
            state.lanes[sc.index()].reclaim.push(&mut state.arena, handle);
        }
    }

    /// Merge a list of freed groups into the reclaim lane, restoring each
    /// descriptor to fully free
    fn merge_into_reclaim(&self, state: &mut PoolState, sc: SizeClass, list: ChunkList) {
        let parts = self.check_list(sc, list);
        let handles: Vec<NodeHandle> =
            state.arena.chain(parts.head).map(|(h, _)| h).collect();
        for handle in handles {
            if let Some(group) = state.arena.node_mut(handle).group.as_mut() {
                let capacity = group.capacity();
                group.note_freed(capacity);
            }
            state.lanes[sc.index()].reclaim.push(&mut state.arena, handle);
        }
    }

    /// Merge a list of freed groups into the available lane, restoring each
    /// descriptor to fully free
    fn merge_into_available(&self, state: &mut PoolState, sc: SizeClass, list: ChunkList) {
        let parts = self.check_list(sc, list);
        let handles: Vec<NodeHandle> =
            state.arena.chain(parts.head).map(|(h, _)| h).collect();
        for handle in handles {
            if let Some(group) = state.arena.node_mut(handle).group.as_mut() {
                let capacity = group.capacity();
                group.note_freed(capacity);
            }
            state.lanes[sc.index()].available.push(&mut state.arena, handle);
        }
    }

    /// Recycle a (group-free) list's nodes back into the reservoir
    fn dissolve_into_reservoir(&self, state: &mut PoolState, sc: SizeClass, list: ChunkList) {
        let parts = self.check_list(sc, list);
        let handles: Vec<NodeHandle> =
            state.arena.chain(parts.head).map(|(h, _)| h).collect();
        for handle in handles {
            let node = state.arena.node_mut(handle);
            node.next = None;
            if node.group.is_some() {
                // Contract violation tolerated in release builds: keep the
                // group reachable rather than stranding it.
                state.lanes[sc.index()].reclaim.push(&mut state.arena, handle);
            } else {
                state.arena.recycle(handle);
            }
        }
    }

    /// Grow the available lane until it holds `min_blocks` free blocks,
    /// consolidating from reclaim first and refilling from the segment
    /// manager last
    fn ensure_available(
        &self,
        state: &mut PoolState,
        sc: SizeClass,
        min_blocks: usize,
    ) -> PoolResult<()> {
        self.consolidate(state, sc, min_blocks);

        let have = state.lanes[sc.index()].available.free_blocks;
        if have >= min_blocks {
            return Ok(());
        }

        let per_group = blocks_per_group(sc);
        let needed_groups = (min_blocks - have).div_ceil(per_group);
        let padded = needed_groups.max(self.tunables.refill_groups);
        let handles = match self.get_chunks(state, sc, padded) {
            Ok(handles) => handles,
            // The padding is opportunistic; only the actual need decides
            // between success and exhaustion.
            Err(_) if padded > needed_groups => self.get_chunks(state, sc, needed_groups)?,
            Err(err) => return Err(err),
        };
        for handle in handles {
            state.lanes[sc.index()].available.push(&mut state.arena, handle);
        }
        Ok(())
    }

    /// Move reclaim-lane groups that still have free blocks into the
    /// available lane until `min_blocks` are covered or reclaim runs out
    fn consolidate(&self, state: &mut PoolState, sc: SizeClass, min_blocks: usize) {
        let index = sc.index();
        let mut parked = Vec::new();
        while state.lanes[index].available.free_blocks < min_blocks
            && !state.lanes[index].reclaim.is_empty()
        {
            let Some(handle) = state.lanes[index].reclaim.pop(&mut state.arena) else {
                break;
            };
            let has_free = state.arena.node(handle).group.is_some_and(|g| g.free_blocks() > 0);
            if has_free {
                state.lanes[index].available.push(&mut state.arena, handle);
            } else {
                // Depleted groups stay in reclaim; their blocks come back
                // through the free path, not from here.
                parked.push(handle);
            }
        }
        for handle in parked {
            state.lanes[index].reclaim.push(&mut state.arena, handle);
        }
    }

    /// Release fully-free idle groups back to the segment manager until
    /// aggregate idle memory is back under `thread_cache_limit`
    ///
    /// Reclaim lanes give up groups first; available lanes only if the
    /// total is still over the limit afterwards.
    fn release_surplus(&self, state: &mut PoolState, start: SizeClass) {
        let mut regions = Vec::new();
        if !self.drain_surplus(state, start, true, &mut regions) {
            self.drain_surplus(state, start, false, &mut regions);
        }

        if !regions.is_empty() {
            self.global_stats.record_release(regions.len());
            tracing::debug!(groups = regions.len(), "releasing surplus idle groups");
            self.segment.release_block_groups(regions);
        }
    }

    /// Pull fully-free groups out of one lane kind, class by class, until
    /// idle memory drops under the limit; returns true once it has
    fn drain_surplus(
        &self,
        state: &mut PoolState,
        start: SizeClass,
        reclaim: bool,
        regions: &mut Vec<SegmentRegion>,
    ) -> bool {
        let order = (0..NUM_SIZE_CLASSES)
            .cycle()
            .skip(start.index())
            .take(NUM_SIZE_CLASSES);
        for index in order {
            let mut kept = Vec::new();
            let mut kept_bytes = 0usize;
            let mut under = false;
            loop {
                // Popped-but-kept groups are still idle memory; count them
                // or the drain stops early with surplus left in later lanes.
                if !self.tunables.should_release(state.total_idle_bytes() + kept_bytes) {
                    under = true;
                    break;
                }
                let popped = if reclaim {
                    state.lanes[index].reclaim.pop(&mut state.arena)
                } else {
                    state.lanes[index].available.pop(&mut state.arena)
                };
                let Some(handle) = popped else {
                    break;
                };
                match state.arena.node(handle).group {
                    Some(group) if group.is_fully_free() => {
                        let node = state.arena.node_mut(handle);
                        node.next = None;
                        node.group = None;
                        regions.push(group.region());
                        state.arena.recycle(handle);
                    }
                    Some(group) => {
                        // Groups with live blocks cannot leave the pool.
                        kept_bytes += group.bytes();
                        kept.push(handle);
                    }
                    None => state.arena.recycle(handle),
                }
            }
            for handle in kept {
                if reclaim {
                    state.lanes[index].reclaim.push(&mut state.arena, handle);
                } else {
                    state.lanes[index].available.push(&mut state.arena, handle);
                }
            }
            if under {
                return true;
            }
        }
        false
    }

    /// Detach groups from the available lane until at least `min_blocks`
    /// free blocks are covered, and hand them out as one list
    fn detach_at_least(&self, state: &mut PoolState, sc: SizeClass, min_blocks: usize) -> ChunkList {
        let index = sc.index();
        let mut taken = Vec::new();
        let (mut free, mut total, mut bytes) = (0usize, 0usize, 0usize);
        while free < min_blocks {
            let Some(handle) = state.lanes[index].available.pop(&mut state.arena) else {
                break;
            };
            let Some(group) = state.arena.node(handle).group else {
                state.arena.recycle(handle);
                continue;
            };
            if group.free_blocks() == 0 {
                // A depleted group is useless to the allocation side.
                state.lanes[index].reclaim.push(&mut state.arena, handle);
                continue;
            }
            free += group.free_blocks();
            total += group.capacity();
            bytes += group.bytes();
            taken.push(handle);
        }

        // Relink the taken nodes into one detached chain.
        for pair in taken.windows(2) {
            state.arena.node_mut(pair[0]).next = Some(pair[1]);
        }
        if let Some(&last) = taken.last() {
            state.arena.node_mut(last).next = None;
        }
        ChunkList::detached(self.id, sc, taken.first().copied(), taken.len(), free, total, bytes)
    }

    /// Pull `count` block groups for `sc` from the segment manager and
    /// wrap them in reservoir nodes
    ///
    /// Asks the segment manager before touching any lane, so a refusal
    /// leaves the lanes exactly as they were.
    fn get_chunks(
        &self,
        state: &mut PoolState,
        sc: SizeClass,
        count: usize,
    ) -> PoolResult<Vec<NodeHandle>> {
        let regions = self.segment.acquire_block_groups(sc, count)?;

        while state.arena.spare_nodes() < regions.len() {
            if let Err(err) = self.allocate_chunk_list_nodes(state) {
                self.segment.release_block_groups(regions);
                return Err(err);
            }
        }

        self.class_stats[sc.index()].record_refill();
        self.global_stats.record_refill(regions.len());
        tracing::debug!(%sc, groups = regions.len(), "refilled from segment manager");

        let mut handles = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(handle) = state.arena.take_spare() else {
                // Reservoir was grown above; a dry take is unreachable.
                debug_assert!(false, "reservoir underflow after growth");
                break;
            };
            state.arena.node_mut(handle).group = Some(BlockGroup::standard(sc, region));
            handles.push(handle);
        }
        Ok(handles)
    }

    /// Take one spare node, growing the reservoir if it has run dry
    fn reserve_node(&self, state: &mut PoolState) -> PoolResult<NodeHandle> {
        loop {
            if let Some(handle) = state.arena.take_spare() {
                return Ok(handle);
            }
            self.allocate_chunk_list_nodes(state)?;
        }
    }

    /// Grow the chunk-pool reservoir by one node batch
    fn allocate_chunk_list_nodes(&self, state: &mut PoolState) -> PoolResult<()> {
        let granted = self.segment.acquire_list_nodes(self.tunables.node_batch)?;
        state.arena.grow(granted);
        self.global_stats.record_node_alloc(granted);
        tracing::trace!(nodes = granted, "grew chunk-list node reservoir");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::BumpSegment;

    fn pool() -> GlobalPool<BumpSegment> {
        GlobalPool::new(BumpSegment::unbounded(), PoolTunables::default())
    }

    #[test]
    fn lane_push_pop_keeps_aggregates() {
        let p = pool();
        let sc = SizeClass::from_size(64);
        let mut guard = p.state.lock();
        let state = &mut *guard;
        let handles = p.get_chunks(state, sc, 2).unwrap();
        let per_group = blocks_per_group(sc);

        assert!(state.lanes[sc.index()].available.is_empty());
        for handle in handles {
            state.lanes[sc.index()].available.push(&mut state.arena, handle);
        }
        assert_eq!(state.lanes[sc.index()].available.groups, 2);
        assert_eq!(state.lanes[sc.index()].available.free_blocks, 2 * per_group);

        state.lanes[sc.index()].available.pop(&mut state.arena).unwrap();
        assert_eq!(state.lanes[sc.index()].available.groups, 1);
        assert_eq!(state.lanes[sc.index()].available.free_blocks, per_group);
    }

    #[test]
    fn empty_list_has_pool_id() {
        let p = pool();
        let sc = SizeClass::from_size(64);
        let list = p.acquire_available(sc, 0).unwrap();
        assert!(list.is_empty());
        let parts = list.into_raw();
        assert_eq!(parts.pool_id, p.id);
    }

    #[test]
    fn pool_ids_are_distinct() {
        assert_ne!(pool().id, pool().id);
    }

    #[test]
    fn reservoir_grows_transparently() {
        let p = pool();
        let sc = SizeClass::from_size(64);
        let list = p.acquire_available(sc, 1).unwrap();
        assert!(!list.is_empty());
        // Growth happened behind the scenes and left spares behind.
        assert!(p.state.lock().arena.spare_nodes() > 0);
        p.exchange_release(sc, list);
    }
}
