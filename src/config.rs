//! Pool tunables and the reuse/release policy
//!
//! The two process-wide limits of the original design are plain fields
//! here, fixed at pool construction; pools never share tunables. The
//! reuse-versus-release trade-off is expressed as pure predicates so the
//! policy can be tested without a pool.

/// Tunables fixed for the lifetime of one pool
#[derive(Debug, Clone)]
pub struct PoolTunables {
    /// Per-class idle-byte ceiling under which returned groups go straight
    /// back into the available lane for quick reuse
    pub always_reuse_limit: usize,

    /// Aggregate idle-byte ceiling across all classes; surplus beyond it is
    /// released back to the segment manager
    pub thread_cache_limit: usize,

    /// Block groups pulled from the segment manager per refill
    pub refill_groups: usize,

    /// Chunk-list nodes acquired per reservoir growth
    pub node_batch: usize,
}

impl Default for PoolTunables {
    fn default() -> Self {
        Self {
            always_reuse_limit: 1024 * 1024,
            thread_cache_limit: 4 * 1024 * 1024,
            refill_groups: 4,
            node_batch: 64,
        }
    }
}

impl PoolTunables {
    /// Create tunables with the two limits of the original interface
    pub fn new(always_reuse_limit: usize, thread_cache_limit: usize) -> Self {
        Self {
            always_reuse_limit,
            thread_cache_limit,
            ..Default::default()
        }
    }

    /// Set the refill batch size
    pub fn with_refill_groups(mut self, groups: usize) -> Self {
        self.refill_groups = groups.max(1);
        self
    }

    /// Set the reservoir growth batch size
    pub fn with_node_batch(mut self, nodes: usize) -> Self {
        self.node_batch = nodes.max(1);
        self
    }

    /// Should a returned group go directly back into the available lane?
    ///
    /// True while the class's idle bytes sit below `always_reuse_limit`;
    /// beyond it, returns land in the reclaim lane and wait for the
    /// allocation path to consolidate them.
    pub fn reuse_directly(&self, class_idle_bytes: usize) -> bool {
        class_idle_bytes < self.always_reuse_limit
    }

    /// Should idle memory be released back to the segment manager?
    ///
    /// True once the aggregate idle bytes across every class exceed
    /// `thread_cache_limit`.
    pub fn should_release(&self, total_idle_bytes: usize) -> bool {
        total_idle_bytes > self.thread_cache_limit
    }
}
