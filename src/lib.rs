//! Size-classed global memory pool with batched chunk exchange
//!
//! This crate provides the global arbiter of a size-classed allocator:
//! the component that supplies and reclaims fixed-capacity groups of
//! same-sized blocks to and from many concurrent thread-local caches.
//!
//! - Allocation sizes are bucketed into a fixed set of size classes
//! - Chunk lists are the atomic unit of transfer, so locking happens once
//!   per batch rather than once per allocation
//! - Returned memory is recycled through per-class available/reclaim lanes
//!   under a tunable reuse-versus-release policy
//! - Oversized requests take an exact-size path that bypasses the lanes
//!
//! The underlying virtual-memory arena is abstracted behind the
//! [`SegmentManager`] trait; the pool moves opaque region tokens and never
//! interprets block contents.
//!
//! # Example
//!
//! ```
//! use classpool::{BumpSegment, GlobalPool, PoolTunables, SizeClass};
//!
//! let pool = GlobalPool::new(BumpSegment::unbounded(), PoolTunables::default());
//! let sc = SizeClass::from_size(64);
//!
//! // A thread-local cache pulls a batch of blocks in one round trip...
//! let list = pool.acquire_available(sc, 256)?;
//! assert!(list.free_blocks() >= 256);
//!
//! // ...and later hands it back the same way.
//! let replacement = pool.exchange_release(sc, list);
//! assert!(replacement.is_empty());
//! # Ok::<(), classpool::PoolError>(())
//! ```

#![warn(missing_docs)]

mod arena;
pub mod chunk;
pub mod config;
pub mod error;
pub mod list;
pub mod pool;
pub mod segment;
pub mod size_class;
pub mod stats;

pub use chunk::BlockGroup;
pub use config::PoolTunables;
pub use error::{PoolError, PoolResult};
pub use list::ChunkList;
pub use pool::{ClassSnapshot, GlobalPool};
pub use segment::{BumpSegment, SegmentManager, SegmentRegion};
pub use size_class::{SizeClass, NUM_SIZE_CLASSES};
pub use stats::{ClassStatsSnapshot, PoolReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
