//! Error types for pool operations

use crate::size_class::SizeClass;

/// Result type for pool operations
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Pool operation errors
///
/// Memory exhaustion is the only error a pool operation surfaces: it means
/// the segment manager refused to supply the memory the operation needed.
/// It is fatal to the triggering request and is never retried internally.
/// Everything else (caller re-using a transferred list, enabling thread
/// support twice) is a contract violation checked with debug assertions,
/// not a recoverable error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The segment manager could not supply the requested block groups
    #[error("segment manager exhausted: {requested} bytes for size class {size_class}")]
    Exhausted {
        /// Size class the request was made for
        size_class: SizeClass,
        /// Bytes the pool asked the segment manager for
        requested: usize,
    },

    /// The segment manager could not supply chunk-list nodes
    #[error("segment manager exhausted: {requested} chunk-list nodes")]
    NodesExhausted {
        /// Number of bookkeeping nodes requested
        requested: usize,
    },
}

impl PoolError {
    /// Create an exhaustion error for a block-group request
    pub fn exhausted(size_class: SizeClass, requested: usize) -> Self {
        Self::Exhausted {
            size_class,
            requested,
        }
    }

    /// Create an exhaustion error for a list-node request
    pub fn nodes_exhausted(requested: usize) -> Self {
        Self::NodesExhausted { requested }
    }

    /// True if the error reports segment-manager exhaustion of any kind
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::NodesExhausted { .. })
    }
}
