//! Handle-indexed arena of chunk-list nodes
//!
//! All chunk-list linkage lives in one slab owned by the pool. Nodes refer
//! to each other by [`NodeHandle`] index, never by reference, so lists can
//! be spliced and handed across the pool boundary in O(1) without pointer
//! lifetime hazards. Spare nodes are kept on an intrusive free list (the
//! chunk-pool reservoir) threaded through the same `next` links.

use crate::chunk::BlockGroup;

/// Index of a node in the arena
///
/// Opaque outside the crate; a `ChunkList` carries the handle of its head
/// node as its ownership token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeHandle(u32);

impl NodeHandle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One chunk-list node: a link plus an optional group payload
///
/// Nodes on the reservoir carry no payload.
#[derive(Debug)]
pub(crate) struct ChunkNode {
    pub(crate) next: Option<NodeHandle>,
    pub(crate) group: Option<BlockGroup>,
}

/// Slab of chunk-list nodes plus the spare-node reservoir
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    slots: Vec<ChunkNode>,
    reservoir: Option<NodeHandle>,
    spares: usize,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of spare nodes sitting on the reservoir
    pub(crate) fn spare_nodes(&self) -> usize {
        self.spares
    }

    /// Total nodes the arena has ever created
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Grow the slab by `count` fresh nodes, all placed on the reservoir
    ///
    /// Called only after the segment manager granted the node memory.
    pub(crate) fn grow(&mut self, count: usize) {
        self.slots.reserve(count);
        for _ in 0..count {
            let handle = NodeHandle(self.slots.len() as u32);
            self.slots.push(ChunkNode {
                next: self.reservoir,
                group: None,
            });
            self.reservoir = Some(handle);
        }
        self.spares += count;
    }

    /// Pop one spare node off the reservoir
    pub(crate) fn take_spare(&mut self) -> Option<NodeHandle> {
        let handle = self.reservoir?;
        let node = &mut self.slots[handle.index()];
        self.reservoir = node.next.take();
        debug_assert!(node.group.is_none());
        self.spares -= 1;
        Some(handle)
    }

    /// Return a node to the reservoir
    ///
    /// The node must already have had its payload taken.
    pub(crate) fn recycle(&mut self, handle: NodeHandle) {
        let node = &mut self.slots[handle.index()];
        debug_assert!(node.group.is_none());
        node.next = self.reservoir;
        self.reservoir = Some(handle);
        self.spares += 1;
    }

    pub(crate) fn node(&self, handle: NodeHandle) -> &ChunkNode {
        &self.slots[handle.index()]
    }

    pub(crate) fn node_mut(&mut self, handle: NodeHandle) -> &mut ChunkNode {
        &mut self.slots[handle.index()]
    }

    /// Iterate the handles of a chain starting at `head`
    pub(crate) fn chain(&self, head: Option<NodeHandle>) -> ChainIter<'_> {
        ChainIter { arena: self, next: head }
    }
}

/// Iterator over a linked chain of nodes
pub(crate) struct ChainIter<'a> {
    arena: &'a NodeArena,
    next: Option<NodeHandle>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (NodeHandle, &'a ChunkNode);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.next?;
        let node = self.arena.node(handle);
        self.next = node.next;
        Some((handle, node))
    }
}
