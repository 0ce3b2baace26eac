//! Per-view node recycling.
//!
//! A [`NodePool`] owns every node instance of one view type. Instances are
//! never deallocated while the pool lives: released nodes go on a free list
//! and are handed out again by [`NodePool::acquire`]. Nodes removed while a
//! frame is running are parked with [`NodePool::cache`] instead, so systems
//! still walking the frame's collection see intact data until
//! [`NodePool::flush_cache`] runs at the frame boundary.

use std::rc::Rc;

use engine_component::Entity;
use tracing::trace;

use crate::error::PoolError;
use crate::node::{NodeDescriptor, NodeId, NodeState, NodeView};

/// One node instance together with its pool bookkeeping.
#[derive(Debug)]
pub struct PooledNode<V> {
    pub(crate) entity: Option<Entity>,
    pub(crate) view: V,
    pub(crate) state: NodeState,
}

impl<V> PooledNode<V> {
    /// The entity this node represents. `None` once released.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        self.entity
    }

    /// The node's view data.
    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    /// The node's lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }
}

/// Free list and deferred-release cache for one view type.
#[derive(Debug)]
pub struct NodePool<V> {
    descriptor: Rc<NodeDescriptor<V>>,
    nodes: Vec<PooledNode<V>>,
    free: Vec<NodeId>,
    pending: Vec<NodeId>,
    limit: usize,
}

// Node ids are `u32`; `u32::MAX` itself is never handed out.
const MAX_NODES: usize = u32::MAX as usize;

impl<V: NodeView> NodePool<V> {
    /// Create an empty pool that clears nodes through `descriptor`.
    #[must_use]
    pub fn new(descriptor: Rc<NodeDescriptor<V>>) -> Self {
        Self {
            descriptor,
            nodes: Vec::new(),
            free: Vec::new(),
            pending: Vec::new(),
            limit: MAX_NODES,
        }
    }

    /// Create a pool with `capacity` nodes already on the free list.
    pub fn with_capacity(
        descriptor: Rc<NodeDescriptor<V>>,
        capacity: usize,
    ) -> Result<Self, PoolError> {
        let mut pool = Self::new(descriptor);
        if capacity > pool.limit {
            return Err(PoolError::Exhausted { limit: pool.limit });
        }
        pool.nodes.reserve(capacity);
        pool.free.reserve(capacity);
        for _ in 0..capacity {
            let id = pool.allocate(NodeState::Free)?;
            pool.free.push(id);
        }
        // Popping from the back should hand out the lowest ids first.
        pool.free.reverse();
        Ok(pool)
    }

    /// Take a node off the free list, or construct a fresh one if the list is
    /// empty. The node comes back [`NodeState::Active`] with empty slots.
    ///
    /// Fails only when every id a [`NodeId`] can hold is already in use.
    pub fn acquire(&mut self) -> Result<NodeId, PoolError> {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()].state = NodeState::Active;
                trace!(node = %id, "node recycled");
                Ok(id)
            }
            None => {
                let id = self.allocate(NodeState::Active)?;
                trace!(node = %id, allocated = self.nodes.len(), "node allocated");
                Ok(id)
            }
        }
    }

    /// Clear the node's slots and entity, then put it on the free list.
    ///
    /// A node that is already free is rejected.
    pub fn release(&mut self, id: NodeId) -> Result<(), PoolError> {
        let node = self.nodes.get_mut(id.index()).ok_or(PoolError::UnknownNode(id))?;
        match node.state {
            NodeState::Free => return Err(PoolError::DoubleRelease(id)),
            NodeState::PendingRelease => self.pending.retain(|p| *p != id),
            NodeState::Active => {}
        }
        let node = &mut self.nodes[id.index()];
        self.descriptor.clear(&mut node.view);
        node.entity = None;
        node.state = NodeState::Free;
        self.free.push(id);
        trace!(node = %id, "node released");
        Ok(())
    }

    /// Park an active node until the next [`flush_cache`](Self::flush_cache),
    /// leaving its slots populated.
    pub fn cache(&mut self, id: NodeId) -> Result<(), PoolError> {
        let node = self.nodes.get_mut(id.index()).ok_or(PoolError::UnknownNode(id))?;
        if node.state != NodeState::Active {
            return Err(PoolError::InvalidTransition {
                node: id,
                state: node.state,
            });
        }
        node.state = NodeState::PendingRelease;
        self.pending.push(id);
        trace!(node = %id, pending = self.pending.len(), "node cached");
        Ok(())
    }

    /// Clear every cached node and move it to the free list. Returns how many
    /// nodes were released.
    pub fn flush_cache(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for id in pending {
            let node = &mut self.nodes[id.index()];
            self.descriptor.clear(&mut node.view);
            node.entity = None;
            node.state = NodeState::Free;
            self.free.push(id);
        }
        if count > 0 {
            trace!(released = count, "node cache flushed");
        }
        count
    }

    /// Look up a node instance.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&PooledNode<V>> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut PooledNode<V>, PoolError> {
        self.nodes.get_mut(id.index()).ok_or(PoolError::UnknownNode(id))
    }

    /// The lifecycle state of a node, if the pool created it.
    #[must_use]
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.get(id).map(PooledNode::state)
    }

    /// Total number of node instances ever constructed by this pool.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes on the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of nodes waiting for the next flush.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The descriptor this pool clears nodes with.
    #[must_use]
    pub fn descriptor(&self) -> &Rc<NodeDescriptor<V>> {
        &self.descriptor
    }

    fn allocate(&mut self, state: NodeState) -> Result<NodeId, PoolError> {
        let exhausted = PoolError::Exhausted { limit: self.limit };
        if self.nodes.len() >= self.limit {
            return Err(exhausted);
        }
        let index = u32::try_from(self.nodes.len()).map_err(|_| exhausted)?;
        let id = NodeId::new(index);
        self.nodes.push(PooledNode {
            entity: None,
            view: V::default(),
            state,
        });
        Ok(id)
    }
}
