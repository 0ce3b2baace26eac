//! Error types for node collections, pools, and families.
//!
//! None of these are expected in normal operation. They flag programmer
//! errors such as removing a node from a collection it is not in, or
//! releasing a node twice.

use engine_component::ComponentTypeId;

use crate::node::{NodeId, NodeState};

/// Misuse of a [`NodeCollection`](crate::NodeCollection).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CollectionError {
    /// The node is not a member of this collection.
    #[error("{0} is not a member of this collection")]
    NotMember(NodeId),

    /// The node is already linked into this collection.
    #[error("{0} is already a member of this collection")]
    AlreadyMember(NodeId),
}

/// Misuse of a [`NodePool`](crate::NodePool).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    /// The id was never handed out by this pool.
    #[error("{0} does not belong to this pool")]
    UnknownNode(NodeId),

    /// The node is already on the free list.
    #[error("{0} was released twice")]
    DoubleRelease(NodeId),

    /// No node id is left to hand out.
    #[error("node pool exhausted after {limit} nodes")]
    Exhausted {
        /// The maximum number of nodes a pool can hold.
        limit: usize,
    },

    /// The requested transition is not valid from the node's current state.
    #[error("{node} cannot be cached while {state:?}")]
    InvalidTransition {
        /// The node being moved.
        node: NodeId,
        /// The state it was found in.
        state: NodeState,
    },
}

/// A node view declared the same component type for two slots.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    /// Two slots require the same component type.
    #[error("view `{view}` declares {type_id} for both `{first}` and `{second}`")]
    DuplicateComponent {
        /// The view type's name.
        view: &'static str,
        /// The duplicated component type.
        type_id: ComponentTypeId,
        /// The slot registered first.
        first: &'static str,
        /// The slot registered second.
        second: &'static str,
    },
}

/// Errors surfaced by a [`Family`](crate::Family).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FamilyError {
    /// The view's descriptor is malformed.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The family's collection rejected an operation.
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// The family's pool rejected an operation.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
