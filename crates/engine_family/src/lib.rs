//! # engine_family
//!
//! Keeps, for every declared node view, the live set of entities whose
//! components satisfy that view.
//!
//! This crate provides:
//!
//! - [`NodeView`] / [`NodeDescriptor`]: a view type and its table of
//!   required component slots, declared at registration time.
//! - [`NodeCollection`]: an ordered doubly linked sequence of nodes that
//!   stays walkable while it is being mutated.
//! - [`NodePool`]: per-view recycling of node instances, with a deferred
//!   release cache for removals that happen mid-frame.
//! - [`ComponentMatchingFamily`]: the matcher that keeps a view's collection
//!   in sync with entity and component changes.
//! - [`Signal`]: registration-ordered listener lists.
//!
//! Everything here is single-threaded: all mutation happens on the thread
//! driving the frame loop, and listeners run synchronously before the call
//! that triggered them returns.

pub mod collection;
pub mod error;
pub mod family;
pub mod node;
pub mod pool;
pub mod signal;

pub use collection::{NodeCollection, NodeCursor, NodeIter, NodeListener};
pub use error::{CollectionError, DescriptorError, FamilyError, PoolError};
pub use family::{ComponentMatchingFamily, ComponentSource, Family, FrameState};
pub use node::{NodeDescriptor, NodeId, NodeState, NodeView};
pub use pool::{NodePool, PooledNode};
pub use signal::{Signal, SubscriptionId};
