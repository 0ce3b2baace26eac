//! Component-matching families.
//!
//! A family keeps one view type's [`NodeCollection`] in sync with the world.
//! The engine forwards every entity and component change to every family;
//! each family decides membership from its view's required component set:
//! an entity is a member iff it holds a component for every required type.
//!
//! ## Removal during a frame
//!
//! When a member stops matching, its node leaves the collection immediately.
//! If an update pass is in progress, systems may still be walking the
//! collection, so the node is parked in the pool's cache with its slots intact
//! and the family marks itself for a flush. The engine calls
//! [`Family::update_complete`] once the pass ends, and the parked nodes are
//! cleared and returned to the free list then. Outside a pass the node is
//! released straight away.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use engine_component::{ComponentRef, ComponentStore, ComponentTypeId, Entity};
use tracing::{debug, warn};

use crate::collection::NodeCollection;
use crate::error::FamilyError;
use crate::node::{NodeDescriptor, NodeId, NodeState, NodeView};
use crate::pool::NodePool;

/// Read access to entities' components, as consumed by families.
pub trait ComponentSource {
    /// Whether `entity` currently holds a component under `type_id`.
    fn has_component(&self, entity: Entity, type_id: ComponentTypeId) -> bool;

    /// The component `entity` holds under `type_id`, if any.
    fn get_component(&self, entity: Entity, type_id: ComponentTypeId) -> Option<ComponentRef>;
}

impl ComponentSource for ComponentStore {
    fn has_component(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.has(entity, type_id)
    }

    fn get_component(&self, entity: Entity, type_id: ComponentTypeId) -> Option<ComponentRef> {
        self.get(entity, type_id)
    }
}

/// Whether an update pass is running.
pub trait FrameState {
    /// `true` between the start and end of an update pass.
    fn is_updating(&self) -> bool;
}

impl FrameState for bool {
    fn is_updating(&self) -> bool {
        *self
    }
}

/// The engine-facing side of a family, independent of its view type.
pub trait Family: Any {
    /// The live collection of matching nodes.
    fn nodes(&self) -> &NodeCollection;

    /// A new entity entered the world.
    fn entity_added(
        &mut self,
        entity: Entity,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError>;

    /// An entity left the world.
    fn entity_removed(&mut self, entity: Entity, frame: &dyn FrameState)
    -> Result<(), FamilyError>;

    /// `entity` gained a component under `type_id`.
    fn component_added(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError>;

    /// `entity` lost its component under `type_id`.
    fn component_removed(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        frame: &dyn FrameState,
    ) -> Result<(), FamilyError>;

    /// The component `entity` holds under `type_id` was replaced in place.
    fn component_replaced(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError>;

    /// The update pass ended. Returns the number of deferred nodes released.
    fn update_complete(&mut self) -> usize;

    /// Detach every node and empty the collection, ahead of discarding the
    /// family.
    fn clean_up(&mut self);

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Matches entities against a view's required component types and maintains
/// the resulting node collection.
pub struct ComponentMatchingFamily<V: NodeView> {
    descriptor: Rc<NodeDescriptor<V>>,
    nodes: NodeCollection,
    entities: HashMap<Entity, NodeId>,
    pool: NodePool<V>,
    flush_pending: bool,
}

impl<V: NodeView> ComponentMatchingFamily<V> {
    /// Build the family for `V`: derive its descriptor and start with an
    /// empty collection and pool.
    pub fn new() -> Result<Self, FamilyError> {
        Self::with_pool_capacity(0)
    }

    /// Like [`new`](Self::new), with `capacity` nodes pre-built in the pool.
    pub fn with_pool_capacity(capacity: usize) -> Result<Self, FamilyError> {
        let descriptor = Rc::new(V::descriptor()?);
        debug!(
            view = std::any::type_name::<V>(),
            slots = descriptor.len(),
            capacity,
            "family created"
        );
        Ok(Self {
            pool: NodePool::with_capacity(Rc::clone(&descriptor), capacity)?,
            descriptor,
            nodes: NodeCollection::new(),
            entities: HashMap::new(),
            flush_pending: false,
        })
    }

    /// The live collection of matching nodes.
    #[must_use]
    pub fn nodes(&self) -> &NodeCollection {
        &self.nodes
    }

    /// The view's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &NodeDescriptor<V> {
        &self.descriptor
    }

    /// The family's node pool.
    #[must_use]
    pub fn pool(&self) -> &NodePool<V> {
        &self.pool
    }

    /// The view data of a node created by this family.
    #[must_use]
    pub fn view(&self, id: NodeId) -> Option<&V> {
        self.pool.get(id).map(|n| n.view())
    }

    /// The entity a node represents. `None` once the node is released.
    #[must_use]
    pub fn entity_of(&self, id: NodeId) -> Option<Entity> {
        self.pool.get(id).and_then(|n| n.entity())
    }

    /// The node currently representing `entity`, if it matches.
    #[must_use]
    pub fn node_of(&self, entity: Entity) -> Option<NodeId> {
        self.entities.get(&entity).copied()
    }

    /// The lifecycle state of a node created by this family.
    #[must_use]
    pub fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.pool.state(id)
    }

    /// Number of entities currently matching.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether removals are waiting for the end of the frame.
    #[must_use]
    pub fn has_pending_release(&self) -> bool {
        self.flush_pending
    }

    /// Reorder the collection by comparing view data. Stable.
    pub fn sort_by(&self, mut compare: impl FnMut(&V, &V) -> Ordering) {
        self.nodes.sort_by(|a, b| match (self.view(a), self.view(b)) {
            (Some(a), Some(b)) => compare(a, b),
            _ => Ordering::Equal,
        });
    }

    fn add_if_match(
        &mut self,
        entity: Entity,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError> {
        if self.entities.contains_key(&entity)
            || !self
                .descriptor
                .matches(|t| components.has_component(entity, t))
        {
            return Ok(());
        }

        let id = self.pool.acquire()?;
        let node = self.pool.get_mut(id)?;
        node.entity = Some(entity);
        let bound = self
            .descriptor
            .bind_all(&mut node.view, |t| components.get_component(entity, t));
        if bound != self.descriptor.len() {
            warn!(%entity, bound, expected = self.descriptor.len(), "node slots partially bound");
        }

        self.entities.insert(entity, id);
        self.nodes.add(id)?;
        Ok(())
    }

    fn remove_if_tracked(
        &mut self,
        entity: Entity,
        frame: &dyn FrameState,
    ) -> Result<(), FamilyError> {
        let Some(id) = self.entities.remove(&entity) else {
            return Ok(());
        };
        // A collection listener may already have unlinked the node.
        if self.nodes.contains(id) {
            self.nodes.remove(id)?;
        }

        if frame.is_updating() {
            self.pool.cache(id)?;
            if !self.flush_pending {
                self.flush_pending = true;
                debug!(
                    view = std::any::type_name::<V>(),
                    node = %id,
                    "deferring node release to end of frame"
                );
            }
        } else {
            self.pool.release(id)?;
        }
        Ok(())
    }
}

impl<V: NodeView> Family for ComponentMatchingFamily<V> {
    fn nodes(&self) -> &NodeCollection {
        &self.nodes
    }

    fn entity_added(
        &mut self,
        entity: Entity,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError> {
        self.add_if_match(entity, components)
    }

    fn entity_removed(
        &mut self,
        entity: Entity,
        frame: &dyn FrameState,
    ) -> Result<(), FamilyError> {
        self.remove_if_tracked(entity, frame)
    }

    fn component_added(
        &mut self,
        entity: Entity,
        _type_id: ComponentTypeId,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError> {
        self.add_if_match(entity, components)
    }

    fn component_removed(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        frame: &dyn FrameState,
    ) -> Result<(), FamilyError> {
        if !self.descriptor.requires(type_id) {
            return Ok(());
        }
        self.remove_if_tracked(entity, frame)
    }

    fn component_replaced(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        components: &dyn ComponentSource,
    ) -> Result<(), FamilyError> {
        if !self.descriptor.requires(type_id) {
            return Ok(());
        }
        let Some(&id) = self.entities.get(&entity) else {
            return self.add_if_match(entity, components);
        };
        let component = components.get_component(entity, type_id);
        let node = self.pool.get_mut(id)?;
        if !self.descriptor.bind(&mut node.view, type_id, component.as_ref()) {
            warn!(
                %entity,
                %type_id,
                slot = self.descriptor.slot_name(type_id),
                "replacement component could not be bound"
            );
        }
        Ok(())
    }

    fn update_complete(&mut self) -> usize {
        if !self.flush_pending {
            return 0;
        }
        self.flush_pending = false;
        let released = self.pool.flush_cache();
        debug!(
            view = std::any::type_name::<V>(),
            released,
            "released deferred nodes"
        );
        released
    }

    fn clean_up(&mut self) {
        for id in self.nodes.iter() {
            if let Some(entity) = self.pool.get(id).and_then(|n| n.entity()) {
                self.entities.remove(&entity);
            }
        }
        self.nodes.remove_all();
        debug!(view = std::any::type_name::<V>(), "family cleaned up");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<V: NodeView> std::fmt::Debug for ComponentMatchingFamily<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentMatchingFamily")
            .field("view", &std::any::type_name::<V>())
            .field("descriptor", &self.descriptor)
            .field("nodes", &self.nodes)
            .field("flush_pending", &self.flush_pending)
            .finish()
    }
}
