//! Per-entity component storage.
//!
//! The [`ComponentStore`] owns every live entity and, for each one, a map from
//! [`ComponentTypeId`] to the shared component stored under it. It raises no
//! notifications itself: whoever mutates it is responsible for telling the
//! families what changed.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::trace;

use crate::component::{Component, ComponentRef, ComponentTypeId, Handle};
use crate::entity::{Entity, EntityAllocator};

/// Errors raised by [`ComponentStore`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The entity was never spawned or has already been despawned.
    #[error("entity {0} not found")]
    EntityNotFound(Entity),
}

#[derive(Default)]
struct EntityData {
    components: HashMap<ComponentTypeId, ComponentRef>,
}

/// Entity allocation plus one component per type tag, per entity.
///
/// Entities iterate in creation order.
pub struct ComponentStore {
    allocator: EntityAllocator,
    entities: BTreeMap<Entity, EntityData>,
}

impl ComponentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            entities: BTreeMap::new(),
        }
    }

    // -- Entity lifecycle --

    /// Allocate a new entity with no components.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.entities.insert(entity, EntityData::default());
        trace!(%entity, "spawned entity");
        entity
    }

    /// Remove an entity and drop its references to all of its components.
    ///
    /// Returns the component types it held.
    pub fn despawn(&mut self, entity: Entity) -> Result<Vec<ComponentTypeId>, StoreError> {
        let data = self
            .entities
            .remove(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        trace!(%entity, components = data.components.len(), "despawned entity");
        Ok(data.components.into_keys().collect())
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    // -- Component operations --

    /// Store `value` on `entity`, returning the handle now stored and the
    /// component it replaced, if any.
    pub fn insert<C: Component>(
        &mut self,
        entity: Entity,
        value: C,
    ) -> Result<(Handle<C>, Option<ComponentRef>), StoreError> {
        let handle = value.into_handle();
        let previous = self.insert_handle(entity, handle.clone())?;
        Ok((handle, previous))
    }

    /// Store an existing handle on `entity`, returning the component it
    /// replaced, if any.
    pub fn insert_handle<C: Component>(
        &mut self,
        entity: Entity,
        handle: Handle<C>,
    ) -> Result<Option<ComponentRef>, StoreError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        let component: ComponentRef = handle;
        Ok(data.components.insert(C::component_type_id(), component))
    }

    /// Remove the component stored under `type_id`.
    ///
    /// Returns `Ok(None)` if the entity exists but holds no such component.
    pub fn remove(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<Option<ComponentRef>, StoreError> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        Ok(data.components.remove(&type_id))
    }

    /// Check if an entity holds a component under `type_id`.
    #[must_use]
    pub fn has(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|d| d.components.contains_key(&type_id))
    }

    /// Get a shared reference to the component stored under `type_id`.
    #[must_use]
    pub fn get(&self, entity: Entity, type_id: ComponentTypeId) -> Option<ComponentRef> {
        self.entities
            .get(&entity)
            .and_then(|d| d.components.get(&type_id))
            .cloned()
    }

    /// Get a typed handle to the `C` stored on `entity`.
    #[must_use]
    pub fn get_typed<C: Component>(&self, entity: Entity) -> Option<Handle<C>> {
        self.get(entity, C::component_type_id())
            .and_then(|c| C::downcast(&c))
    }

    /// Get all component types on an entity.
    pub fn component_types(&self, entity: Entity) -> Result<Vec<ComponentTypeId>, StoreError> {
        let data = self
            .entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        Ok(data.components.keys().copied().collect())
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStore")
            .field("entities", &self.entities.len())
            .field("allocated", &self.allocator.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32, i32);

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, PartialEq)]
    struct Name(&'static str);

    impl Component for Name {
        fn type_name() -> &'static str {
            "Name"
        }
    }

    #[test]
    fn test_spawn_and_despawn() {
        let mut store = ComponentStore::new();
        let e = store.spawn();
        assert!(store.contains(e));
        assert_eq!(store.len(), 1);

        store.insert(e, Position(1, 2)).unwrap();
        let removed = store.despawn(e).unwrap();
        assert_eq!(removed, vec![Position::component_type_id()]);
        assert!(store.is_empty());
        assert_eq!(store.despawn(e), Err(StoreError::EntityNotFound(e)));
    }

    #[test]
    fn test_insert_and_get_share_the_value() {
        let mut store = ComponentStore::new();
        let e = store.spawn();
        let (handle, previous) = store.insert(e, Position(1, 2)).unwrap();
        assert!(previous.is_none());

        let fetched = store.get_typed::<Position>(e).unwrap();
        assert!(Rc::ptr_eq(&handle, &fetched));
        assert!(store.has(e, Position::component_type_id()));
        assert!(!store.has(e, Name::component_type_id()));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut store = ComponentStore::new();
        let e = store.spawn();
        let (first, _) = store.insert(e, Position(1, 2)).unwrap();
        let (second, previous) = store.insert(e, Position(3, 4)).unwrap();

        let previous = Position::downcast(&previous.unwrap()).unwrap();
        assert!(Rc::ptr_eq(&previous, &first));
        assert_eq!(*store.get_typed::<Position>(e).unwrap().borrow(), Position(3, 4));
        assert!(!Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_remove_component() {
        let mut store = ComponentStore::new();
        let e = store.spawn();
        store.insert(e, Name("crate")).unwrap();

        assert!(store.remove(e, Name::component_type_id()).unwrap().is_some());
        assert!(store.remove(e, Name::component_type_id()).unwrap().is_none());
        assert!(store.component_types(e).unwrap().is_empty());
    }

    #[test]
    fn test_operations_on_missing_entity() {
        let mut store = ComponentStore::new();
        let ghost = Entity(99);
        assert!(store.insert(ghost, Name("ghost")).is_err());
        assert!(store.remove(ghost, Name::component_type_id()).is_err());
        assert!(store.get(ghost, Name::component_type_id()).is_none());
        assert!(!store.has(ghost, Name::component_type_id()));
    }

    #[test]
    fn test_entities_iterate_in_creation_order() {
        let mut store = ComponentStore::new();
        let a = store.spawn();
        let b = store.spawn();
        let c = store.spawn();
        store.despawn(b).unwrap();
        assert_eq!(store.entities().collect::<Vec<_>>(), vec![a, c]);
    }
}
