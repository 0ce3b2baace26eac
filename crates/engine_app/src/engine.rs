//! The engine: entity storage plus the families that watch it.
//!
//! The [`Engine`] owns the [`ComponentStore`] and one family per view type
//! that has been asked for. Every entity and component change goes through
//! the engine, which forwards it to each family in creation order.
//!
//! Systems run inside [`Engine::update`]. While a pass is running, families
//! defer node release; when it ends the engine tells each family to flush and
//! then notifies its own `update_complete` listeners.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use engine_component::{Component, ComponentStore, Entity, Handle, StoreError};
use engine_family::{
    ComponentMatchingFamily, Family, FamilyError, NodeCollection, NodeView, Signal, SubscriptionId,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;

/// Errors produced by the engine and the tick loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Family(#[from] FamilyError),

    /// `update` was called from inside a running update pass.
    #[error("an update pass is already running")]
    AlreadyUpdating,

    /// The tick rate must be positive and finite.
    #[error("invalid tick rate: {0}")]
    InvalidTickRate(f64),
}

type UpdateListener = dyn Fn();

/// Entity storage and the families derived from it.
pub struct Engine {
    store: ComponentStore,
    families: Vec<Box<dyn Family>>,
    family_index: HashMap<TypeId, usize>,
    updating: bool,
    update_complete: Signal<UpdateListener>,
    node_pool_capacity: usize,
}

impl Engine {
    /// Create an empty engine with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Create an empty engine using the pool settings from `config`.
    #[must_use]
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            store: ComponentStore::new(),
            families: Vec::new(),
            family_index: HashMap::new(),
            updating: false,
            update_complete: Signal::new(),
            node_pool_capacity: config.node_pool_capacity,
        }
    }

    /// Read access to the component store.
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    /// Create an empty entity and offer it to every family.
    pub fn spawn(&mut self) -> Result<Entity, EngineError> {
        let entity = self.store.spawn();
        trace!(%entity, "entity spawned");
        self.fan_out(|family, store, _| family.entity_added(entity, store))?;
        Ok(entity)
    }

    /// Remove an entity. Families drop it first, then its components are
    /// discarded.
    ///
    /// The entity is gone even if a family reports an error; the first such
    /// error is returned afterwards.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), EngineError> {
        if !self.store.contains(entity) {
            return Err(StoreError::EntityNotFound(entity).into());
        }
        let notified = self.fan_out(|family, _, updating| family.entity_removed(entity, &updating));
        self.store.despawn(entity)?;
        trace!(%entity, updating = self.updating, "entity despawned");
        notified
    }

    /// Remove every entity, most recently created first.
    pub fn remove_all_entities(&mut self) -> Result<(), EngineError> {
        let entities: Vec<Entity> = self.store.entities().collect();
        for entity in entities.into_iter().rev() {
            self.despawn(entity)?;
        }
        Ok(())
    }

    /// Attach `value` to `entity`, replacing any component of the same type.
    ///
    /// Families see a fresh component as an addition and a replacement as an
    /// in-place rebind of the affected slot.
    pub fn add_component<C: Component>(
        &mut self,
        entity: Entity,
        value: C,
    ) -> Result<Handle<C>, EngineError> {
        let (handle, previous) = self.store.insert(entity, value)?;
        let type_id = C::component_type_id();
        let replaced = previous.is_some();
        self.fan_out(|family, store, _| {
            if replaced {
                family.component_replaced(entity, type_id, store)
            } else {
                family.component_added(entity, type_id, store)
            }
        })?;
        Ok(handle)
    }

    /// Detach the `C` component from `entity`, returning it if present.
    pub fn remove_component<C: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<Option<Handle<C>>, EngineError> {
        let type_id = C::component_type_id();
        let Some(removed) = self.store.remove(entity, type_id)? else {
            return Ok(None);
        };
        self.fan_out(|family, _, updating| family.component_removed(entity, type_id, &updating))?;
        Ok(C::downcast(&removed))
    }

    /// The `C` component of `entity`, if it has one.
    #[must_use]
    pub fn component<C: Component>(&self, entity: Entity) -> Option<Handle<C>> {
        self.store.get_typed::<C>(entity)
    }

    /// Whether `entity` has a `C` component.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.store.has(entity, C::component_type_id())
    }

    /// The live collection of nodes for view `V`.
    ///
    /// The first request for a view creates its family and matches it
    /// against every existing entity, in creation order.
    pub fn nodes<V: NodeView>(&mut self) -> Result<&NodeCollection, EngineError> {
        let index = match self.family_index.get(&TypeId::of::<V>()) {
            Some(&index) => index,
            None => self.create_family::<V>()?,
        };
        Ok(self.families[index].nodes())
    }

    /// Typed access to the family for view `V`, if one exists.
    #[must_use]
    pub fn family<V: NodeView>(&self) -> Option<&ComponentMatchingFamily<V>> {
        let &index = self.family_index.get(&TypeId::of::<V>())?;
        self.families[index].as_any().downcast_ref()
    }

    /// Discard the family for view `V`. Returns `false` if there was none.
    ///
    /// The family's collection is emptied first, so removal listeners see
    /// every node go.
    pub fn release_nodes<V: NodeView>(&mut self) -> bool {
        let Some(index) = self.family_index.remove(&TypeId::of::<V>()) else {
            return false;
        };
        let mut family = self.families.remove(index);
        family.clean_up();
        for slot in self.family_index.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        debug!(view = std::any::type_name::<V>(), "family released");
        true
    }

    /// Whether an update pass is running.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Run one update pass.
    ///
    /// Node removals made by `pass` are deferred; once it returns, each family
    /// releases its deferred nodes and the `update_complete` listeners run.
    pub fn update<R>(&mut self, pass: impl FnOnce(&mut Engine) -> R) -> Result<R, EngineError> {
        if self.updating {
            return Err(EngineError::AlreadyUpdating);
        }
        self.updating = true;
        let result = pass(self);
        self.updating = false;

        let released: usize = self
            .families
            .iter_mut()
            .map(|family| family.update_complete())
            .sum();
        if released > 0 {
            debug!(released, "frame end released deferred nodes");
        }
        for listener in self.update_complete.snapshot() {
            listener();
        }
        Ok(result)
    }

    /// Subscribe to the end of every update pass.
    pub fn on_update_complete(&self, listener: impl Fn() + 'static) -> SubscriptionId {
        self.update_complete.connect(Rc::new(listener))
    }

    /// Unsubscribe an `on_update_complete` listener.
    pub fn off_update_complete(&self, id: SubscriptionId) -> bool {
        self.update_complete.disconnect(id)
    }

    // Deliver a change to every family in creation order, then report the
    // first failure.
    fn fan_out(
        &mut self,
        mut deliver: impl FnMut(&mut Box<dyn Family>, &ComponentStore, bool) -> Result<(), FamilyError>,
    ) -> Result<(), EngineError> {
        let mut first_error = None;
        for family in &mut self.families {
            if let Err(err) = deliver(family, &self.store, self.updating) {
                warn!(%err, "family rejected a change");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }

    fn create_family<V: NodeView>(&mut self) -> Result<usize, EngineError> {
        let mut family = ComponentMatchingFamily::<V>::with_pool_capacity(self.node_pool_capacity)?;
        for entity in self.store.entities() {
            family.entity_added(entity, &self.store)?;
        }
        let index = self.families.len();
        info!(
            view = std::any::type_name::<V>(),
            matched = family.len(),
            "family registered"
        );
        self.families.push(Box::new(family));
        self.family_index.insert(TypeId::of::<V>(), index);
        Ok(index)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.store.len())
            .field("families", &self.families.len())
            .field("updating", &self.updating)
            .finish()
    }
}
