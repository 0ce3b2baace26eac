//! Node identity, node lifecycle states, and node view descriptors.
//!
//! A node view is a plain struct with one slot per required component. The
//! view type declares its slots once through [`NodeView::describe`], and the
//! resulting [`NodeDescriptor`] is the table the family matches entities
//! against and binds components through.
//!
//! ```rust
//! use engine_component::{Component, Handle};
//! use engine_family::{NodeDescriptor, NodeView};
//!
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {
//!     fn type_name() -> &'static str { "Position" }
//! }
//!
//! #[derive(Default)]
//! struct RenderNode {
//!     position: Option<Handle<Position>>,
//! }
//!
//! impl NodeView for RenderNode {
//!     fn describe(slots: &mut NodeDescriptor<Self>) {
//!         slots.slot("position", |node: &mut Self, c| node.position = c);
//!     }
//! }
//! ```

use std::collections::HashMap;

use engine_component::{Component, ComponentRef, ComponentTypeId, Handle};

use crate::error::DescriptorError;

/// Identifies a node instance within the pool that created it.
///
/// Ids are dense indices. A released id is handed out again by the same pool,
/// which is what makes recycling observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw index of this node.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Where a node instance is in its lifecycle.
///
/// ```text
///            acquire                cache
///   Free ───────────────▶ Active ───────────▶ PendingRelease
///    ▲                      │                      │
///    └──────── release ─────┘◀──── flush_cache ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// On the pool's free list. Slots and entity are cleared.
    Free,
    /// Representing a matching entity.
    Active,
    /// Removed from its collection mid-frame. Slots stay populated until the
    /// frame ends.
    PendingRelease,
}

/// A typed projection of an entity's components.
///
/// Implementors are plain structs whose slots are `Option<Handle<C>>` fields.
/// The default value must have every slot empty.
pub trait NodeView: Default + 'static {
    /// Register one slot per required component type.
    fn describe(slots: &mut NodeDescriptor<Self>);

    /// Build and validate this view's descriptor.
    fn descriptor() -> Result<NodeDescriptor<Self>, DescriptorError> {
        let mut descriptor = NodeDescriptor::new();
        Self::describe(&mut descriptor);
        descriptor.validate()?;
        Ok(descriptor)
    }
}

type Binder<V> = Box<dyn Fn(&mut V, Option<&ComponentRef>) -> bool>;

struct Slot<V> {
    name: &'static str,
    type_id: ComponentTypeId,
    bind: Binder<V>,
}

/// The per-view table mapping each required component type to a slot.
pub struct NodeDescriptor<V> {
    slots: Vec<Slot<V>>,
    by_type: HashMap<ComponentTypeId, usize>,
    duplicate: Option<DescriptorError>,
}

impl<V: 'static> NodeDescriptor<V> {
    /// Create an empty descriptor. An empty descriptor matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            by_type: HashMap::new(),
            duplicate: None,
        }
    }

    /// Declare a slot holding a `C`.
    ///
    /// `set` stores `Some(handle)` when the slot is bound and `None` when it is
    /// cleared.
    pub fn slot<C: Component>(
        &mut self,
        name: &'static str,
        set: fn(&mut V, Option<Handle<C>>),
    ) -> &mut Self {
        let type_id = C::component_type_id();
        if let Some(&existing) = self.by_type.get(&type_id) {
            if self.duplicate.is_none() {
                self.duplicate = Some(DescriptorError::DuplicateComponent {
                    view: std::any::type_name::<V>(),
                    type_id,
                    first: self.slots[existing].name,
                    second: name,
                });
            }
            return self;
        }

        let bind: Binder<V> = Box::new(move |view, component| match component {
            Some(component) => {
                let handle = C::downcast(component);
                let bound = handle.is_some();
                set(view, handle);
                bound
            }
            None => {
                set(view, None);
                true
            }
        });

        self.by_type.insert(type_id, self.slots.len());
        self.slots.push(Slot {
            name,
            type_id,
            bind,
        });
        self
    }

    /// Fails if any component type was declared twice.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        match &self.duplicate {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// The required component types, in declaration order.
    pub fn required_types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.slots.iter().map(|s| s.type_id)
    }

    /// Whether `type_id` is one of the required component types.
    #[must_use]
    pub fn requires(&self, type_id: ComponentTypeId) -> bool {
        self.by_type.contains_key(&type_id)
    }

    /// The slot name bound to `type_id`, if it is required.
    #[must_use]
    pub fn slot_name(&self, type_id: ComponentTypeId) -> Option<&'static str> {
        self.by_type.get(&type_id).map(|&i| self.slots[i].name)
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the view requires nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// An entity matches iff `has` holds for every required type.
    pub fn matches(&self, mut has: impl FnMut(ComponentTypeId) -> bool) -> bool {
        self.slots.iter().all(|s| has(s.type_id))
    }

    /// Bind (or with `None`, clear) the slot for `type_id`.
    ///
    /// Returns `false` if the type is not required or the component is not of
    /// the slot's type.
    pub fn bind(
        &self,
        view: &mut V,
        type_id: ComponentTypeId,
        component: Option<&ComponentRef>,
    ) -> bool {
        match self.by_type.get(&type_id) {
            Some(&i) => (self.slots[i].bind)(view, component),
            None => false,
        }
    }

    /// Bind every slot from `fetch`. Returns the number of slots bound.
    pub fn bind_all(
        &self,
        view: &mut V,
        mut fetch: impl FnMut(ComponentTypeId) -> Option<ComponentRef>,
    ) -> usize {
        let mut bound = 0;
        for slot in &self.slots {
            if let Some(component) = fetch(slot.type_id)
                && (slot.bind)(view, Some(&component))
            {
                bound += 1;
            }
        }
        bound
    }

    /// Clear every slot.
    pub fn clear(&self, view: &mut V) {
        for slot in &self.slots {
            (slot.bind)(view, None);
        }
    }
}

impl<V: 'static> Default for NodeDescriptor<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for NodeDescriptor<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|s| (s.name, s.type_id)))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! View and component types shared by this crate's tests.

    use engine_component::{Component, Handle};

    use super::{NodeDescriptor, NodeView};

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Point {
        pub x: i32,
        pub y: i32,
    }

    impl Component for Point {
        fn type_name() -> &'static str {
            "Point"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Matrix {
        pub scale: f32,
    }

    impl Component for Matrix {
        fn type_name() -> &'static str {
            "Matrix"
        }
    }

    #[derive(Default)]
    pub struct PointNode {
        pub point: Option<Handle<Point>>,
    }

    impl NodeView for PointNode {
        fn describe(slots: &mut NodeDescriptor<Self>) {
            slots.slot("point", |node: &mut Self, c| node.point = c);
        }
    }

    #[derive(Default)]
    pub struct PointMatrixNode {
        pub point: Option<Handle<Point>>,
        pub matrix: Option<Handle<Matrix>>,
    }

    impl NodeView for PointMatrixNode {
        fn describe(slots: &mut NodeDescriptor<Self>) {
            slots
                .slot("point", |node: &mut Self, c| node.point = c)
                .slot("matrix", |node: &mut Self, c| node.matrix = c);
        }
    }

    #[derive(Default)]
    pub struct EmptyNode;

    impl NodeView for EmptyNode {
        fn describe(_slots: &mut NodeDescriptor<Self>) {}
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use engine_component::{Component, ComponentRef};

    use super::fixtures::{Matrix, Point, PointMatrixNode, PointNode};
    use super::*;

    #[derive(Default)]
    struct TwoPoints {
        a: Option<Handle<Point>>,
        b: Option<Handle<Point>>,
    }

    impl NodeView for TwoPoints {
        fn describe(slots: &mut NodeDescriptor<Self>) {
            slots
                .slot("a", |node: &mut Self, c| node.a = c)
                .slot("b", |node: &mut Self, c| node.b = c);
        }
    }

    #[test]
    fn test_descriptor_lists_required_types_in_order() {
        let descriptor = PointMatrixNode::descriptor().unwrap();
        let types: Vec<_> = descriptor.required_types().collect();
        assert_eq!(types, vec![Point::component_type_id(), Matrix::component_type_id()]);
        assert_eq!(descriptor.slot_name(Matrix::component_type_id()), Some("matrix"));
    }

    #[test]
    fn test_duplicate_component_is_rejected() {
        let err = TwoPoints::descriptor().unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::DuplicateComponent { first: "a", second: "b", .. }
        ));
    }

    #[test]
    fn test_matches_is_a_conjunction() {
        let descriptor = PointMatrixNode::descriptor().unwrap();
        let point = Point::component_type_id();
        assert!(descriptor.matches(|_| true));
        assert!(!descriptor.matches(|t| t == point));
        assert!(!descriptor.matches(|_| false));
    }

    #[test]
    fn test_empty_descriptor_matches_everything() {
        let descriptor = NodeDescriptor::<PointNode>::new();
        assert!(descriptor.is_empty());
        assert!(descriptor.matches(|_| false));
    }

    #[test]
    fn test_bind_and_clear() {
        let descriptor = PointNode::descriptor().unwrap();
        let handle = Point { x: 1, y: 2 }.into_handle();
        let component: ComponentRef = handle.clone();

        let mut view = PointNode::default();
        assert!(descriptor.bind(&mut view, Point::component_type_id(), Some(&component)));
        assert!(Rc::ptr_eq(view.point.as_ref().unwrap(), &handle));

        descriptor.clear(&mut view);
        assert!(view.point.is_none());
    }

    #[test]
    fn test_bind_rejects_unrequired_and_mistyped() {
        let descriptor = PointNode::descriptor().unwrap();
        let matrix: ComponentRef = Matrix { scale: 2.0 }.into_handle();
        let mut view = PointNode::default();

        assert!(!descriptor.bind(&mut view, Matrix::component_type_id(), Some(&matrix)));
        assert!(!descriptor.bind(&mut view, Point::component_type_id(), Some(&matrix)));
        assert!(view.point.is_none());
    }

    #[test]
    fn test_bind_all_counts_bound_slots() {
        let descriptor = PointMatrixNode::descriptor().unwrap();
        let point: ComponentRef = Point::default().into_handle();
        let mut view = PointMatrixNode::default();

        let bound = descriptor.bind_all(&mut view, |t| {
            (t == Point::component_type_id()).then(|| point.clone())
        });
        assert_eq!(bound, 1);
        assert!(view.point.is_some());
        assert!(view.matrix.is_none());
    }
}
