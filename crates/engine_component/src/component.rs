//! Core [`Component`] trait and component identity.
//!
//! Every piece of data attached to an entity implements [`Component`]. An
//! entity holds at most one component per [`ComponentTypeId`].
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm, so the same name always produces the same
//! tag regardless of build or process.
//!
//! ## Sharing
//!
//! Stored components are shared, not copied: the store keeps a
//! [`ComponentRef`] and node views hold typed [`Handle`]s to the same value.
//! Everything runs on the thread driving the frame loop, so sharing is `Rc`
//! based.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentTypeId({:#018x})", self.0)
    }
}

/// A type-erased shared reference to a stored component.
///
/// The concrete value behind it is always a `RefCell<T>` for the component
/// type `T` the reference was created from.
pub type ComponentRef = Rc<dyn Any>;

/// A typed shared reference to a stored component.
pub type Handle<T> = Rc<RefCell<T>>;

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    ///
    /// The default implementation hashes [`Component::type_name()`] with
    /// FNV-1a 64-bit.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Wrap a value into a fresh shared [`Handle`].
    fn into_handle(self) -> Handle<Self>
    where
        Self: Sized,
    {
        Rc::new(RefCell::new(self))
    }

    /// Recover a typed [`Handle`] from a type-erased [`ComponentRef`].
    ///
    /// Returns `None` if the reference does not hold a `Self`.
    fn downcast(component: &ComponentRef) -> Option<Handle<Self>>
    where
        Self: Sized,
    {
        Rc::clone(component).downcast::<RefCell<Self>>().ok()
    }
}
