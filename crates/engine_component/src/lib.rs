//! # engine_component
//!
//! The "E" and "C" in ECS: what an entity is, how a component type is
//! identified, and where an entity's components live.
//!
//! This crate provides:
//!
//! - [`Component`]: the contract all ECS data must satisfy.
//! - [`ComponentTypeId`]: the tag a component is keyed by on its entity.
//! - [`ComponentRef`] / [`Handle`]: shared references to a stored component.
//! - [`Entity`]: lightweight `u64` entity identifiers.
//! - [`EntityAllocator`]: monotonically increasing ID allocator.
//! - [`ComponentStore`]: one component per type tag, per entity.

pub mod component;
pub mod entity;
pub mod store;

pub use component::{Component, ComponentRef, ComponentTypeId, Handle};
pub use entity::{Entity, EntityAllocator};
pub use store::{ComponentStore, StoreError};
