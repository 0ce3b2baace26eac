//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data.
//! Its components live in a [`ComponentStore`](crate::ComponentStore).

/// A unique entity identifier.
///
/// Entities are pure identifiers. Components attached to them give them
/// meaning, and node views project those components for systems.
///
/// IDs are handed out in increasing order, so ordering entities by ID is
/// ordering them by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub u64);

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// Destroyed IDs are never handed out again, which keeps stale references in
/// deferred node releases from aliasing a newer entity.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&mut self) -> Entity {
        let id = self.next_id;
        self.next_id += 1;
        Entity(id)
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_increasing_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert!(e1 < e2 && e2 < e3);
        assert_eq!(e1, Entity(1));
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_entity_display() {
        assert_eq!(Entity(9).to_string(), "Entity(9)");
    }
}
