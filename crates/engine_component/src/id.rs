//! Identifier types and allocation.
//!
//! Entities, component instances, systems and families are all addressed by
//! lightweight `u64` handles. Handles are never reused within one allocator,
//! so a stale handle can only miss, never alias a newer object.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// The null / invalid sentinel.
            pub const INVALID: $name = $name(0);

            /// Create a handle from a raw `u64` identifier.
            #[must_use]
            pub const fn from_raw(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw `u64` identifier.
            #[must_use]
            pub const fn id(self) -> u64 {
                self.0
            }

            /// Returns `true` if this is a valid (non-zero) handle.
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// A node in the entity hierarchy.
    EntityId,
    "Entity"
);

define_id!(
    /// A component instance living in a world.
    ComponentId,
    "Component"
);

define_id!(
    /// A system registered with an engine.
    SystemId,
    "System"
);

define_id!(
    /// A family registered with an engine.
    FamilyId,
    "Family"
);

/// Allocates monotonically increasing ids.
#[derive(Debug)]
pub struct IdAllocator {
    next_id: u64,
}

impl IdAllocator {
    /// Creates a new allocator. Ids start at 1 (0 is reserved for `INVALID`).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh id.
    pub fn allocate<I: From<u64>>(&mut self) -> I {
        let id = self.next_id;
        self.next_id += 1;
        I::from(id)
    }

    /// Returns the number of ids allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let e = EntityId::from_raw(42);
        assert_eq!(e.id(), 42);
        assert!(e.is_valid());
        assert_eq!(e.to_string(), "Entity(42)");
    }

    #[test]
    fn test_id_invalid() {
        assert!(!EntityId::INVALID.is_valid());
        assert!(!SystemId::INVALID.is_valid());
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = IdAllocator::new();
        let e1: EntityId = alloc.allocate();
        let c1: ComponentId = alloc.allocate();
        let e2: EntityId = alloc.allocate();
        assert_eq!(e1.id(), 1);
        assert_eq!(c1.id(), 2);
        assert_eq!(e2.id(), 3);
        assert_eq!(alloc.count(), 3);
    }
}
