//! Family signatures.
//!
//! A [`Signature`] is the set of component type keys an entity must carry to
//! belong to a family. Two signatures built from the same keys are equal
//! regardless of insertion order, so they can key a family registry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// A sorted set of required component type keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    types: BTreeSet<ComponentTypeId>,
}

impl Signature {
    /// Create an empty signature. Every entity satisfies it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a signature from a statically known set of component types.
    #[must_use]
    pub fn of<S: ComponentSet>() -> Self {
        S::type_ids().into_iter().collect()
    }

    /// Add a required key.
    #[must_use]
    pub fn with(mut self, type_id: ComponentTypeId) -> Self {
        self.types.insert(type_id);
        self
    }

    /// Add a required component type.
    #[must_use]
    pub fn with_component<T: Component>(self) -> Self {
        self.with(T::component_type_id())
    }

    /// Returns `true` if `type_id` is required.
    #[must_use]
    pub fn requires(&self, type_id: ComponentTypeId) -> bool {
        self.types.contains(&type_id)
    }

    /// Returns `true` if `has` reports every required key present.
    pub fn is_satisfied_by(&self, mut has: impl FnMut(ComponentTypeId) -> bool) -> bool {
        self.types.iter().all(|&type_id| has(type_id))
    }

    /// Iterate the required keys in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.types.iter().copied()
    }

    /// Returns the number of required keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no key is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// A statically known group of component types, implemented for tuples.
pub trait ComponentSet {
    /// The type keys of every member.
    fn type_ids() -> Vec<ComponentTypeId>;
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn type_ids() -> Vec<ComponentTypeId> {
                vec![$($name::component_type_id()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
