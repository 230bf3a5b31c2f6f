//! Core [`Component`] trait and its type-erased form.
//!
//! Every piece of data attached to an entity implements [`Component`]. The
//! runtime stores components behind [`AnyComponent`], which exposes the
//! concrete type identity, a JSON encoding, and the disposal hook without
//! knowing the concrete type.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is derived from a component's **string name** using
//! the FNV-1a 64-bit hash algorithm. The same id doubles as the key under
//! which a component is registered on an entity: a component can sit under
//! its own concrete id or under a capability id built from any other name
//! (see [`ComponentTypeId::from_name`]).

use std::any::Any;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A unique identifier for a component type or capability key, derived from
/// its string name using the FNV-1a 64-bit hash algorithm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a name.
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
        Self::from_name(T::type_name())
    }
}

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentType({:#018x})", self.0)
    }
}

/// Construction-time ownership settings of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComponentOptions {
    /// Whether the component may be attached to more than one entity at once.
    /// Fixed for the lifetime of the instance.
    pub shareable: bool,
    /// Whether the component is torn down when its last manager is removed.
    pub auto_dispose: bool,
}

impl ComponentOptions {
    /// Exclusive, auto-disposing. The default for most components.
    pub const EXCLUSIVE: Self = Self {
        shareable: false,
        auto_dispose: true,
    };

    /// Shareable, auto-disposing.
    pub const SHAREABLE: Self = Self {
        shareable: true,
        auto_dispose: true,
    };

    /// Return a copy with `auto_dispose` replaced.
    #[must_use]
    pub const fn with_auto_dispose(mut self, auto_dispose: bool) -> Self {
        self.auto_dispose = auto_dispose;
        self
    }
}

impl Default for ComponentOptions {
    fn default() -> Self {
        Self::EXCLUSIVE
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use serde::{Serialize, Deserialize};
/// use engine_component::Component;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Serialize + DeserializeOwned + 'static {
    /// A stable, human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Called once when the runtime tears the instance down.
    fn on_dispose(&mut self) {}
}

/// Object-safe view of a [`Component`], implemented for every component.
pub trait AnyComponent: Any {
    /// The concrete type's [`ComponentTypeId`].
    fn concrete_type(&self) -> ComponentTypeId;

    /// The concrete type's name.
    fn concrete_name(&self) -> &'static str;

    /// Encode the component's data.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the component cannot be encoded.
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Run the component's disposal hook.
    fn dispose(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyComponent for T {
    fn concrete_type(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn concrete_name(&self) -> &'static str {
        T::type_name()
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn dispose(&mut self) {
        self.on_dispose();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn AnyComponent {
    /// Downcast to a concrete component type.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast mutably to a concrete component type.
    #[must_use]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl std::fmt::Debug for dyn AnyComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyComponent")
            .field("type", &self.concrete_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        assert_eq!(Health::component_type_id(), ComponentTypeId::from_name("Health"));
        assert_eq!(ComponentTypeId::of::<Health>(), ComponentTypeId::from_name("Health"));
    }

    #[test]
    fn test_component_type_id_differs_between_names() {
        assert_ne!(
            ComponentTypeId::from_name("Health"),
            ComponentTypeId::from_name("Velocity")
        );
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
        // FNV-1a 64-bit of "a".
        assert_eq!(
            ComponentTypeId::from_name("a"),
            ComponentTypeId(0xaf63_dc4c_8601_ec8c)
        );
    }

    #[test]
    fn test_erased_component_reports_concrete_type() {
        let health: Box<dyn AnyComponent> = Box::new(Health {
            current: 5.0,
            max: 10.0,
        });
        assert_eq!(health.concrete_name(), "Health");
        assert_eq!(health.concrete_type(), ComponentTypeId::of::<Health>());
        assert_eq!(health.downcast_ref::<Health>().map(|h| h.max), Some(10.0));
    }

    #[test]
    fn test_erased_component_encodes_to_json() {
        let health = Health {
            current: 1.0,
            max: 2.0,
        };
        let value = AnyComponent::to_value(&health).unwrap();
        assert_eq!(value["max"], serde_json::json!(2.0));
    }

    #[test]
    fn test_default_options_are_exclusive() {
        let options = ComponentOptions::default();
        assert!(!options.shareable);
        assert!(options.auto_dispose);
        assert!(!ComponentOptions::SHAREABLE.with_auto_dispose(false).auto_dispose);
    }
}
