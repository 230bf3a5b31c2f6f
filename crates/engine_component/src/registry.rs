//! Component type registry.
//!
//! Maps component type names to decoders so that encoded component data can
//! be turned back into live instances. Registration is explicit; nothing is
//! discovered by reflection.

use std::collections::HashMap;

use crate::component::{AnyComponent, Component, ComponentTypeId};

/// Decodes a component instance from its encoded data.
pub type DecodeFn = fn(serde_json::Value) -> Result<Box<dyn AnyComponent>, serde_json::Error>;

/// Errors raised by registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No decoder is registered under this name.
    #[error("component type '{0}' is not registered")]
    Unknown(String),

    /// The registered decoder rejected the data.
    #[error("failed to decode component '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Information about one registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// The type's key.
    pub type_id: ComponentTypeId,
    /// The type's stable name.
    pub name: &'static str,
    decode: DecodeFn,
}

fn decode_component<T: Component>(
    value: serde_json::Value,
) -> Result<Box<dyn AnyComponent>, serde_json::Error> {
    let component: T = serde_json::from_value(value)?;
    Ok(Box::new(component))
}

/// Registry of decodable component types.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: HashMap<&'static str, ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Registering the same type twice is a no-op.
    pub fn register<T: Component>(&mut self) -> &mut Self {
        self.by_name.entry(T::type_name()).or_insert(ComponentInfo {
            type_id: T::component_type_id(),
            name: T::type_name(),
            decode: decode_component::<T>,
        });
        self
    }

    /// Returns the registration for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentInfo> {
        self.by_name.get(name)
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Decode an instance of the type registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] if `name` is not registered, or
    /// [`RegistryError::Decode`] if the data does not match the type.
    pub fn decode(
        &self,
        name: &str,
        value: serde_json::Value,
    ) -> Result<Box<dyn AnyComponent>, RegistryError> {
        let info = self
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        (info.decode)(value).map_err(|source| RegistryError::Decode {
            name: name.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health {
        current: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_register_and_decode() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>().register::<Health>();
        assert_eq!(registry.len(), 1);

        let decoded = registry
            .decode("Health", serde_json::json!({ "current": 3.0 }))
            .unwrap();
        assert_eq!(decoded.downcast_ref::<Health>(), Some(&Health { current: 3.0 }));
    }

    #[test]
    fn test_decode_unknown_type() {
        let registry = ComponentRegistry::new();
        let err = registry.decode("Ghost", serde_json::Value::Null).unwrap_err();
        assert!(matches!(err, RegistryError::Unknown(name) if name == "Ghost"));
    }

    #[test]
    fn test_decode_bad_data() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>();
        let err = registry
            .decode("Health", serde_json::json!({ "wrong": true }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Decode { .. }));
    }
}
