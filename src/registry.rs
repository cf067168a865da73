//! # Type Registry
//!
//! Stores the injectable values a page tree is built against, keyed by type
//! identity. Capability methods declare their extra parameters by type and the
//! invoker resolves them here.
//!
//! ## Orientation
//!
//! Every entry has an orientation:
//!
//! - **value**: registered with [`TypeRegistry::add`] or
//!   [`TypeRegistry::add_by_value`]; requested as an owned clone (`Dep<T>`).
//! - **shared**: registered with [`TypeRegistry::add_shared`]; requested as
//!   `Arc<T>`.
//!
//! ## Lookup order
//!
//! 1. Exact match on the requested orientation.
//! 2. Exact match on the other orientation. A shared entry always satisfies a
//!    value request by cloning through the `Arc`. A value entry satisfies a
//!    shared request only when it was registered as addressable
//!    ([`TypeRegistry::add`]); [`TypeRegistry::add_by_value`] entries do not.
//! 3. Declared capability providers (see [`Provides::provides`]). Exactly one
//!    provider resolves; several providers fail with
//!    [`Error::AmbiguousCapability`] rather than picking one.
//!
//! ```rust
//! use std::sync::Arc;
//! use pagetree::TypeRegistry;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .add_shared(Arc::new(English))?
//!     .provides::<dyn Greeter>(|english| english);
//!
//! let greeter = registry.get_shared::<dyn Greeter>()?.unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! # Ok::<(), pagetree::Error>(())
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Orientation {
    Value,
    Shared,
}

struct Entry {
    type_name: &'static str,
    addressable: bool,
    /// Always an `Arc<T>` for the entry's `T`.
    value: Box<dyn Any + Send + Sync>,
}

struct Provider {
    type_name: &'static str,
    /// An `Arc<C>` for the capability `C`.
    value: Box<dyn Any + Send + Sync>,
}

/// Type-keyed store of injectable values.
///
/// Populated once before mounting and read-only afterwards, so it is shared
/// across request handlers without locking.
#[derive(Default)]
pub struct TypeRegistry {
    entries: HashMap<(TypeId, Orientation), Entry>,
    capabilities: HashMap<TypeId, Vec<Provider>>,
}

/// Returned by the `add*` methods to declare capabilities the new entry provides.
pub struct Provides<'r, T: ?Sized> {
    registry: &'r mut TypeRegistry,
    value: Arc<T>,
}

impl<T: ?Sized + Send + Sync + 'static> Provides<'_, T> {
    /// Declare that the entry also satisfies `Arc<C>` parameters.
    ///
    /// `upcast` is normally the identity closure `|v| v`, which lets the
    /// compiler perform the unsized coercion to `Arc<dyn Capability>`.
    pub fn provides<C>(self, upcast: impl FnOnce(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let capability: Arc<C> = upcast(Arc::clone(&self.value));
        debug!(
            provider = type_name::<T>(),
            capability = type_name::<C>(),
            "registered capability provider"
        );
        self.registry
            .capabilities
            .entry(TypeId::of::<C>())
            .or_default()
            .push(Provider {
                type_name: type_name::<T>(),
                value: Box::new(capability),
            });
        self
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an addressable value: retrievable as `T` and as `Arc<T>`.
    pub fn add<T: Send + Sync + 'static>(&mut self, value: T) -> Result<Provides<'_, T>> {
        let value = Arc::new(value);
        self.insert(Orientation::Value, true, Arc::clone(&value))?;
        Ok(Provides {
            registry: self,
            value,
        })
    }

    /// Register a value that only satisfies owned (`T`) requests.
    pub fn add_by_value<T: Send + Sync + 'static>(&mut self, value: T) -> Result<()> {
        self.insert(Orientation::Value, false, Arc::new(value))
    }

    /// Register a shared value: retrievable as `Arc<T>` and, when `T: Clone`, as `T`.
    pub fn add_shared<T>(&mut self, value: Arc<T>) -> Result<Provides<'_, T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(Orientation::Shared, true, Arc::clone(&value))?;
        Ok(Provides {
            registry: self,
            value,
        })
    }

    /// Register an optional dependency; `None` is ignored.
    pub fn add_optional<T: Send + Sync + 'static>(&mut self, value: Option<T>) -> Result<()> {
        match value {
            Some(value) => self.add(value).map(|_| ()),
            None => Ok(()),
        }
    }

    fn insert<T>(&mut self, orientation: Orientation, addressable: bool, value: Arc<T>) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = (TypeId::of::<T>(), orientation);
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateType {
                type_name: type_name::<T>(),
            });
        }
        debug!(type_name = type_name::<T>(), ?orientation, "registered value");
        self.entries.insert(
            key,
            Entry {
                type_name: type_name::<T>(),
                addressable,
                value: Box::new(value),
            },
        );
        Ok(())
    }

    fn arc_of<T: ?Sized + 'static>(&self, orientation: Orientation) -> Option<&Entry> {
        self.entries.get(&(TypeId::of::<T>(), orientation))
    }

    /// Resolve an owned clone of `T`.
    ///
    /// Capability providers are not consulted: they only hand out `Arc<C>`.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        [Orientation::Value, Orientation::Shared]
            .into_iter()
            .filter_map(|o| self.arc_of::<T>(o))
            .find_map(|entry| entry.value.downcast_ref::<Arc<T>>())
            .map(|arc| T::clone(arc))
    }

    /// Resolve a shared handle to `T`, falling back to capability providers.
    pub fn get_shared<T: ?Sized + 'static>(&self) -> Result<Option<Arc<T>>> {
        if let Some(arc) = self
            .arc_of::<T>(Orientation::Shared)
            .and_then(|entry| entry.value.downcast_ref::<Arc<T>>())
        {
            return Ok(Some(Arc::clone(arc)));
        }

        if let Some(entry) = self.arc_of::<T>(Orientation::Value) {
            if !entry.addressable {
                debug!(
                    type_name = entry.type_name,
                    "value registered by value is not addressable"
                );
                return Ok(None);
            }
            return Ok(entry.value.downcast_ref::<Arc<T>>().map(Arc::clone));
        }

        match self.capabilities.get(&TypeId::of::<T>()).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([provider]) => Ok(provider.value.downcast_ref::<Arc<T>>().map(Arc::clone)),
            Some(providers) => Err(Error::AmbiguousCapability {
                type_name: type_name::<T>(),
                candidates: providers.iter().map(|p| p.type_name).collect(),
            }),
        }
    }

    /// Whether a value of exactly `T` was registered in either orientation.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.arc_of::<T>(Orientation::Value).is_some()
            || self.arc_of::<T>(Orientation::Shared).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Settings {
        name: String,
    }

    trait Store: Send + Sync {
        fn kind(&self) -> &'static str;
    }

    struct MemoryStore;
    impl Store for MemoryStore {
        fn kind(&self) -> &'static str {
            "memory"
        }
    }

    struct DiskStore;
    impl Store for DiskStore {
        fn kind(&self) -> &'static str {
            "disk"
        }
    }

    fn settings() -> Settings {
        Settings {
            name: "first".to_string(),
        }
    }

    #[test]
    fn test_duplicate_value_is_rejected() {
        let mut registry = TypeRegistry::new();
        registry.add(settings()).unwrap();
        let err = registry.add(settings()).err().unwrap();
        assert!(matches!(err, Error::DuplicateType { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected_regardless_of_order() {
        let mut registry = TypeRegistry::new();
        registry.add_by_value(7_u32).unwrap();
        assert!(registry.add(8_u32).is_err());

        let mut registry = TypeRegistry::new();
        registry.add(8_u32).unwrap();
        assert!(registry.add_by_value(7_u32).is_err());

        let mut registry = TypeRegistry::new();
        registry.add_shared(Arc::new(1_u8)).unwrap();
        assert!(registry.add_shared(Arc::new(2_u8)).is_err());
    }

    #[test]
    fn test_add_optional_ignores_none() {
        let mut registry = TypeRegistry::new();
        registry.add_optional::<Settings>(None).unwrap();
        assert!(registry.is_empty());
        registry.add_optional(Some(settings())).unwrap();
        assert!(registry.contains::<Settings>());
    }

    #[test]
    fn test_value_entry_is_reflexive() {
        let mut registry = TypeRegistry::new();
        registry.add(settings()).unwrap();
        assert_eq!(registry.get::<Settings>(), Some(settings()));
        let shared = registry.get_shared::<Settings>().unwrap().unwrap();
        assert_eq!(shared.name, "first");
    }

    #[test]
    fn test_shared_entry_satisfies_both_orientations() {
        let mut registry = TypeRegistry::new();
        registry.add_shared(Arc::new(settings())).unwrap();
        assert_eq!(registry.get::<Settings>(), Some(settings()));
        assert!(registry.get_shared::<Settings>().unwrap().is_some());
    }

    #[test]
    fn test_by_value_entry_is_not_addressable() {
        let mut registry = TypeRegistry::new();
        registry.add_by_value(settings()).unwrap();
        assert_eq!(registry.get::<Settings>(), Some(settings()));
        assert!(registry.get_shared::<Settings>().unwrap().is_none());
    }

    #[test]
    fn test_exact_orientation_wins() {
        let mut registry = TypeRegistry::new();
        registry
            .add(Settings {
                name: "value".to_string(),
            })
            .unwrap();
        registry
            .add_shared(Arc::new(Settings {
                name: "shared".to_string(),
            }))
            .unwrap();
        assert_eq!(registry.get::<Settings>().unwrap().name, "value");
        assert_eq!(
            registry.get_shared::<Settings>().unwrap().unwrap().name,
            "shared"
        );
    }

    #[test]
    fn test_capability_fallback_single_provider() {
        let mut registry = TypeRegistry::new();
        registry
            .add_shared(Arc::new(MemoryStore))
            .unwrap()
            .provides::<dyn Store>(|s| s);
        let store = registry.get_shared::<dyn Store>().unwrap().unwrap();
        assert_eq!(store.kind(), "memory");
    }

    #[test]
    fn test_capability_fallback_from_value_entry() {
        let mut registry = TypeRegistry::new();
        registry.add(DiskStore).unwrap().provides::<dyn Store>(|s| s);
        let store = registry.get_shared::<dyn Store>().unwrap().unwrap();
        assert_eq!(store.kind(), "disk");
    }

    #[test]
    fn test_capability_ambiguity_is_an_error() {
        let mut registry = TypeRegistry::new();
        registry
            .add_shared(Arc::new(MemoryStore))
            .unwrap()
            .provides::<dyn Store>(|s| s);
        registry
            .add_shared(Arc::new(DiskStore))
            .unwrap()
            .provides::<dyn Store>(|s| s);
        match registry.get_shared::<dyn Store>() {
            Err(Error::AmbiguousCapability { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected ambiguity, got {:?}", other.map(|s| s.is_some())),
        }
    }

    #[test]
    fn test_explicit_trait_object_registration_beats_providers() {
        let mut registry = TypeRegistry::new();
        registry
            .add_shared(Arc::new(MemoryStore))
            .unwrap()
            .provides::<dyn Store>(|s| s);
        registry
            .add_shared(Arc::new(DiskStore))
            .unwrap()
            .provides::<dyn Store>(|s| s);
        let chosen: Arc<dyn Store> = Arc::new(DiskStore);
        registry.add_shared(chosen).unwrap();
        let store = registry.get_shared::<dyn Store>().unwrap().unwrap();
        assert_eq!(store.kind(), "disk");
    }

    #[test]
    fn test_missing_type_resolves_to_none() {
        let registry = TypeRegistry::new();
        assert!(registry.get::<Settings>().is_none());
        assert!(registry.get_shared::<dyn Store>().unwrap().is_none());
    }
}
