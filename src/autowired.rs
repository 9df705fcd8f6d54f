use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use tracing::debug;

pub use linkme::{self, distributed_slice};

use crate::{
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind},
    instantiator::{BoxedCloneInstantiator, InstantiatorResult},
    provider::ProviderEntry,
    service::{service_fn, BoxCloneService},
    Container, Instance, Key,
};

/// Autowire entries registered at link time by `#[derive(Injectable)]`.
#[distributed_slice]
pub static __AUTOWIRE_ENTRIES: [fn() -> AutowireEntry];

/// Provider entries registered at link time by [`crate::submit_provider!`].
#[distributed_slice]
pub static __PROVIDER_ENTRIES: [fn() -> ProviderEntry];

/// A type the container can build on its own.
///
/// `Deps` plays the part of the constructor parameter list: it's resolved through the container
/// (recursively, through aliases, bindings and lifecycles) and handed to [`Injectable::construct`]
/// in declaration order. Usually derived with `#[derive(Injectable)]`.
pub trait Injectable: Sized + Send + Sync + 'static {
    type Deps: DependencyResolver;

    /// # Errors
    /// Returns an error if the value can't be built from the resolved parameters.
    fn construct(dependencies: Self::Deps) -> Result<Self, InstantiateErrorKind>;
}

/// Statically declared constructor of a concrete key.
#[derive(Clone)]
pub struct AutowireEntry {
    pub(crate) key: Key,
    pub(crate) dependencies: fn() -> Vec<Key>,
    pub(crate) instantiator: BoxedCloneInstantiator,
}

impl AutowireEntry {
    #[must_use]
    pub fn of<T: Injectable>() -> Self {
        Self {
            key: Key::of::<T>(),
            dependencies: <T::Deps as DependencyResolver>::dependencies,
            instantiator: BoxCloneService::new(service_fn(|container: Container| -> InstantiatorResult {
                let dependencies = match T::Deps::resolve(&container) {
                    Ok(dependencies) => dependencies,
                    Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
                };
                match T::construct(dependencies) {
                    Ok(value) => {
                        debug!("Autowired");
                        Ok(Arc::new(value) as Instance)
                    }
                    Err(err) => Err(InstantiatorErrorKind::Factory(err)),
                }
            })),
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }
}

/// Autowire entries known to one container, keyed by concrete key.
#[derive(Default)]
pub(crate) struct Catalog {
    entries: BTreeMap<Key, AutowireEntry>,
}

impl Catalog {
    /// Catalog seeded with every link-time entry.
    #[must_use]
    pub(crate) fn linked() -> Self {
        let mut catalog = Self::default();
        for getter in __AUTOWIRE_ENTRIES {
            catalog.insert(getter());
        }
        catalog
    }

    #[inline]
    pub(crate) fn insert(&mut self, entry: AutowireEntry) -> Option<AutowireEntry> {
        self.entries.insert(entry.key.clone(), entry)
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, key: &Key) -> Option<AutowireEntry> {
        self.entries.get(key).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn dependencies_of(&self, key: &Key) -> Option<Vec<Key>> {
        self.entries.get(key).map(|entry| (entry.dependencies)())
    }
}
