use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};
use once_cell::sync::OnceCell;

use crate::{instantiator::BoxedCloneInstantiator, Instance, Key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Computed once, on first request, and reused afterwards.
    Singleton,
    /// Constructed on every request.
    Transient,
}

/// Construction strategy passed to [`crate::Container::bind`] and [`crate::Container::singleton`].
///
/// - [`Concrete::ABSTRACT`]: autowire the abstract key itself.
/// - A [`Key`] (or `&'static str`, `String`, `Option<Key>`): autowire that concrete key.
/// - [`crate::factory`]: call a factory closure.
pub struct Concrete(pub(crate) ConcreteKind);

pub(crate) enum ConcreteKind {
    Abstract,
    Identifier(Key),
    Factory(Factory),
}

impl Concrete {
    pub const ABSTRACT: Self = Self(ConcreteKind::Abstract);

    #[inline]
    pub(crate) fn into_strategy(self, abstract_key: &Key) -> Strategy {
        match self.0 {
            ConcreteKind::Abstract => Strategy::Autowire(abstract_key.clone()),
            ConcreteKind::Identifier(key) => Strategy::Autowire(key),
            ConcreteKind::Factory(factory) => Strategy::Factory(factory),
        }
    }
}

impl From<Key> for Concrete {
    #[inline]
    fn from(key: Key) -> Self {
        Self(ConcreteKind::Identifier(key))
    }
}

impl From<&'static str> for Concrete {
    #[inline]
    fn from(key: &'static str) -> Self {
        Self(ConcreteKind::Identifier(key.into()))
    }
}

impl From<String> for Concrete {
    #[inline]
    fn from(key: String) -> Self {
        Self(ConcreteKind::Identifier(key.into()))
    }
}

impl From<Option<Key>> for Concrete {
    #[inline]
    fn from(key: Option<Key>) -> Self {
        match key {
            Some(key) => Self(ConcreteKind::Identifier(key)),
            None => Self::ABSTRACT,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Factory {
    pub(crate) instantiator: BoxedCloneInstantiator,
    pub(crate) dependencies: fn() -> Vec<Key>,
}

pub(crate) enum Strategy {
    Factory(Factory),
    Autowire(Key),
    Value(Instance),
}

pub(crate) struct Binding {
    pub(crate) strategy: Strategy,
    pub(crate) lifecycle: Lifecycle,
    /// Singleton cache, never filled for transient bindings
    pub(crate) cell: OnceCell<Instance>,
}

impl Binding {
    #[inline]
    #[must_use]
    pub(crate) fn new(strategy: Strategy, lifecycle: Lifecycle) -> Self {
        Self {
            strategy,
            lifecycle,
            cell: OnceCell::new(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn value(instance: Instance) -> Self {
        Self {
            cell: OnceCell::with_value(instance.clone()),
            strategy: Strategy::Value(instance),
            lifecycle: Lifecycle::Singleton,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    bindings: BTreeMap<Key, Arc<Binding>>,
}

impl Registry {
    /// Stores the binding, returning the replaced one together with its cached value.
    #[inline]
    pub(crate) fn register(&mut self, key: Key, binding: Binding) -> Option<Arc<Binding>> {
        self.bindings.insert(key, Arc::new(binding))
    }

    #[inline]
    #[must_use]
    pub(crate) fn lookup(&self, key: &Key) -> Option<Arc<Binding>> {
        self.bindings.get(key).cloned()
    }

    #[inline]
    #[must_use]
    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.bindings.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Binding, Concrete, ConcreteKind, Lifecycle, Registry, Strategy};
    use crate::{Instance, Key};

    use alloc::sync::Arc;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::default();
        let key = Key::from("mailer");

        assert!(!registry.contains(&key));
        assert!(registry.lookup(&key).is_none());

        let replaced = registry.register(key.clone(), Binding::new(Strategy::Autowire(key.clone()), Lifecycle::Transient));

        assert!(replaced.is_none());
        assert!(registry.contains(&key));
        assert_eq!(registry.lookup(&key).unwrap().lifecycle, Lifecycle::Transient);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overwrite_drops_cached_value() {
        let mut registry = Registry::default();
        let key = Key::from("mailer");

        registry.register(key.clone(), Binding::value(Arc::new(1u8) as Instance));
        let replaced = registry
            .register(key.clone(), Binding::new(Strategy::Autowire(key.clone()), Lifecycle::Singleton))
            .unwrap();

        assert!(replaced.is_computed());
        assert!(!registry.lookup(&key).unwrap().is_computed());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concrete_into_strategy() {
        let abstract_key = Key::from("mailer");

        assert!(matches!(
            Concrete::ABSTRACT.into_strategy(&abstract_key),
            Strategy::Autowire(key) if key == abstract_key
        ));
        assert!(matches!(
            Concrete::from("smtp").into_strategy(&abstract_key),
            Strategy::Autowire(key) if key.as_str() == "smtp"
        ));
        assert!(matches!(Concrete::from(None::<Key>).0, ConcreteKind::Abstract));
    }
}
