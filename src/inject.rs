use alloc::{sync::Arc, vec, vec::Vec};

use crate::{dependency_resolver::DependencyResolver, Container, Key, ResolveErrorKind};

/// Resolves `Dep` by its type key through [`Container::make`].
///
/// The binding's lifecycle decides whether the `Arc` is shared (singleton) or fresh (transient).
/// An unbound type that has an autowire entry is autowired.
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(container: &Container) -> Result<Self, Self::Error> {
        container.make().map(Self)
    }

    #[inline]
    fn dependencies() -> Vec<Key> {
        vec![Key::of::<Dep>()]
    }
}
