//! Autowiring: building concrete keys from their statically declared constructors.

use alloc::{collections::BTreeSet, vec::Vec};
use tracing::{debug, debug_span, error};

use crate::{
    errors::{InstantiateErrorKind, InstantiatorErrorKind},
    lifecycle::into_resolve_error,
    registry::Strategy,
    service::Service as _,
    Container, Instance, Key, ResolveErrorKind,
};

/// Builds `concrete` after one level of aliasing, bypassing any binding it may have.
pub(crate) fn build(container: &Container, concrete: &Key) -> Result<Instance, ResolveErrorKind> {
    let key = container.inner.dependencies.read().resolve(concrete);

    construct(container, &key).unwrap_or_else(|| {
        let err = ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(InstantiateErrorKind::NotInstantiable { key }));
        error!("{}", err);
        Err(err)
    })
}

/// Runs the autowire entry of `key`, if the container has one.
///
/// Parameters of the constructor are resolved through `make`, so unbound ones are autowired in turn.
pub(crate) fn construct(container: &Container, key: &Key) -> Option<Result<Instance, ResolveErrorKind>> {
    let entry = container.inner.catalog.read().get(key)?;

    let span = debug_span!("autowire", key = %key);
    let _guard = span.enter();

    Some(entry.instantiator.clone().call(container.clone()).map_err(|err| {
        let err = into_resolve_error(err);
        error!("{}", err);
        err
    }))
}

/// Walks the declared dependency graph reachable from `start` and reports the first cycle found.
///
/// Computed singletons and fixed values are leaves, since they never reach their dependencies again.
pub(crate) fn check_cycles(container: &Container, start: &Key) -> Result<(), ResolveErrorKind> {
    let mut path = Vec::new();
    let mut visited = BTreeSet::new();

    visit(container, start.clone(), &mut path, &mut visited).map_err(|err| {
        error!("{}", err);
        err
    })
}

fn visit(container: &Container, key: Key, path: &mut Vec<Key>, visited: &mut BTreeSet<Key>) -> Result<(), ResolveErrorKind> {
    if let Some(position) = path.iter().position(|on_path| *on_path == key) {
        let chain = path[position..].iter().cloned().chain([key]).collect();
        return Err(ResolveErrorKind::CyclicDependency { chain });
    }
    if !visited.insert(key.clone()) {
        return Ok(());
    }

    let dependencies = declared_dependencies(container, &key);
    path.push(key);
    for dependency in dependencies {
        let dependency = container.inner.dependencies.read().resolve(&dependency);
        visit(container, dependency, path, visited)?;
    }
    path.pop();

    Ok(())
}

fn declared_dependencies(container: &Container, key: &Key) -> Vec<Key> {
    let binding = container.inner.registry.read().lookup(key);

    let dependencies = match binding {
        Some(binding) if binding.is_computed() => None,
        Some(binding) => match &binding.strategy {
            Strategy::Value(_) => None,
            Strategy::Factory(factory) => Some((factory.dependencies)()),
            Strategy::Autowire(concrete) => {
                let concrete = container.inner.dependencies.read().resolve(concrete);
                container.inner.catalog.read().dependencies_of(&concrete)
            }
        },
        None => container.inner.catalog.read().dependencies_of(key),
    };

    let dependencies = dependencies.unwrap_or_default();
    debug!(%key, ?dependencies, "Declared dependencies");
    dependencies
}
