use alloc::{boxed::Box, collections::BTreeMap, vec};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    thread::{self, ThreadId},
};
use tracing::{debug, error};

use crate::{
    engine,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    registry::{Binding, Factory, Lifecycle, Strategy},
    service::Service as _,
    Container, Instance, Key,
};

/// Produces the value of `binding` stored under `key`, honoring its lifecycle.
///
/// Singletons are computed at most once, even when several threads ask for them at the same time.
/// A failed computation leaves the binding uncomputed, so a later request retries.
pub(crate) fn produce(container: &Container, key: &Key, binding: &Binding) -> Result<Instance, ResolveErrorKind> {
    match (&binding.strategy, binding.lifecycle) {
        (Strategy::Value(instance), _) => {
            debug!("Found precomputed value");
            Ok(instance.clone())
        }
        (strategy, Lifecycle::Singleton) => {
            if let Some(instance) = binding.cell.get() {
                debug!("Found in cache");
                return Ok(instance.clone());
            }
            debug!("Not found in cache");

            // Waiting on a cell that another thread fills while waiting on ours would never end
            engine::check_cycles(container, key)?;

            let computations = &container.inner.computations;
            let current = thread::current().id();
            computations.lock().wait_for(key, current).map_err(|err| {
                error!("{}", err);
                err
            })?;

            let instance = binding.cell.get_or_try_init(|| {
                let _computing = Computing::start(computations, key, current);
                invoke(container, strategy)
            });
            computations.lock().waiting.remove(&current);

            let instance = instance?;
            debug!("Cached");
            Ok(instance.clone())
        }
        (strategy, Lifecycle::Transient) => invoke(container, strategy),
    }
}

/// Singleton computations in flight on every thread of one container.
///
/// Factories may resolve through their `Container` argument, which the declared graph doesn't show.
/// Before a thread blocks on a cell, the wait-for chain is followed so a cycle spanning threads fails.
#[derive(Debug, Default)]
pub(crate) struct Computations {
    /// Thread filling each singleton cell
    computing: BTreeMap<Key, ThreadId>,
    /// Cell each thread is blocked on
    waiting: HashMap<ThreadId, Key>,
}

impl Computations {
    /// Records that `current` is about to wait on `key`.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::CyclicDependency`] when the thread filling `key`
    /// waits, directly or through other threads, on a cell `current` is filling.
    fn wait_for(&mut self, key: &Key, current: ThreadId) -> Result<(), ResolveErrorKind> {
        let mut chain = vec![key.clone()];
        let mut next = key;

        while let Some(owner) = self.computing.get(next) {
            if *owner == current {
                chain.push(key.clone());
                return Err(ResolveErrorKind::CyclicDependency { chain: chain.into() });
            }
            match self.waiting.get(owner) {
                Some(waited) if chain.len() <= self.waiting.len() => {
                    chain.push(waited.clone());
                    next = waited;
                }
                _ => break,
            }
        }

        self.waiting.insert(current, key.clone());
        Ok(())
    }
}

/// Marks `key` as being filled by the current thread until dropped.
struct Computing<'a> {
    computations: &'a Mutex<Computations>,
    key: &'a Key,
}

impl<'a> Computing<'a> {
    fn start(computations: &'a Mutex<Computations>, key: &'a Key, current: ThreadId) -> Self {
        let mut guard = computations.lock();
        guard.waiting.remove(&current);
        guard.computing.insert(key.clone(), current);
        Self { computations, key }
    }
}

impl Drop for Computing<'_> {
    fn drop(&mut self) {
        self.computations.lock().computing.remove(self.key);
    }
}

fn invoke(container: &Container, strategy: &Strategy) -> Result<Instance, ResolveErrorKind> {
    match strategy {
        Strategy::Factory(Factory { instantiator, .. }) => instantiator.clone().call(container.clone()).map_err(|err| {
            let err = into_resolve_error(err);
            error!("{}", err);
            err
        }),
        Strategy::Autowire(concrete) => engine::build(container, concrete),
        Strategy::Value(instance) => Ok(instance.clone()),
    }
}

#[inline]
pub(crate) fn into_resolve_error(err: InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>) -> ResolveErrorKind {
    match err {
        InstantiatorErrorKind::Deps(err) => ResolveErrorKind::Instantiator(InstantiatorErrorKind::Deps(Box::new(err))),
        InstantiatorErrorKind::Factory(err) => ResolveErrorKind::Instantiator(InstantiatorErrorKind::Factory(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{produce, Computations};
    use crate::{
        factory,
        registry::{Binding, Lifecycle, Strategy},
        Container, Concrete, Instance, Key, ResolveErrorKind,
    };

    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicU8, Ordering};
    use std::{thread, vec::Vec};
    use tracing_test::traced_test;

    struct DemoClass;

    fn counting_factory(call_count: &Arc<AtomicU8>) -> Concrete {
        let call_count = call_count.clone();
        factory(move || {
            call_count.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(DemoClass)
        })
    }

    #[test]
    #[traced_test]
    fn test_singleton_computed_once() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::empty();
        let key = Key::of::<DemoClass>();
        let binding = Binding::new(counting_factory(&call_count).into_strategy(&key), Lifecycle::Singleton);

        assert!(!binding.is_computed());
        let first = produce(&container, &key, &binding).unwrap();
        let second = produce(&container, &key, &binding).unwrap();

        assert!(binding.is_computed());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_transient_not_cached() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::empty();
        let key = Key::of::<DemoClass>();
        let binding = Binding::new(counting_factory(&call_count).into_strategy(&key), Lifecycle::Transient);

        let first = produce(&container, &key, &binding).unwrap();
        let second = produce(&container, &key, &binding).unwrap();

        assert!(!binding.is_computed());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_value_returned_as_is() {
        let container = Container::empty();
        let value = Arc::new(DemoClass) as Instance;
        let binding = Binding::value(value.clone());

        assert!(Arc::ptr_eq(&produce(&container, &Key::of::<DemoClass>(), &binding).unwrap(), &value));
    }

    #[test]
    #[traced_test]
    fn test_failed_singleton_stays_uncomputed() {
        let container = Container::empty();
        let key = Key::from("broken");
        let binding = Binding::new(Strategy::Autowire(key.clone()), Lifecycle::Singleton);

        assert!(matches!(
            produce(&container, &key, &binding),
            Err(ResolveErrorKind::Instantiator(_))
        ));
        assert!(!binding.is_computed());
    }

    #[test]
    #[traced_test]
    fn test_concurrent_singleton_computed_once() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::empty();
        container.singleton(Key::of::<DemoClass>(), {
            let call_count = call_count.clone();
            factory(move || {
                call_count.fetch_add(1, Ordering::SeqCst);
                thread::sleep(core::time::Duration::from_millis(20));
                Ok::<_, anyhow::Error>(DemoClass)
            })
        });

        let handles = (0..8)
            .map(|_| {
                let container = container.clone();
                thread::spawn(move || container.get::<DemoClass>().unwrap())
            })
            .collect::<Vec<_>>();
        let instances = handles.into_iter().map(|handle| handle.join().unwrap()).collect::<Vec<_>>();

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn test_wait_for_reports_chain_across_threads() {
        let current = thread::current().id();
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        let mut computations = Computations::default();
        computations.computing.insert(Key::from("a"), current);
        computations.computing.insert(Key::from("b"), other);
        computations.waiting.insert(other, Key::from("a"));

        assert!(matches!(
            computations.wait_for(&Key::from("b"), current),
            Err(ResolveErrorKind::CyclicDependency { chain }) if *chain == [Key::from("b"), Key::from("a"), Key::from("b")]
        ));
        assert!(!computations.waiting.contains_key(&current));
    }

    #[test]
    fn test_wait_for_slow_computation() {
        let current = thread::current().id();
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        let mut computations = Computations::default();
        computations.computing.insert(Key::from("a"), other);

        assert!(computations.wait_for(&Key::from("a"), current).is_ok());
        assert_eq!(computations.waiting.get(&current), Some(&Key::from("a")));
    }
}
