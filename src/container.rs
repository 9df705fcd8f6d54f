use alloc::{sync::Arc, vec::Vec};
use core::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, error, info_span, warn};

use crate::{
    autowired::{AutowireEntry, Catalog, Injectable},
    dependency_map::DependencyMap,
    engine,
    errors::{BootstrapErrorKind, ConfigErrorKind, ResolveErrorKind},
    global,
    lifecycle::{self, Computations},
    provider::{Bootstrapper, ProviderEntry},
    registry::{Binding, Concrete, Lifecycle, Registry},
    resolve_guard::ResolveGuard,
    settings::{Config, ConfigProvider, CONFIG_KEY},
    Instance, Key,
};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to one container: clones refer to the same bindings, aliases and providers.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    /// Distinguishes containers in the per-thread resolve stack
    pub(crate) id: u64,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) dependencies: RwLock<DependencyMap>,
    pub(crate) catalog: RwLock<Catalog>,
    pub(crate) providers: Mutex<Bootstrapper>,
    /// Held for a whole bootstrap run, re-entered when a provider submits more providers
    pub(crate) bootstrap_lock: ReentrantMutex<()>,
    pub(crate) computations: Mutex<Computations>,
}

impl Container {
    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Creates a container bootstrapped with `config`: the core [`ConfigProvider`] runs first,
    /// then the `dependencies` and `providers` found in the config are applied.
    ///
    /// # Errors
    /// Returns an error if the config has a malformed shape, names an unknown provider
    /// or a provider fails to register.
    #[inline]
    pub fn new(config: Config) -> Result<Self, BootstrapErrorKind> {
        Self::builder().config(config).build()
    }

    /// Creates a container without running any provider.
    ///
    /// Autowire entries and providers submitted at link time are known to it.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
                registry: RwLock::new(Registry::default()),
                dependencies: RwLock::new(DependencyMap::default()),
                catalog: RwLock::new(Catalog::linked()),
                providers: Mutex::new(Bootstrapper::linked()),
                bootstrap_lock: ReentrantMutex::new(()),
                computations: Mutex::new(Computations::default()),
            }),
        }
    }

    /// Registers a transient binding: each request constructs a new value.
    ///
    /// The abstract key goes through the alias table first.
    /// A previous binding under the same key is replaced, together with its cached value.
    pub fn bind(&self, abstract_key: impl Into<Key>, concrete: impl Into<Concrete>) {
        self.register(abstract_key.into(), concrete.into(), Lifecycle::Transient);
    }

    /// Registers a singleton binding, computed on first request and shared afterwards.
    ///
    /// The abstract key goes through the alias table first.
    /// A previous binding under the same key is replaced, together with its cached value.
    pub fn singleton(&self, abstract_key: impl Into<Key>, concrete: impl Into<Concrete>) {
        self.register(abstract_key.into(), concrete.into(), Lifecycle::Singleton);
    }

    /// Stores a ready value, returned as is by every request.
    pub fn instance<T: Send + Sync + 'static>(&self, abstract_key: impl Into<Key>, value: T) {
        self.instance_shared(abstract_key, Arc::new(value));
    }

    /// Same as [`Container::instance`] for a value that is already shared.
    pub fn instance_shared<T: Send + Sync + 'static>(&self, abstract_key: impl Into<Key>, value: Arc<T>) {
        let key = self.alias(&abstract_key.into());
        debug!(%key, value = type_name::<T>(), "Instance stored");
        self.store(key, Binding::value(value));
    }

    fn register(&self, abstract_key: Key, concrete: Concrete, lifecycle: Lifecycle) {
        let key = self.alias(&abstract_key);
        let strategy = concrete.into_strategy(&key);
        debug!(%key, ?lifecycle, "Bound");
        self.store(key, Binding::new(strategy, lifecycle));
    }

    fn store(&self, key: Key, binding: Binding) {
        let replaced = self.inner.registry.write().register(key.clone(), binding);
        // Dropped outside of the lock, the cached value may hold the container
        if let Some(replaced) = replaced {
            warn!(%key, computed = replaced.is_computed(), "Binding replaced");
        }
    }

    #[inline]
    fn alias(&self, key: &Key) -> Key {
        self.inner.dependencies.read().resolve(key)
    }

    /// Gets a bound value of type `T`, keyed by its type name.
    ///
    /// # Errors
    /// See [`Container::get_any`].
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.get_as(Key::of::<T>())
    }

    /// Gets a bound value by key and downcasts it to `T`.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the value isn't a `T`, otherwise see [`Container::get_any`].
    pub fn get_as<T: Send + Sync + 'static>(&self, id: impl Into<Key>) -> Result<Arc<T>, ResolveErrorKind> {
        let id = id.into();
        let instance = self.get_any(id.clone())?;
        downcast(id, instance)
    }

    /// Gets a bound value by key, following one level of aliasing.
    ///
    /// Fixed values are returned as is, singletons are computed once and transients are constructed each time.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if nothing is bound under the key.
    /// - Returns [`ResolveErrorKind::CyclicDependency`] if the key depends on itself.
    /// - Returns [`ResolveErrorKind::Instantiator`] if construction of the value or one of its dependencies fails.
    pub fn get_any(&self, id: impl Into<Key>) -> Result<Instance, ResolveErrorKind> {
        let id = id.into();
        let span = info_span!("get", key = %id);
        let _guard = span.enter();

        let key = self.alias(&id);
        let _resolving = ResolveGuard::push(self.inner.id, &key).map_err(log_error)?;

        let binding = self.inner.registry.read().lookup(&key);
        let Some(binding) = binding else {
            return Err(log_error(ResolveErrorKind::NotFound { key }));
        };

        lifecycle::produce(self, &key, &binding)
    }

    /// Gets or constructs a value of type `T`, keyed by its type name.
    ///
    /// # Errors
    /// See [`Container::make_any`].
    #[inline]
    pub fn make<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.make_as(Key::of::<T>())
    }

    /// Gets or constructs a value by key and downcasts it to `T`.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the value isn't a `T`, otherwise see [`Container::make_any`].
    pub fn make_as<T: Send + Sync + 'static>(&self, id: impl Into<Key>) -> Result<Arc<T>, ResolveErrorKind> {
        let id = id.into();
        let instance = self.make_any(id.clone())?;
        downcast(id, instance)
    }

    /// Same as [`Container::get_any`], except that a key without binding is autowired
    /// from its constructor declaration. Such values aren't cached.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] if the key has neither a binding nor an autowire entry,
    /// otherwise see [`Container::get_any`].
    pub fn make_any(&self, id: impl Into<Key>) -> Result<Instance, ResolveErrorKind> {
        let id = id.into();
        let span = info_span!("make", key = %id);
        let _guard = span.enter();

        let key = self.alias(&id);
        let _resolving = ResolveGuard::push(self.inner.id, &key).map_err(log_error)?;

        let binding = self.inner.registry.read().lookup(&key);
        if let Some(binding) = binding {
            return lifecycle::produce(self, &key, &binding);
        }
        debug!("No binding, autowiring");

        match engine::construct(self, &key) {
            Some(result) => result,
            None => Err(log_error(ResolveErrorKind::NotFound { key })),
        }
    }

    /// Whether a binding exists under the key, after aliasing.
    #[must_use]
    pub fn has(&self, id: impl Into<Key>) -> bool {
        let key = self.alias(&id.into());
        self.inner.registry.read().contains(&key)
    }

    /// Lifecycle of the binding under the key, after aliasing.
    #[must_use]
    pub fn lifecycle(&self, id: impl Into<Key>) -> Option<Lifecycle> {
        let key = self.alias(&id.into());
        self.inner.registry.read().lookup(&key).map(|binding| binding.lifecycle)
    }

    /// Merges aliases into the alias table, later entries overriding earlier ones.
    ///
    /// Already stored bindings aren't moved: aliases only affect keys used from now on.
    pub fn set_dependencies<K1, K2>(&self, aliases: impl IntoIterator<Item = (K1, K2)>)
    where
        K1: Into<Key>,
        K2: Into<Key>,
    {
        self.inner
            .dependencies
            .write()
            .merge(aliases.into_iter().map(|(from, to)| (from.into(), to.into())));
    }

    /// Appends providers and runs every one not registered yet, in submission order.
    ///
    /// # Errors
    /// Returns [`BootstrapErrorKind::Provider`] for the first provider that fails.
    /// It stays unregistered, and the providers after it aren't run.
    pub fn set_providers(&self, providers: impl IntoIterator<Item = ProviderEntry>) -> Result<(), BootstrapErrorKind> {
        let _bootstrap = self.inner.bootstrap_lock.lock();

        self.inner.providers.lock().append(providers);
        self.bootstrap_providers()
    }

    /// Same as [`Container::set_providers`] for providers known by name,
    /// see [`crate::submit_provider!`] and [`ContainerBuilder::known_provider`].
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind::UnknownProvider`] if a name isn't known, before running any provider.
    pub fn set_providers_by_name<I>(&self, names: I) -> Result<(), BootstrapErrorKind>
    where
        I: IntoIterator,
        I::Item: Into<Key>,
    {
        let entries = {
            let providers = self.inner.providers.lock();
            names
                .into_iter()
                .map(|name| {
                    let name = name.into();
                    providers.known(&name).ok_or_else(|| ConfigErrorKind::UnknownProvider { name: name.to_string() })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        match entries {
            Ok(entries) => self.set_providers(entries),
            Err(err) => {
                error!("{}", err);
                Err(err.into())
            }
        }
    }

    fn bootstrap_providers(&self) -> Result<(), BootstrapErrorKind> {
        loop {
            let next = self.inner.providers.lock().claim_next();
            let Some(entry) = next else {
                return Ok(());
            };

            let span = info_span!("provider", key = %entry.key());
            let _guard = span.enter();

            // Registration runs without the bookkeeping lock, providers are free to submit more providers
            if let Err(err) = entry.instantiate(self.clone()).register() {
                self.inner.providers.lock().release(entry.key());

                let err = BootstrapErrorKind::Provider {
                    key: entry.key().clone(),
                    source: err.into(),
                };
                error!("{}", err);
                return Err(err);
            }
            debug!("Registered");
        }
    }

    /// Makes `T` known to [`Container::make`] and autowire bindings.
    pub fn autowirable<T: Injectable>(&self) {
        self.autowire_entry(AutowireEntry::of::<T>());
    }

    pub fn autowire_entry(&self, entry: AutowireEntry) {
        debug!(key = %entry.key(), "Autowire entry added");
        self.inner.catalog.write().insert(entry);
    }

    /// Makes a provider submittable by name.
    pub fn known_provider(&self, entry: ProviderEntry) {
        self.inner.providers.lock().add_known(entry);
    }

    fn bootstrap(&self, config: Config) -> Result<(), BootstrapErrorKind> {
        let span = info_span!("bootstrap", container = self.inner.id);
        let _guard = span.enter();

        self.set_dependencies([(Key::from(CONFIG_KEY), Key::of::<Config>())]);
        self.set_providers([ConfigProvider::entry(config)])?;

        let config = self.get::<Config>()?;
        let dependencies = config.dependencies().map_err(log_error)?;
        if !dependencies.is_empty() {
            debug!(count = dependencies.len(), "Applying configured dependencies");
            self.set_dependencies(dependencies);
        }
        let providers = config.providers().map_err(log_error)?;
        if !providers.is_empty() {
            debug!(count = providers.len(), "Applying configured providers");
            self.set_providers_by_name(providers)?;
        }

        debug!("Bootstrapped");
        Ok(())
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("bindings", &self.inner.registry.read().len())
            .field("aliases", &self.inner.dependencies.read().len())
            .finish_non_exhaustive()
    }
}

#[inline]
fn log_error<E: core::fmt::Display>(err: E) -> E {
    error!("{}", err);
    err
}

fn downcast<T: Send + Sync + 'static>(key: Key, instance: Instance) -> Result<Arc<T>, ResolveErrorKind> {
    instance.downcast::<T>().map_err(|_| {
        log_error(ResolveErrorKind::IncorrectType {
            key,
            expected: type_name::<T>(),
        })
    })
}

/// Builder of a bootstrapped [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    config: Option<Config>,
    known_providers: Vec<ProviderEntry>,
    autowire_entries: Vec<AutowireEntry>,
    global: bool,
}

impl ContainerBuilder {
    /// Config to bootstrap with, empty when not set.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Provider the config can name, in addition to the ones submitted at link time.
    #[inline]
    #[must_use]
    pub fn known_provider(mut self, entry: ProviderEntry) -> Self {
        self.known_providers.push(entry);
        self
    }

    #[inline]
    #[must_use]
    pub fn autowirable<T: Injectable>(mut self) -> Self {
        self.autowire_entries.push(AutowireEntry::of::<T>());
        self
    }

    /// Publishes the built container as the process-wide instance, see [`crate::set_instance`].
    #[inline]
    #[must_use]
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// # Errors
    /// See [`Container::new`].
    pub fn build(self) -> Result<Container, BootstrapErrorKind> {
        let container = Container::empty();
        for entry in self.known_providers {
            container.known_provider(entry);
        }
        for entry in self.autowire_entries {
            container.autowire_entry(entry);
        }

        container.bootstrap(self.config.unwrap_or_default())?;

        if self.global {
            global::set_instance(Some(container.clone()));
        }
        Ok(container)
    }
}
