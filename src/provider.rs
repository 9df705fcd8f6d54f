use alloc::{
    boxed::Box,
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    vec::Vec,
};
use core::fmt::{self, Debug, Formatter};
use tracing::debug;

use crate::{autowired::__PROVIDER_ENTRIES, errors::BootstrapErrorKind, Container, Key};

/// A unit of registration logic: binds a group of services into the container it was built with.
///
/// Each provider key is registered at most once per container, however many times it's submitted.
pub trait ServiceProvider: Send + 'static {
    /// # Errors
    /// Returns an error if the provider can't complete its registrations.
    /// The provider isn't marked as registered then, so submitting it again retries.
    fn register(&self) -> Result<(), BootstrapErrorKind>;
}

type ProviderFactory = Arc<dyn Fn(Container) -> Box<dyn ServiceProvider> + Send + Sync>;

/// Registration entry of a provider: its identity key and how to build it from a container.
#[derive(Clone)]
pub struct ProviderEntry {
    key: Key,
    factory: ProviderFactory,
}

impl ProviderEntry {
    #[must_use]
    pub fn new<F, P>(key: impl Into<Key>, factory: F) -> Self
    where
        F: Fn(Container) -> P + Send + Sync + 'static,
        P: ServiceProvider,
    {
        Self {
            key: key.into(),
            factory: Arc::new(move |container| Box::new(factory(container)) as Box<dyn ServiceProvider>),
        }
    }

    /// Entry keyed by the provider type name.
    #[must_use]
    pub fn of<P>() -> Self
    where
        P: ServiceProvider + From<Container>,
    {
        Self::new(Key::of::<P>(), P::from)
    }

    /// Same provider under another key, e.g. a short name for config files.
    #[must_use]
    pub fn with_key(self, key: impl Into<Key>) -> Self {
        Self { key: key.into(), ..self }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    #[inline]
    pub(crate) fn instantiate(&self, container: Container) -> Box<dyn ServiceProvider> {
        (self.factory)(container)
    }
}

impl Debug for ProviderEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Provider bookkeeping of one container.
#[derive(Default)]
pub(crate) struct Bootstrapper {
    /// Submitted providers, in submission order
    entries: Vec<ProviderEntry>,
    registered: BTreeSet<Key>,
    /// Providers that can be submitted by name
    known: BTreeMap<Key, ProviderEntry>,
}

impl Bootstrapper {
    /// Bootstrapper knowing every link-time provider.
    #[must_use]
    pub(crate) fn linked() -> Self {
        let mut bootstrapper = Self::default();
        for getter in __PROVIDER_ENTRIES {
            bootstrapper.add_known(getter());
        }
        bootstrapper
    }

    pub(crate) fn add_known(&mut self, entry: ProviderEntry) {
        debug!(key = %entry.key, "Provider known");
        self.known.insert(entry.key.clone(), entry);
    }

    #[inline]
    #[must_use]
    pub(crate) fn known(&self, key: &Key) -> Option<ProviderEntry> {
        self.known.get(key).cloned()
    }

    pub(crate) fn append(&mut self, entries: impl IntoIterator<Item = ProviderEntry>) {
        self.entries.extend(entries);
    }

    /// Marks the first unregistered provider as registered and returns it.
    ///
    /// Claiming before running the provider keeps a provider that submits itself again from recursing.
    pub(crate) fn claim_next(&mut self) -> Option<ProviderEntry> {
        let entry = self.entries.iter().find(|entry| !self.registered.contains(&entry.key))?.clone();
        self.registered.insert(entry.key.clone());
        Some(entry)
    }

    /// Forgets a claim whose registration failed.
    pub(crate) fn release(&mut self, key: &Key) {
        self.registered.remove(key);
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn is_registered(&self, key: &Key) -> bool {
        self.registered.contains(key)
    }
}

/// Makes a provider type known to every container, so it can be submitted by name.
///
/// The provider type must implement [`ServiceProvider`] and `From<Container>`.
///
/// ```
/// use bindery::{submit_provider, BootstrapErrorKind, Container, ServiceProvider};
///
/// struct MailProvider(Container);
///
/// impl From<Container> for MailProvider {
///     fn from(container: Container) -> Self {
///         Self(container)
///     }
/// }
///
/// impl ServiceProvider for MailProvider {
///     fn register(&self) -> Result<(), BootstrapErrorKind> {
///         self.0.instance("mail.from", String::from("noreply@example.com"));
///         Ok(())
///     }
/// }
///
/// submit_provider!(MailProvider, "mail");
///
/// fn main() {
///     let container = Container::empty();
///     container.set_providers_by_name(["mail"]).unwrap();
///
///     assert_eq!(*container.get_as::<String>("mail.from").unwrap(), "noreply@example.com");
/// }
/// ```
#[macro_export]
macro_rules! submit_provider {
    ($provider:ty) => {
        const _: () = {
            #[$crate::autowired::distributed_slice($crate::autowired::__PROVIDER_ENTRIES)]
            #[linkme(crate = $crate::autowired::linkme)]
            static __PROVIDER_ENTRY: fn() -> $crate::ProviderEntry = $crate::ProviderEntry::of::<$provider>;
        };
    };
    ($provider:ty, $name:expr) => {
        const _: () = {
            #[$crate::autowired::distributed_slice($crate::autowired::__PROVIDER_ENTRIES)]
            #[linkme(crate = $crate::autowired::linkme)]
            static __PROVIDER_ENTRY: fn() -> $crate::ProviderEntry = || $crate::ProviderEntry::of::<$provider>().with_key($name);
        };
    };
}

#[cfg(test)]
mod tests {
    use super::{Bootstrapper, ProviderEntry, ServiceProvider};
    use crate::{errors::BootstrapErrorKind, Container, Key};

    use alloc::{string::String, sync::Arc};
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing_test::traced_test;

    struct Noop;

    impl ServiceProvider for Noop {
        fn register(&self) -> Result<(), BootstrapErrorKind> {
            Ok(())
        }
    }

    impl From<Container> for Noop {
        fn from(_: Container) -> Self {
            Self
        }
    }

    #[test]
    fn test_entry_keys() {
        assert_eq!(ProviderEntry::of::<Noop>().key(), &Key::of::<Noop>());
        assert_eq!(ProviderEntry::of::<Noop>().with_key("noop").key().as_str(), "noop");
    }

    #[test]
    fn test_claim_each_key_once() {
        let mut bootstrapper = Bootstrapper::default();
        bootstrapper.append([
            ProviderEntry::of::<Noop>(),
            ProviderEntry::of::<Noop>(),
            ProviderEntry::of::<Noop>().with_key("noop"),
        ]);

        assert_eq!(bootstrapper.claim_next().unwrap().key(), &Key::of::<Noop>());
        assert_eq!(bootstrapper.claim_next().unwrap().key().as_str(), "noop");
        assert!(bootstrapper.claim_next().is_none());
        assert!(bootstrapper.is_registered(&Key::of::<Noop>()));
    }

    #[test]
    fn test_release_allows_retry() {
        let mut bootstrapper = Bootstrapper::default();
        bootstrapper.append([ProviderEntry::of::<Noop>()]);

        let entry = bootstrapper.claim_next().unwrap();
        bootstrapper.release(entry.key());

        assert!(!bootstrapper.is_registered(entry.key()));
        assert_eq!(bootstrapper.claim_next().unwrap().key(), entry.key());
    }

    struct Counting {
        container: Container,
        calls: Arc<AtomicU8>,
    }

    impl ServiceProvider for Counting {
        fn register(&self) -> Result<(), BootstrapErrorKind> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.container.instance("greeting", String::from("hello"));
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_register_runs_once() {
        let calls = Arc::new(AtomicU8::new(0));
        let entry = ProviderEntry::new("counting", {
            let calls = calls.clone();
            move |container| Counting {
                container,
                calls: calls.clone(),
            }
        });
        let container = Container::empty();

        container.set_providers([entry.clone(), entry.clone()]).unwrap();
        container.set_providers([entry]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*container.get_as::<String>("greeting").unwrap(), "hello");
    }

    struct SelfSubmitting {
        container: Container,
        calls: Arc<AtomicU8>,
    }

    impl ServiceProvider for SelfSubmitting {
        fn register(&self) -> Result<(), BootstrapErrorKind> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let calls = self.calls.clone();
            self.container.set_providers([ProviderEntry::new("self", move |container| SelfSubmitting {
                container,
                calls: calls.clone(),
            })])
        }
    }

    #[test]
    #[traced_test]
    fn test_reentrant_submission() {
        let calls = Arc::new(AtomicU8::new(0));
        let container = Container::empty();

        container
            .set_providers([ProviderEntry::new("self", {
                let calls = calls.clone();
                move |container| SelfSubmitting {
                    container,
                    calls: calls.clone(),
                }
            })])
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct Flaky {
        container: Container,
        calls: Arc<AtomicU8>,
    }

    impl ServiceProvider for Flaky {
        fn register(&self) -> Result<(), BootstrapErrorKind> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                // Fails on the first attempt only
                self.container.get_any("missing")?;
            }
            Ok(())
        }
    }

    #[test]
    #[traced_test]
    fn test_failed_provider_retried() {
        let calls = Arc::new(AtomicU8::new(0));
        let entry = ProviderEntry::new("flaky", {
            let calls = calls.clone();
            move |container| Flaky {
                container,
                calls: calls.clone(),
            }
        });
        let container = Container::empty();

        assert!(matches!(
            container.set_providers([entry.clone()]),
            Err(BootstrapErrorKind::Provider { key, .. }) if key.as_str() == "flaky"
        ));
        container.set_providers([entry]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
