extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub mod autowired;
pub(crate) mod container;
pub(crate) mod dependency_map;
pub(crate) mod dependency_resolver;
pub(crate) mod engine;
pub(crate) mod errors;
pub(crate) mod global;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod key;
pub(crate) mod lifecycle;
pub(crate) mod provider;
pub(crate) mod registry;
pub(crate) mod resolve_guard;
pub(crate) mod service;
pub(crate) mod settings;

pub use autowired::{AutowireEntry, Injectable};
pub use container::{Container, ContainerBuilder};
pub use dependency_resolver::DependencyResolver;
pub use errors::{BootstrapErrorKind, ConfigErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind};
pub use global::{get_instance, instance, set_instance};
pub use inject::Inject;
pub use instantiator::{factory, Instantiator};
pub use key::{Instance, Key};
pub use provider::{ProviderEntry, ServiceProvider};
pub use registry::{Concrete, Lifecycle};
pub use settings::{Config, ConfigProvider, ConfigRepository, CONFIG_KEY, CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH, ENV_VAR_DELIM, ENV_VAR_PREFIX};

pub use config::Value as ConfigValue;

#[cfg(feature = "macros")]
pub use bindery_macros::Injectable;
