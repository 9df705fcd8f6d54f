//! Process-wide container handle.
//!
//! Nothing is published implicitly: a container becomes the global one through [`set_instance`],
//! [`crate::ContainerBuilder::global`] or the first call to [`instance`].

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::{errors::BootstrapErrorKind, settings::Config, Container};

static INSTANCE: Lazy<RwLock<Option<Container>>> = Lazy::new(|| RwLock::new(None));

/// Replaces the global container, `None` clears it.
///
/// Returns the container now stored.
pub fn set_instance(container: Option<Container>) -> Option<Container> {
    let mut instance = INSTANCE.write();
    *instance = container;
    debug!(present = instance.is_some(), "Global container set");
    instance.clone()
}

/// Global container, if one was set.
#[must_use]
pub fn get_instance() -> Option<Container> {
    INSTANCE.read().clone()
}

/// Global container, bootstrapped from [`Config::from_env`] on first use when none was set.
///
/// Providers run during that bootstrap must not access the global handle.
///
/// # Errors
/// Returns an error if the lazily created container fails to bootstrap. Nothing is stored then.
pub fn instance() -> Result<Container, BootstrapErrorKind> {
    if let Some(container) = get_instance() {
        return Ok(container);
    }

    let mut instance = INSTANCE.write();
    if let Some(container) = instance.as_ref() {
        return Ok(container.clone());
    }

    debug!("Creating global container");
    let container = Container::new(Config::from_env()?)?;
    *instance = Some(container.clone());
    Ok(container)
}
