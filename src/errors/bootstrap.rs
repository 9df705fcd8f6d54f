use alloc::{boxed::Box, string::String};

use super::resolve::ResolveErrorKind;
use crate::Key;

#[derive(thiserror::Error, Debug)]
pub enum ConfigErrorKind {
    #[error("Config value `{key}` has an unsupported shape: {reason}")]
    InvalidShape { key: String, reason: String },
    #[error("Provider `{name}` isn't known to the container")]
    UnknownProvider { name: String },
    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

#[derive(thiserror::Error, Debug)]
pub enum BootstrapErrorKind {
    #[error(transparent)]
    Config(#[from] ConfigErrorKind),
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
    #[error("Provider `{key}` failed to register: {source}")]
    Provider {
        key: Key,
        #[source]
        source: Box<BootstrapErrorKind>,
    },
}
