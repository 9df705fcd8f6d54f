mod bootstrap;
mod instantiate;
mod instantiator;
mod resolve;

pub use bootstrap::{BootstrapErrorKind, ConfigErrorKind};
pub use instantiate::InstantiateErrorKind;
pub use instantiator::InstantiatorErrorKind;
pub use resolve::ResolveErrorKind;
