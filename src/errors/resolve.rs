use alloc::boxed::Box;
use core::fmt::{self, Display, Formatter};

use super::{instantiate::InstantiateErrorKind, instantiator::InstantiatorErrorKind};
use crate::Key;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No binding found for `{key}`")]
    NotFound { key: Key },
    #[error("Binding `{key}` provides another type than expected `{expected}`")]
    IncorrectType { key: Key, expected: &'static str },
    #[error("{}", CyclicChain(.chain))]
    CyclicDependency { chain: Box<[Key]> },
    #[error(transparent)]
    Instantiator(InstantiatorErrorKind<Box<ResolveErrorKind>, InstantiateErrorKind>),
}

impl ResolveErrorKind {
    /// Walks through dependency errors down to the error that started the failure.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Instantiator(InstantiatorErrorKind::Deps(err)) => err.root_cause(),
            err => err,
        }
    }
}

struct CyclicChain<'a>(&'a [Key]);

impl Display for CyclicChain<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Cyclic dependency detected: ")?;
        for (index, key) in self.0.iter().enumerate() {
            if index != 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
