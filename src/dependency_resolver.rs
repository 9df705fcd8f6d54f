use alloc::vec::Vec;

use super::errors::ResolveErrorKind;
use crate::{Container, Key};

/// Something an instantiator can ask the container for.
///
/// Implemented by [`crate::Inject`], by [`Container`] itself and by tuples of resolvers,
/// which is how factory closures and [`crate::Injectable`] types declare their constructor parameters.
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    fn resolve(container: &Container) -> Result<Self, Self::Error>;

    /// Keys this resolver will request from the container.
    ///
    /// Used to walk the declared dependency graph before a singleton is computed.
    #[inline]
    #[must_use]
    fn dependencies() -> Vec<Key> {
        Vec::new()
    }
}

impl DependencyResolver for Container {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(container: &Container) -> Result<Self, Self::Error> {
        Ok(container.clone())
    }
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(container: &Container) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(container).map_err(Into::into)?,)*))
            }

            #[inline]
            fn dependencies() -> Vec<Key> {
                let mut dependencies = Vec::new();
                $( dependencies.extend($ty::dependencies()); )*
                dependencies
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
