use alloc::{sync::Arc, vec::Vec};
use tracing::debug;

use super::{
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    service::{service_fn, BoxCloneService},
};
use crate::{
    registry::{Concrete, ConcreteKind, Factory},
    Container, Instance, Key,
};

/// Factory of a value whose parameters are resolved from the container.
///
/// Implemented for every closure `FnMut(D1, .., Dn) -> Result<T, E>` where each `Di` is a
/// [`DependencyResolver`] (up to 16 parameters) and `E: Into<InstantiateErrorKind>`.
/// Taking [`Container`] as a parameter gives the factory the container itself.
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;

    #[inline]
    #[must_use]
    fn dependencies() -> Vec<Key> {
        Deps::dependencies()
    }
}

pub(crate) type BoxedCloneInstantiator = BoxCloneService<Container, Instance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

pub(crate) type InstantiatorResult = Result<Instance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Deps>(instantiator: Inst) -> BoxedCloneInstantiator
where
    Inst: Instantiator<Deps> + Send + Sync,
    Deps: DependencyResolver,
{
    BoxCloneService::new(service_fn(move |container: Container| -> InstantiatorResult {
        let dependencies = match Deps::resolve(&container) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let dependency = match instantiator.clone().instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Instantiated");

        Ok(Arc::new(dependency) as Instance)
    }))
}

/// Factory strategy: the closure is called with its resolved parameters whenever the binding needs a value.
///
/// ```
/// use bindery::{factory, Container, Inject, Key};
///
/// struct Transport;
/// struct Mailer(std::sync::Arc<Transport>);
///
/// let container = Container::empty();
/// container.singleton(Key::of::<Transport>(), factory(|| Ok::<_, anyhow::Error>(Transport)));
/// container.bind(
///     Key::of::<Mailer>(),
///     factory(|Inject(transport): Inject<Transport>| Ok::<_, anyhow::Error>(Mailer(transport))),
/// );
///
/// assert!(container.get::<Mailer>().is_ok());
/// ```
#[inline]
#[must_use]
pub fn factory<Inst, Deps>(instantiator: Inst) -> Concrete
where
    Inst: Instantiator<Deps> + Send + Sync,
    Deps: DependencyResolver,
{
    Concrete(ConcreteKind::Factory(Factory {
        instantiator: boxed_instantiator(instantiator),
        dependencies: Inst::dependencies,
    }))
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);
