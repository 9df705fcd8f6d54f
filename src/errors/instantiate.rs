use crate::Key;

#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("`{key}` can't be instantiated: no constructor is registered for it")]
    NotInstantiable { key: Key },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
