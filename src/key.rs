use alloc::{borrow::Cow, string::String, sync::Arc};
use core::{
    any::{type_name, Any},
    fmt::{self, Display, Formatter},
};

/// Identifier of a binding, an alias or an autowire entry.
///
/// Keys are plain string tokens, so configuration files can name them.
/// [`Key::of`] derives the token from a Rust type, which is what the typed
/// accessors ([`crate::Container::get`], [`crate::Inject`]) use.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Cow<'static, str>);

impl Key {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Key of the type `T`, equal to `core::any::type_name::<T>()`.
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self(Cow::Borrowed(type_name::<T>()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Key {
    #[inline]
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Key {
    #[inline]
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&Key> for Key {
    #[inline]
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// Type-erased value produced by a binding.
pub type Instance = Arc<dyn Any + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::Key;

    struct DemoClass;

    #[test]
    fn test_key_of_type() {
        let key = Key::of::<DemoClass>();

        assert!(key.as_str().ends_with("::DemoClass"));
        assert_eq!(key, Key::of::<DemoClass>());
        assert_ne!(key, Key::of::<u8>());
    }

    #[test]
    fn test_key_from_str_and_string() {
        assert_eq!(Key::from("mailer"), Key::from("mailer".to_owned()));
        assert_eq!(Key::new("mailer").as_str(), "mailer");
    }
}
