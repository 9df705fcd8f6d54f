use alloc::collections::BTreeMap;
use tracing::debug;

use crate::Key;

/// Alias table redirecting abstract keys (usually interface-like tokens) to concrete ones.
///
/// Lookups follow a single level of indirection: `a -> b` and `b -> c` resolve `a` to `b`, not `c`.
#[derive(Debug, Default, Clone)]
pub(crate) struct DependencyMap {
    aliases: BTreeMap<Key, Key>,
}

impl DependencyMap {
    #[inline]
    #[must_use]
    pub(crate) fn resolve(&self, key: &Key) -> Key {
        self.aliases.get(key).unwrap_or(key).clone()
    }

    /// Later entries override earlier ones on key collision.
    pub(crate) fn merge(&mut self, aliases: impl IntoIterator<Item = (Key, Key)>) {
        for (from, to) in aliases {
            debug!(%from, %to, "Alias registered");
            self.aliases.insert(from, to);
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.aliases.len()
    }
}
