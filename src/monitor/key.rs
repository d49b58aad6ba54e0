//! Lock identity handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The heap cell whose address is a key's identity.
///
/// `Arc` allocates a control block even for an empty payload, so every
/// `KeyCell` allocation has a distinct, stable address.
#[derive(Debug)]
struct KeyCell;

/// A cheap, cloneable lock identity.
///
/// All monitor state — the lock cell, the waiter queue — is keyed by the
/// identity of a `MonitorKey`. Clones share identity; two keys created by
/// separate [`MonitorKey::new`] calls never collide. Equality and hashing
/// follow identity, so keys can be collected in maps and sets.
///
/// # Example
///
/// ```
/// use pulselock::MonitorKey;
///
/// let key = MonitorKey::new();
/// let alias = key.clone();
/// assert_eq!(key, alias);
/// assert_ne!(key, MonitorKey::new());
/// ```
#[derive(Clone)]
pub struct MonitorKey {
    cell: Arc<KeyCell>,
}

impl MonitorKey {
    /// Creates a key with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: Arc::new(KeyCell),
        }
    }

    /// Returns the identity as an opaque integer.
    ///
    /// Stable for the lifetime of the key (and of any registry entry that
    /// retains a clone of it).
    #[must_use]
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.cell) as usize
    }

    /// Returns whether two keys share the same identity.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Default for MonitorKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for MonitorKey {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl Eq for MonitorKey {}

impl Hash for MonitorKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MonitorKey").field(&self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn clones_share_identity() {
        let key = MonitorKey::new();
        let alias = key.clone();
        assert!(key.same_identity(&alias));
        assert_eq!(key.id(), alias.id());
    }

    #[test]
    fn distinct_keys_differ() {
        let a = MonitorKey::new();
        let b = MonitorKey::new();
        assert!(!a.same_identity(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn keys_hash_by_identity() {
        let key = MonitorKey::new();
        let mut set = HashSet::new();
        set.insert(key.clone());
        assert!(set.contains(&key));
        assert!(!set.contains(&MonitorKey::new()));
    }

    #[test]
    fn identity_outlives_user_clones() {
        // A registry clone keeps the allocation (and thus the address)
        // alive after the user drops their handles.
        let key = MonitorKey::new();
        let retained = key.clone();
        let id = key.id();
        drop(key);
        assert_eq!(retained.id(), id);
    }
}
