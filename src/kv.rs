//! The abstract byte-oriented backing store and its prefix-scoped views.
//!
//! The trie does not own a storage engine; it writes through any [`KvStore`].
//! Methods take `&self` and implementations provide interior mutability, so a
//! store can be shared between the trie state and other readers without
//! threading mutable borrows through every call site.

/// A mutable byte-string to byte-string map.
///
/// The empty key is valid and always usable (the trie root lives there).
/// Values are opaque and copied on `set`; the caller may reuse its buffer.
pub trait KvStore {
    /// Inserts or replaces the value under `key`, copying `value`.
    fn set(&self, key: &[u8], value: &[u8]);

    /// Removes `key`. Removing an absent key is a no-op.
    fn del(&self, key: &[u8]);

    /// Returns a copy of the value under `key`, if present.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Whether `key` is present.
    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All keys in ascending byte order.
    fn keys(&self) -> Vec<Vec<u8>>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A view of this store whose keys are transparently prefixed.
    fn partition(&self, prefix: impl Into<Vec<u8>>) -> Partition<'_, Self>
    where
        Self: Sized,
    {
        Partition::new(self, prefix)
    }
}

/// A view of a store whose keys are transparently prefixed.
///
/// Every operation concatenates the prefix and forwards to the underlying
/// store; `keys` filters and strips. Partitions are themselves [`KvStore`]s,
/// so nesting composes by further prefix concatenation.
#[derive(Debug, Clone)]
pub struct Partition<'a, S: KvStore + ?Sized> {
    store: &'a S,
    prefix: Vec<u8>,
}

impl<'a, S: KvStore + ?Sized> Partition<'a, S> {
    /// Creates a view of `store` scoped under `prefix`.
    pub fn new(store: &'a S, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl<S: KvStore + ?Sized> KvStore for Partition<'_, S> {
    fn set(&self, key: &[u8], value: &[u8]) {
        self.store.set(&self.full_key(key), value);
    }

    fn del(&self, key: &[u8]) {
        self.store.del(&self.full_key(key));
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(&self.full_key(key))
    }

    fn has(&self, key: &[u8]) -> bool {
        self.store.has(&self.full_key(key))
    }

    fn keys(&self) -> Vec<Vec<u8>> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix[..]).map(<[u8]>::to_vec))
            .collect()
    }

    fn len(&self) -> usize {
        self.store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemStore;

    #[test]
    fn empty_key_is_a_valid_key() {
        let store = MemStore::new();
        store.set(b"", b"root");
        assert!(store.has(b""));
        assert_eq!(store.get(b""), Some(b"root".to_vec()));
        store.set(b"", b"root2");
        assert_eq!(store.get(b""), Some(b"root2".to_vec()));
    }

    #[test]
    fn set_copies_the_value() {
        let store = MemStore::new();
        let mut buf = b"before".to_vec();
        store.set(b"k", &buf);
        buf[0] = b'X';
        assert_eq!(store.get(b"k"), Some(b"before".to_vec()));
    }

    #[test]
    fn keys_are_ordered() {
        let store = MemStore::new();
        for k in [&b"b"[..], b"a", b"ab", b""] {
            store.set(k, b"x");
        }
        assert_eq!(
            store.keys(),
            vec![b"".to_vec(), b"a".to_vec(), b"ab".to_vec(), b"b".to_vec()]
        );
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn partition_scopes_operations() {
        let store = MemStore::new();
        let p1 = store.partition([b'1']);
        let p2 = store.partition([b'2']);

        p1.set(b"k", b"v1");
        p2.set(b"k", b"v2");

        assert_eq!(p1.get(b"k"), Some(b"v1".to_vec()));
        assert_eq!(p2.get(b"k"), Some(b"v2".to_vec()));
        assert_eq!(store.get(b"1k"), Some(b"v1".to_vec()));
        assert_eq!(p1.keys(), vec![b"k".to_vec()]);
        assert_eq!(p1.len(), 1);

        p1.del(b"k");
        assert!(!p1.has(b"k"));
        assert!(p2.has(b"k"));
    }

    #[test]
    fn partitions_nest_by_concatenation() {
        let store = MemStore::new();
        let outer = store.partition([b'o']);
        let inner = outer.partition([b'i']);

        inner.set(b"k", b"v");
        assert_eq!(store.get(b"oik"), Some(b"v".to_vec()));
        assert_eq!(inner.keys(), vec![b"k".to_vec()]);
    }

    #[test]
    fn partition_empty_key() {
        let store = MemStore::new();
        let p = store.partition([b'r']);
        p.set(b"", b"blob");
        assert_eq!(p.get(b""), Some(b"blob".to_vec()));
        assert_eq!(store.get(b"r"), Some(b"blob".to_vec()));
    }
}
