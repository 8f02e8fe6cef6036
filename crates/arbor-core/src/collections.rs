//! Map aliases used by the scheduler buckets and in-process storage.
//!
//! The `std-hash` feature swaps the ahash-backed maps for the std ones, which
//! is handy when comparing iteration behavior against a reference build.
//! `IndexMap` iterates in insertion order whatever the hasher, so passes over
//! it are reproducible between runs.

#[cfg(feature = "std-hash")]
pub mod map {
    pub type HashMap<K, V> = std::collections::HashMap<K, V>;
    pub type IndexMap<K, V> = indexmap::IndexMap<K, V>;

    #[inline]
    pub fn new<K, V>() -> HashMap<K, V> {
        HashMap::new()
    }

    #[inline]
    pub fn ordered<K, V>() -> IndexMap<K, V> {
        IndexMap::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
    pub type IndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

    #[inline]
    pub fn new<K, V>() -> HashMap<K, V> {
        HashMap::with_hasher(ahash::RandomState::new())
    }

    #[inline]
    pub fn ordered<K, V>() -> IndexMap<K, V> {
        IndexMap::with_hasher(ahash::RandomState::new())
    }
}
