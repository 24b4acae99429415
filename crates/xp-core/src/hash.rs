//! Fx-hashed map alias used for the workspace's internal indexes.
//!
//! The class registry indexes declarations by code file and by type name,
//! and view-model bindings are keyed by type name. All keys are short,
//! trusted strings, so the `rustc-hash` Fx hasher is used instead of SipHash.
//!
//! # Examples
//!
//! ```
//! use xp_core::{FxHashMap, fx_hash_map};
//!
//! let mut by_type: FxHashMap<String, usize> = fx_hash_map();
//! by_type.insert("Demo.MainPage".to_owned(), 0);
//! assert_eq!(by_type.get("Demo.MainPage"), Some(&0));
//! ```

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
///
/// Not resistant to hash flooding; keys must not come from the network.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Creates an empty [`FxHashMap`].
#[inline]
#[must_use]
pub fn fx_hash_map<K, V>() -> FxHashMap<K, V> {
    FxHashMap::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_type_name() {
        let mut map: FxHashMap<&str, usize> = fx_hash_map();
        map.insert("Demo.MainPage", 0);
        map.insert("Demo.DetailPage", 1);
        assert_eq!(map.get("Demo.DetailPage"), Some(&1));
        assert_eq!(map.get("Demo.Missing"), None);
    }
}
