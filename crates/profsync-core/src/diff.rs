//! Set difference and content hashing

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::hash::Hash;

/// Elements of `original` that are absent from `modified`, in `original`'s order
#[must_use]
pub fn array_diff<T>(original: &[T], modified: &[T]) -> Vec<T>
where
    T: Clone + Eq + Hash,
{
    let rest: HashSet<&T> = modified.iter().collect();
    original
        .iter()
        .filter(|element| !rest.contains(element))
        .cloned()
        .collect()
}

/// Like [`array_diff`] but compares elements through a key function
///
/// Used for records that need structural equality on a subset of fields.
#[must_use]
pub fn array_diff_by<T, K, F>(original: &[T], modified: &[T], hasher: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let rest: HashSet<K> = modified.iter().map(&hasher).collect();
    original
        .iter()
        .filter(|element| !rest.contains(&hasher(element)))
        .cloned()
        .collect()
}

/// Hex digest of raw bytes, used only for equality testing
#[must_use]
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
