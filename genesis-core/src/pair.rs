//! Canonical combination keys.
//!
//! Combining A with B is the same discovery as combining B with A, so every
//! pair of concept ids is normalized into one key before anything else
//! looks at it. The key doubles as the id of the concept it produces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between the two sorted ids.
pub const KEY_SEPARATOR: char = '-';

/// Order-independent identifier for an unordered pair of concept ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinationKey(String);

impl CombinationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Recover the key from the id of a derived concept.
    ///
    /// Derived ids are keys, so any id containing the separator is one.
    pub(crate) fn from_derived_id(id: &str) -> Option<Self> {
        id.contains(KEY_SEPARATOR).then(|| CombinationKey(id.to_string()))
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CombinationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CombinationKey> for String {
    fn from(key: CombinationKey) -> Self {
        key.0
    }
}

/// Normalize two concept ids into their combination key.
///
/// The ids are ordered lexicographically (byte order) and joined with
/// [`KEY_SEPARATOR`]. Self-combination is allowed: `canonicalize("water",
/// "water")` is `"water-water"`.
///
/// Derived ids contain the separator themselves, so distinct pairs can share
/// a key: `("air-fire", "water")` and `("air", "fire-water")` both map to
/// `"air-fire-water"`. The store treats the later pair as already known.
pub fn canonicalize(a: &str, b: &str) -> CombinationKey {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let mut key = String::with_capacity(first.len() + second.len() + 1);
    key.push_str(first);
    key.push(KEY_SEPARATOR);
    key.push_str(second);
    CombinationKey(key)
}
