// SPDX-License-Identifier: Apache-2.0
//! Inventory entries: the sole unit of add/remove for persisted inventory
//! fields (§3). An entry is a mapping from short attribute keys to
//! primitive values, always carrying a durable identifier under one of the
//! well-known id keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Short wire key every persisted entry carries its durable id under,
/// regardless of entity kind (§4.C "Short-key projection" projects every
/// id-bearing live attribute — `SlimeId`, `EggId` — down to this key).
pub const KEY_ENTRY_ID: &str = "id";
/// Well-known attribute key under which tool entries carry their durable id.
pub const KEY_TOOL_UID: &str = "uid";
/// Legacy/alternate attribute key some grant paths use for tool ids.
pub const KEY_TOOL_UID_ALT: &str = "ToolUniqueId";
/// Well-known attribute key under which slime entries carry their durable id.
pub const KEY_SLIME_ID: &str = "SlimeId";
/// Well-known attribute key under which egg entries carry their durable id.
pub const KEY_EGG_ID: &str = "EggId";

/// A primitive attribute value.
///
/// Colors are represented as 6-hex uppercase strings (§4.C "Color
/// encoding") and therefore live under [`AttrValue::Str`]; there is no
/// separate color variant in the persisted shape, matching spec §4.C's
/// description of the on-wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Signed integer (counts, durable ids re-expressed as attributes, timestamps).
    Int(i64),
    /// Floating point (growth/hunger fractions, real-valued scalars).
    Float(f64),
    /// Short string (hex colors, template names, rarity tags).
    Str(String),
    /// Boolean flag (consumable, settled, etc.).
    Bool(bool),
}

impl AttrValue {
    /// View as `i64` if this is an integer (ids and counters are stored as `Int`).
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// View as `u64`, rejecting negative integers.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|v| u64::try_from(v).ok())
    }

    /// View as `f64` if this is a float (also accepts an integer, widened).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// View as `&str` if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// View as `bool` if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}
impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        // Durable ids and counters never need the sign bit; cast is lossless
        // for every value this crate produces internally.
        AttrValue::Int(v as i64)
    }
}
impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}
impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}
impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}
impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// A single persisted inventory entry: a short-key attribute bag.
///
/// Backed by a `BTreeMap` rather than an insertion-ordered map so that two
/// entries with identical logical content always serialize to identical
/// bytes — this is what lets [`crate::wire::canonical_bytes`] detect true
/// no-op writes (§4.C supplement, see SPEC_FULL.md).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InventoryEntry(BTreeMap<String, AttrValue>);

impl InventoryEntry {
    /// Build an entry from an iterator of key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Get an attribute by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    /// Set an attribute, returning the previous value if present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over all attribute pairs in deterministic (sorted-key) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other`'s keys into `self`, keeping `self`'s existing values.
    /// This is the primitive behind `ensureEntryHasId`'s "merge missing
    /// keys only" rule (§4.D).
    pub fn fill_missing_from(&mut self, other: &InventoryEntry) {
        for (k, v) in &other.0 {
            self.0.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    /// Resolve this entry's durable id by checking each of the plausible
    /// id-key names in turn (tool uid, tool uid alt, slime id, egg id, a
    /// generic "id"). Mirrors the Sale Pipeline's defensive id-key probing
    /// (§4.H step 5) generalized into a shared lookup.
    #[must_use]
    pub fn resolve_id(&self, candidate_keys: &[&str]) -> Option<u64> {
        candidate_keys.iter().find_map(|k| self.get(k).and_then(AttrValue::as_u64))
    }
}
