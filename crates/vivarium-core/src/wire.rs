// SPDX-License-Identifier: Apache-2.0
//! Canonical byte encoding for a [`crate::profile::Profile`] (supplemented
//! feature, see SPEC_FULL.md — grounded on
//! `echo-session-proto::canonical`'s determinism principle: identical
//! logical content must always produce identical bytes).
//!
//! Unlike `canonical`'s hand-rolled CBOR encoder, this module leans on
//! `serde_json` plus the fact that every map-shaped type in this crate is
//! backed by a `BTreeMap` (sorted keys) and every struct has a fixed field
//! order. That combination already gives byte-for-byte determinism without
//! re-implementing a canonical CBOR writer, which this crate's scope does
//! not otherwise need.

use crate::profile::Profile;
use thiserror::Error;

/// Errors from canonical encoding/decoding.
#[derive(Debug, Error)]
pub enum WireError {
    /// The profile could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode a profile to its canonical byte representation.
pub fn canonical_bytes(profile: &Profile) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(profile)?)
}

/// Decode a profile from its canonical byte representation.
pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Profile, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Whether `a` and `b` encode identically — the basis for skipping a
/// remote round trip when a merge produced no real change.
#[must_use]
pub fn encodes_identically(a: &Profile, b: &Profile) -> bool {
    matches!((canonical_bytes(a), canonical_bytes(b)), (Ok(x), Ok(y)) if x == y)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ids::UserId;

    #[test]
    fn round_trips() {
        let p = Profile::seeded(UserId::new(5), &[("f", 0.25)]);
        let bytes = canonical_bytes(&p).unwrap();
        let back = from_canonical_bytes(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn identical_content_encodes_identically_regardless_of_construction_order() {
        let mut a = Profile::seeded(UserId::new(1), &[]);
        a.stats.set_standing("x", 0.1);
        a.stats.set_standing("y", 0.2);

        let mut b = Profile::seeded(UserId::new(1), &[]);
        b.stats.set_standing("y", 0.2);
        b.stats.set_standing("x", 0.1);

        assert!(encodes_identically(&a, &b));
    }

    #[test]
    fn differing_content_does_not_encode_identically() {
        let mut a = Profile::seeded(UserId::new(1), &[]);
        let b = Profile::seeded(UserId::new(1), &[]);
        a.core.coins = 5;
        assert!(!encodes_identically(&a, &b));
    }
}
