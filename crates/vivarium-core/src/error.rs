// SPDX-License-Identifier: Apache-2.0
//! Error type shared by profile/inventory operations that live entirely
//! within this crate's data model (as opposed to store/transport errors,
//! which live in their own crates per the ambient error-handling stack).

use thiserror::Error;

/// Errors raised by data-model level operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// An inventory entry had no durable id under any of the field's known
    /// id-key candidates.
    #[error("entry carries no durable id under any known key")]
    MissingId,
    /// A caller passed an unrecognized inventory field name (e.g. from a
    /// deserialized request at a transport boundary).
    #[error("unknown inventory field: {0}")]
    UnknownField(String),
}
