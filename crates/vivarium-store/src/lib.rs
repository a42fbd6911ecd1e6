// SPDX-License-Identifier: Apache-2.0
//! Profile Store Adapter (§4.A): the only component permitted to talk to
//! the remote profile key-value store. Everything above this layer
//! (`vivarium-cache` and up) goes through [`ProfileStore`], never
//! [`RemoteKv`] directly.

mod adapter;
mod error;
mod kv;
mod retry;

pub use adapter::{ProfileMutator, ProfileStore, RemoteProfileStore};
pub use error::{RemoteError, StoreError};
pub use kv::{profile_key, MutateAbort, RemoteKv};
pub use retry::RetryPolicy;
