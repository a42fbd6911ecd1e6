// SPDX-License-Identifier: Apache-2.0
//! Config store/service for Vivarium services.
//!
//! Split into a storage port ([`ConfigStore`]) and a typed service
//! ([`ConfigService`]) layered on top, plus a filesystem-backed
//! implementation ([`FsConfigStore`]) — generalized directly from
//! `echo-app-core::config` + `echo-config-fs::FsConfigStore`.

mod fs;
mod store;

pub use fs::FsConfigStore;
pub use store::{ConfigError, ConfigService, ConfigStore};
