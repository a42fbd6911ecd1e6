// SPDX-License-Identifier: Apache-2.0
//! In-memory fakes shared across the workspace's test suites: a
//! [`RemoteKv`](vivarium_store::RemoteKv) implementation, a
//! [`ProfileStore`](vivarium_store::ProfileStore) implementation, an
//! [`EventBus`](vivarium_core::EventBus) recorder, and a
//! [`LiveWorldPort`](vivarium_core::LiveWorldPort) fake — modeled on
//! `echo-cas::MemoryTier`'s plain-map-behind-a-struct style.

mod events;
mod kv;
mod live;
mod store;

pub use events::RecordingEventBus;
pub use kv::InMemoryKv;
pub use live::FakeLiveWorld;
pub use store::InMemoryProfileStore;
