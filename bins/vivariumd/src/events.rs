// SPDX-License-Identifier: Apache-2.0
//! Event bus / remote sink wiring: logging-only until a real transport
//! (out of scope, §1) is wired in.

use vivarium_core::{EventBus, LocalEvent, RemoteEventSink, RemoteResult};

/// Logs every local event at DEBUG. Profile-mutating operations already
/// schedule their own saves through `vivarium-cache`; this bus exists so
/// downstream consumers (shop UI refresh, observability) have a single
/// place to subscribe, per §6's "Local event bus (in-process)".
pub struct LoggingEventBus;

impl EventBus for LoggingEventBus {
    fn publish(&self, event: LocalEvent) {
        tracing::debug!(?event, "local event published");
    }
}

/// Logs outbound player-facing results. A real deployment swaps this for
/// an adapter over the actual remote transport (out of scope, §1).
pub struct LoggingRemoteSink;

impl RemoteEventSink for LoggingRemoteSink {
    fn send_result(&self, result: RemoteResult) {
        tracing::debug!(token = %result.request_token, success = result.success, message = %result.message, "remote result");
    }
}
