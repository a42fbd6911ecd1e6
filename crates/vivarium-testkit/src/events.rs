// SPDX-License-Identifier: Apache-2.0
//! In-memory [`EventBus`] fake that records every published event for test
//! assertions.

use std::sync::Mutex;
use vivarium_core::{EventBus, LocalEvent};

/// Records every published event in arrival order.
pub struct RecordingEventBus {
    events: Mutex<Vec<LocalEvent>>,
}

impl RecordingEventBus {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    /// Snapshot of every event published so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<LocalEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of events published so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no events have been published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordingEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: LocalEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}
