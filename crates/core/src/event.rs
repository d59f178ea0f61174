// SPDX-License-Identifier: MIT

//! Observer bus: structured change events for external subscribers.
//!
//! Every applied data-model mutation and every execution status edge emits
//! one [`ChangeEvent`]. The core never consumes its own events; they exist
//! for the editor, history and persistence collaborators. Subscribers must
//! not block the emitter; the channel subscription uses an unbounded
//! crossbeam channel so delivery is always non-blocking.

use crate::path::StatePath;
use crate::value::Value;
use parking_lot::RwLock;
use serde::Serialize;
use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What part of the model an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    State,
    InputPort,
    OutputPort,
    Outcome,
    Transition,
    DataFlow,
    ScopedVariable,
    Execution,
}

crate::simple_display! {
    ChangeKind {
        State => "state",
        InputPort => "input_port",
        OutputPort => "output_port",
        Outcome => "outcome",
        Transition => "transition",
        DataFlow => "data_flow",
        ScopedVariable => "scoped_variable",
        Execution => "execution",
    }
}

/// One observed mutation: `(subject, property, before/after, info)`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// Path of the state the change happened on.
    pub subject: StatePath,
    pub kind: ChangeKind,
    /// Operation or field name, e.g. `add_state` or `status`.
    pub property: SmolStr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl ChangeEvent {
    pub fn new(subject: StatePath, kind: ChangeKind, property: impl Into<SmolStr>) -> Self {
        Self { subject, kind, property: property.into(), before: None, after: None, info: None }
    }

    pub fn with_before(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: Value) -> Self {
        self.after = Some(after);
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

/// Handle for removing a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriberId,
    /// `None` subscribes to every kind.
    kinds: Option<Vec<ChangeKind>>,
    callback: Callback,
}

/// Fan-out of change events to registered subscribers.
///
/// Callbacks run on the emitting thread in registration order; a
/// panicking subscriber is dropped and logged.
#[derive(Default)]
pub struct ObserverBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ObserverBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverBus").field("subscribers", &self.subscribers.read().len()).finish()
    }
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for the given kinds (empty slice = all kinds).
    pub fn subscribe(
        &self,
        kinds: &[ChangeKind],
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let kinds = if kinds.is_empty() { None } else { Some(kinds.to_vec()) };
        self.subscribers.write().push(Subscriber { id, kinds, callback: Arc::new(callback) });
        id
    }

    /// Register a channel subscription; the receiver side never blocks the
    /// emitter.
    pub fn channel(&self, kinds: &[ChangeKind]) -> (SubscriberId, crossbeam_channel::Receiver<ChangeEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.subscribe(kinds, move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    /// Remove a subscription; returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Deliver an event to every matching subscriber.
    pub fn emit(&self, event: ChangeEvent) {
        let matching: Vec<(SubscriberId, Callback)> = {
            let subscribers = self.subscribers.read();
            subscribers
                .iter()
                .filter(|s| match &s.kinds {
                    None => true,
                    Some(kinds) => kinds.contains(&event.kind),
                })
                .map(|s| (s.id, Arc::clone(&s.callback)))
                .collect()
        };
        for (id, callback) in matching {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&event);
            }));
            if outcome.is_err() {
                tracing::warn!(subject = %event.subject, property = %event.property, "dropping panicking observer");
                self.unsubscribe(id);
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
