//! Post-commit fan-out of costing events.
//!
//! Publication happens strictly after commit. Failures are logged and never
//! undo the committed change.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use tradeerp_events::{CostingEvent, EventBus, EventEnvelope, HookRegistry, PostCommitHook};

/// Object-safe view of an [`EventBus`] carrying JSON envelopes.
pub trait EnvelopeSink: Send + Sync {
    fn publish_envelope(&self, envelope: EventEnvelope<JsonValue>) -> Result<(), String>;
}

impl<B> EnvelopeSink for B
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn publish_envelope(&self, envelope: EventEnvelope<JsonValue>) -> Result<(), String> {
        self.publish(envelope).map_err(|err| format!("{err:?}"))
    }
}

/// Delivers committed events to hooks (in registration order), then to sinks.
#[derive(Default)]
pub struct CommitNotifier {
    hooks: HookRegistry<CostingEvent>,
    sinks: Vec<Arc<dyn EnvelopeSink>>,
}

impl CommitNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_hook(&mut self, hook: Arc<dyn PostCommitHook<CostingEvent>>) {
        self.hooks.register(hook);
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EnvelopeSink>) {
        self.sinks.push(sink);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn dispatch(&self, events: Vec<CostingEvent>) {
        for event in events {
            self.hooks.notify(&event);

            if self.sinks.is_empty() {
                continue;
            }
            let envelope = match EventEnvelope::from_typed(&event) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(error = %err, ?event, "failed to serialize costing event");
                    continue;
                }
            };
            for sink in &self.sinks {
                if let Err(err) = sink.publish_envelope(envelope.clone()) {
                    warn!(error = %err, event_type = envelope.event_type(), "event publication failed");
                }
            }
        }
    }
}

impl core::fmt::Debug for CommitNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommitNotifier")
            .field("hooks", &self.hooks.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
