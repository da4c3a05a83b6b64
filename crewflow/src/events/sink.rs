//! Event sinks.

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives run and stage lifecycle events.
///
/// Emission must never fail or block for long: a sink that cannot record
/// an event drops it.
pub trait EventSink: Send + Sync {
    /// Records `event_type` (e.g. `stage.completed`) with optional data.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Logs events through `tracing`, lifting the run id, topic and stage into
/// log fields.
///
/// `*.failed` events are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Logs non-failure events at `level` (`DEBUG` or `INFO`).
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        let field = |key: &str| {
            data.as_ref()
                .and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let run_id = field("pipeline_run_id");
        let topic = field("topic");
        let stage = field("stage");

        if event_type.ends_with(".failed") {
            warn!(
                event = event_type,
                %run_id,
                %topic,
                %stage,
                error = %field("error"),
                cause = %field("cause"),
                "Run event"
            );
        } else if self.level == Level::DEBUG {
            debug!(event = event_type, %run_id, %topic, %stage, data = ?data, "Run event");
        } else {
            info!(event = event_type, %run_id, %topic, %stage, "Run event");
        }
    }
}

/// Keeps every event in memory. Tests assert on it and the dashboard
/// reads stage progress from it for a single request.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// `(stage, event suffix)` pairs for every `stage.*` event, in
    /// emission order. `("research", "completed")` for example.
    #[must_use]
    pub fn stage_progress(&self) -> Vec<(String, String)> {
        self.events
            .read()
            .iter()
            .filter_map(|(event_type, data)| {
                let suffix = event_type.strip_prefix("stage.")?;
                let stage = data.as_ref()?.get("stage")?.as_str()?;
                Some((stage.to_string(), suffix.to_string()))
            })
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}
