//! Tracing layer that forwards tracker events to a channel.
//!
//! Background work such as orphan collection reports failures only through
//! `tracing`. This layer turns those events into values a supervisor (or a
//! test) can consume.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// One captured tracing event
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackerEvent {
    /// Event target (module path by default)
    pub target: String,
    /// Log level (INFO, DEBUG, WARN, ERROR)
    pub level: String,
    /// Human-readable message
    pub message: String,
    /// Structured fields from the event
    pub fields: HashMap<String, Value>,
    pub timestamp: String,
}

/// A tracing layer that sends events at or above `min_level` to a channel
pub struct TrackerEventLayer {
    sender: mpsc::UnboundedSender<TrackerEvent>,
    min_level: Level,
}

impl TrackerEventLayer {
    /// Creates a layer and the receiving end of its channel.
    pub fn channel(min_level: Level) -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, min_level }, receiver)
    }
}

impl<S> Layer<S> for TrackerEventLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Levels order by verbosity: ERROR < WARN < INFO < DEBUG < TRACE.
        if *event.metadata().level() > self.min_level {
            return;
        }

        let mut fields = HashMap::new();
        let mut visitor = FieldVisitor(&mut fields);
        event.record(&mut visitor);

        let tracker_event = TrackerEvent {
            target: event.metadata().target().to_string(),
            level: event.metadata().level().to_string(),
            message: fields
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            fields,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        // Non-blocking send - if the receiver is dropped, we just skip
        let _ = self.sender.send(tracker_event);
    }
}

/// Field visitor that extracts tracing event fields into a HashMap
struct FieldVisitor<'a>(&'a mut HashMap<String, Value>);

impl<'a> tracing::field::Visit for FieldVisitor<'a> {
    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(
            field.name().to_string(),
            serde_json::json!(format!("{:?}", value)),
        );
    }
}
