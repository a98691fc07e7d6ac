use crate::emitter::LogEmitter;
use crate::event::{Level, LogEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that forwards `tracing` events into a shared
/// [`LogEmitter`].
///
/// This is how the emitter takes over process-wide logging: installed as
/// (part of) the global subscriber, every `tracing` macro call in the
/// process becomes a structured [`LogEvent`] with the event's fields as the
/// property bag and its target as the source context. The events then
/// follow the same buffer/dispatch path as direct emitter calls.
pub struct EmitterLayer {
    emitter: Arc<LogEmitter>,
}

impl EmitterLayer {
    pub fn new(emitter: Arc<LogEmitter>) -> Self {
        EmitterLayer { emitter }
    }
}

fn map_level(level: &tracing::Level) -> Level {
    if *level == tracing::Level::ERROR {
        Level::Error
    } else if *level == tracing::Level::WARN {
        Level::Warning
    } else if *level == tracing::Level::INFO {
        Level::Info
    } else {
        // TRACE has no counterpart; it folds into Debug.
        Level::Debug
    }
}

impl<S> Layer<S> for EmitterLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let mut properties = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor {
            properties: &mut properties,
            message: &mut message,
        };
        event.record(&mut visitor);

        let meta = event.metadata();
        let mut log_event = LogEvent::new(
            map_level(meta.level()),
            message.unwrap_or_default(),
        );
        log_event.properties = properties;
        log_event.source_context = Some(meta.target().to_string());

        self.emitter.emit(log_event);
    }
}

struct FieldVisitor<'a> {
    properties: &'a mut BTreeMap<String, serde_json::Value>,
    message: &'a mut Option<String>,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.properties
                .insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.properties.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.properties.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.properties.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.properties.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.properties
                .insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
