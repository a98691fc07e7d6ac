use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Severity of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Level::Debug => "Debug",
            Level::Info => "Info",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        };
        f.write_str(name)
    }
}

/// An error value normalized at the call site.
///
/// Only the type name, the display message and the `source()` chain are
/// captured; nothing runtime-internal travels with the event.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedError {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl CapturedError {
    /// Normalize any error value into a [`CapturedError`].
    ///
    /// The `source()` chain, if present, is flattened into the
    /// `stack_trace` slot, one cause per line.
    pub fn capture<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        CapturedError {
            type_name: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            stack_trace: if causes.is_empty() { None } else { Some(causes.join("\n")) },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message_template: String,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub error: Option<CapturedError>,
    pub source_context: Option<String>,
}

impl LogEvent {
    /// Create an event stamped with the current UTC time and an empty
    /// property bag.
    pub fn new(level: Level, message_template: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            message_template: message_template.into(),
            properties: BTreeMap::new(),
            error: None,
            source_context: None,
        }
    }

    /// Render the message template against the event's own property bag.
    pub fn rendered_message(&self) -> String {
        crate::template::render(&self.message_template, &self.properties)
    }
}
