use crate::event::LogEvent;
use crate::sink::EventSink;
use async_trait::async_trait;
use std::error::Error;

/// Sink that writes every event to the local console.
///
/// This is the fallback destination when the remote collector is not
/// configured, and the echo destination when `echo_to_console` is enabled.
/// Writes go to stderr so they never interleave with application stdout.
#[derive(Clone, Default)]
pub struct ConsoleSink;

#[async_trait]
impl EventSink for ConsoleSink {
    async fn send(&self, event: &LogEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        write_event(event);
        Ok(())
    }
}

/// Write one formatted event line (plus error block, if any) to stderr.
pub fn write_event(event: &LogEvent) {
    eprintln!("{}", format_event(event));
    if let Some(error) = &event.error {
        eprintln!("    {}: {}", error.type_name, error.message);
        if let Some(trace) = &error.stack_trace {
            for line in trace.lines() {
                eprintln!("    {}", line);
            }
        }
    }
}

/// Record locally that an event was dropped, and why.
///
/// This is the "never silently lost" path: the event's rendered message is
/// preserved on stderr together with the drop reason.
pub fn write_drop_notice(event: &LogEvent, reason: &str) {
    eprintln!("log event dropped ({}): {}", reason, format_event(event));
}

fn format_event(event: &LogEvent) -> String {
    let source = event.source_context.as_deref().unwrap_or("-");
    format!(
        "{} {:>7} [{}] {}",
        event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        event.level.to_string(),
        source,
        event.rendered_message()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use serde_json::json;

    #[test]
    fn format_includes_level_source_and_rendered_message() {
        let mut event = LogEvent::new(Level::Info, "hello {who}");
        event.properties.insert("who".to_string(), json!("world"));
        event.source_context = Some("Demo".to_string());

        let line = format_event(&event);
        assert!(line.contains("Info"));
        assert!(line.contains("[Demo]"));
        assert!(line.contains("hello world"));
    }

    #[test]
    fn format_uses_dash_without_source() {
        let event = LogEvent::new(Level::Debug, "plain");
        assert!(format_event(&event).contains("[-]"));
    }
}
