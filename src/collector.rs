use crate::config::EmitterConfig;
use crate::event::{CapturedError, LogEvent};
use crate::sink::EventSink;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

/// Header carrying the collector API key, omitted when no key is
/// configured.
const API_KEY_HEADER: &str = "X-Api-Key";

/// Remote-collector implementation of [`EventSink`] over HTTP.
///
/// Each event becomes one POST to the configured ingestion endpoint,
/// carrying the timestamped record: level, rendered message, raw template,
/// full property bag, optional error block and the configured extra
/// metadata merged in.
#[derive(Clone)]
pub struct HttpCollectorSink {
    client: Client,
    endpoint_url: String,
    api_key: String,
    extra_metadata: BTreeMap<String, String>,
}

impl HttpCollectorSink {
    /// Construct a sink from the emitter configuration.
    ///
    /// **Parameters**
    /// - `config`: [`EmitterConfig`] with a non-empty `endpoint_url`.
    ///
    /// **Returns**
    /// - A ready-to-use [`HttpCollectorSink`] that can be passed to
    ///   [`LogEmitter::attach`](crate::emitter::LogEmitter::attach).
    pub fn new(config: &EmitterConfig) -> Self {
        HttpCollectorSink {
            client: Client::new(),
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
            extra_metadata: config.extra_metadata.clone(),
        }
    }

    fn map_event(&self, event: &LogEvent) -> CollectorEvent {
        CollectorEvent {
            timestamp: event.timestamp.to_rfc3339(),
            level: event.level.to_string(),
            message: event.rendered_message(),
            template: event.message_template.clone(),
            properties: event.properties.clone(),
            error: event.error.clone(),
            source_context: event.source_context.clone(),
            metadata: self.extra_metadata.clone(),
        }
    }
}

/// Wire form of one transmitted event.
#[derive(Serialize)]
struct CollectorEvent {
    timestamp: String,
    level: String,
    message: String,
    template: String,
    properties: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CapturedError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_context: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

#[async_trait]
impl EventSink for HttpCollectorSink {
    async fn send(&self, event: &LogEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        let body = self.map_event(event);

        let mut request = self.client.post(&self.endpoint_url).json(&body);
        if !self.api_key.is_empty() {
            request = request.header(API_KEY_HEADER, &self.api_key);
        }

        let resp = request.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("collector ingestion failed with status {}: {}", status, text).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use serde_json::json;

    fn sink_with_metadata() -> HttpCollectorSink {
        let mut config = EmitterConfig::new("http://collector:5341/events", "secret");
        config
            .extra_metadata
            .insert("service_name".to_string(), "product-service".to_string());
        HttpCollectorSink::new(&config)
    }

    #[test]
    fn payload_renders_template_and_keeps_raw_parts() {
        let mut event = LogEvent::new(Level::Debug, "Retrieving result from {name}");
        event.properties.insert("name".to_string(), json!("AppService"));
        event.properties.insert("result".to_string(), json!("Hello World!"));

        let payload = serde_json::to_value(sink_with_metadata().map_event(&event)).unwrap();

        assert_eq!(payload["message"], json!("Retrieving result from AppService"));
        assert_eq!(payload["template"], json!("Retrieving result from {name}"));
        // Properties not referenced by the template still travel with the
        // event for querying.
        assert_eq!(payload["properties"]["result"], json!("Hello World!"));
        assert_eq!(payload["level"], json!("Debug"));
        assert_eq!(payload["metadata"]["service_name"], json!("product-service"));
    }

    #[test]
    fn payload_includes_error_block() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "whimsically wrong");
        let mut event = LogEvent::new(Level::Error, "handler failed");
        event.error = Some(crate::event::CapturedError::capture(&io_err));
        event.source_context = Some("AppController".to_string());

        let payload = serde_json::to_value(sink_with_metadata().map_event(&event)).unwrap();

        assert_eq!(payload["error"]["message"], json!("whimsically wrong"));
        assert!(payload["error"]["type"].as_str().is_some_and(|t| !t.is_empty()));
        assert_eq!(payload["source_context"], json!("AppController"));
    }

    #[test]
    fn payload_omits_empty_optional_blocks() {
        let event = LogEvent::new(Level::Info, "plain");
        let config = EmitterConfig::new("http://collector:5341/events", "");
        let payload =
            serde_json::to_value(HttpCollectorSink::new(&config).map_event(&event)).unwrap();

        assert!(payload.get("error").is_none());
        assert!(payload.get("source_context").is_none());
        assert!(payload.get("metadata").is_none());
    }
}
