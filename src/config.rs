use std::collections::BTreeMap;

/// Environment variable names used to configure the emitter at process
/// start.
///
/// These are purely helpers for bootstrap code; the emitter itself remains
/// decoupled from environment access.

/// Remote collector ingestion endpoint, e.g. `http://127.0.0.1:5341/events`.
pub const LOG_EMITTER_ENDPOINT_ENV: &str = "LOG_EMITTER_ENDPOINT";

/// API key sent with every transmitted event. Optional; an empty value
/// means the collector accepts unauthenticated writes.
pub const LOG_EMITTER_API_KEY_ENV: &str = "LOG_EMITTER_API_KEY";

/// Optional logical service name, merged into every event's metadata.
pub const LOG_EMITTER_SERVICE_NAME_ENV: &str = "LOG_EMITTER_SERVICE_NAME";

/// Optional flag ("1"/"true"/"yes") that installs the emitter process-wide
/// as the global `tracing` subscriber during bootstrap.
pub const LOG_EMITTER_GLOBAL_SCOPE_ENV: &str = "LOG_EMITTER_GLOBAL_SCOPE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Error type returned when required configuration is absent at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEndpoint(&'static str),
}

/// Emitter configuration, created once at process start and immutable for
/// the process lifetime.
#[derive(Clone, Debug)]
pub struct EmitterConfig {
    /// Full ingestion URL of the remote collector.
    pub endpoint_url: String,
    /// API key for the collector; empty means unauthenticated.
    pub api_key: String,
    /// Extra metadata merged into every transmitted event, e.g. a service
    /// name for categorization in a multi-service environment.
    pub extra_metadata: BTreeMap<String, String>,
    /// When set, bootstrap installs the emitter as the global `tracing`
    /// subscriber so framework-level events reach the collector too.
    pub is_global_scope: bool,
}

impl EmitterConfig {
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        EmitterConfig {
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
            extra_metadata: BTreeMap::new(),
            is_global_scope: false,
        }
    }

    /// Configuration for a console-only emitter with no remote collector.
    ///
    /// Used by the bootstrap fallback path; the endpoint is empty and must
    /// never be handed to a network sink.
    pub fn local() -> Self {
        EmitterConfig::new("", "")
    }

    /// Build the configuration from process environment variables.
    ///
    /// **Returns**
    /// - `Ok(config)` when [`LOG_EMITTER_ENDPOINT_ENV`] is set and
    ///   non-empty.
    /// - `Err(ConfigError::MissingEndpoint)` otherwise. This is the single
    ///   startup-time failure; it is never surfaced per log call.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration through an arbitrary lookup function.
    ///
    /// `from_env` delegates here; tests use it with a plain map so they
    /// never mutate the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint_url = get(LOG_EMITTER_ENDPOINT_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEndpoint(LOG_EMITTER_ENDPOINT_ENV))?;

        let api_key = get(LOG_EMITTER_API_KEY_ENV).unwrap_or_default();

        let mut extra_metadata = BTreeMap::new();
        if let Some(service_name) = get(LOG_EMITTER_SERVICE_NAME_ENV) {
            if !service_name.is_empty() {
                extra_metadata.insert("service_name".to_string(), service_name);
            }
        }

        let is_global_scope = get(LOG_EMITTER_GLOBAL_SCOPE_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(EmitterConfig {
            endpoint_url,
            api_key,
            extra_metadata,
            is_global_scope,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
