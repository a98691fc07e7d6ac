use crate::config::EmitterConfig;
use crate::console;
use crate::event::{CapturedError, Level, LogEvent};
use crate::sink::EventSink;
use serde_json::Value;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

const DEFAULT_BUFFER_CAPACITY: usize = 1024;
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_MAX_SEND_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Where accepted events go. One-way transition: an emitter starts out
/// `Buffering` and becomes `Attached` exactly once.
enum DispatchState {
    Buffering(VecDeque<LogEvent>),
    Attached(mpsc::Sender<LogEvent>),
}

/// Structured log emitter facade.
///
/// Accepts leveled log calls with a message template, an optional property
/// bag and an optional error value. Until [`attach`](LogEmitter::attach) is
/// called the emitter buffers events in submission order; afterwards events
/// are forwarded to a bounded dispatch queue drained by a background task
/// that transmits them through an [`EventSink`]. Emission never awaits the
/// network and nothing on the transmission path can surface to callers.
pub struct LogEmitter {
    config: EmitterConfig,
    buffer_capacity: usize,
    state: Mutex<DispatchState>,
    /// Total events accepted by the emitter.
    pub total_events: Arc<AtomicU64>,
    /// Successfully handed to the dispatch queue.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the dispatch queue was full.
    pub dropped_events: Arc<AtomicU64>,
    /// Dropped from the startup buffer under the drop-oldest policy.
    pub overflow_dropped: Arc<AtomicU64>,
    /// Given up after exhausting transmission retries.
    pub failed_events: Arc<AtomicU64>,
}

impl LogEmitter {
    /// Create a detached emitter with the default startup-buffer capacity.
    pub fn new(config: EmitterConfig) -> Self {
        Self::with_capacity(config, DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a detached emitter with an explicit startup-buffer capacity.
    ///
    /// The buffer holds events raised before [`attach`](LogEmitter::attach);
    /// when it is full the oldest event is dropped and counted in
    /// `overflow_dropped`. A minimal capacity is enforced to avoid
    /// degenerate configurations.
    pub fn with_capacity(config: EmitterConfig, buffer_capacity: usize) -> Self {
        LogEmitter {
            config,
            buffer_capacity: buffer_capacity.max(16),
            state: Mutex::new(DispatchState::Buffering(VecDeque::new())),
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
            overflow_dropped: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The configuration this emitter was constructed with.
    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        matches!(*self.lock_state(), DispatchState::Attached(_))
    }

    /// Start a leveled event. Call [`EventBuilder::emit`] to submit it.
    pub fn event(&self, level: Level, template: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            emitter: self,
            event: LogEvent::new(level, template),
        }
    }

    pub fn debug(&self, template: impl Into<String>) -> EventBuilder<'_> {
        self.event(Level::Debug, template)
    }

    pub fn info(&self, template: impl Into<String>) -> EventBuilder<'_> {
        self.event(Level::Info, template)
    }

    pub fn warning(&self, template: impl Into<String>) -> EventBuilder<'_> {
        self.event(Level::Warning, template)
    }

    pub fn error(&self, template: impl Into<String>) -> EventBuilder<'_> {
        self.event(Level::Error, template)
    }

    pub fn fatal(&self, template: impl Into<String>) -> EventBuilder<'_> {
        self.event(Level::Fatal, template)
    }

    /// Start an `Error`-level event directly from a raw error value.
    ///
    /// The error's display message becomes the message template and the
    /// normalized [`CapturedError`] travels in the event's error block.
    pub fn error_from<E>(&self, error: &E) -> EventBuilder<'_>
    where
        E: std::error::Error + ?Sized,
    {
        let mut event = LogEvent::new(Level::Error, error.to_string());
        event.error = Some(CapturedError::capture(error));
        EventBuilder { emitter: self, event }
    }

    /// Submit a fully-built event.
    ///
    /// Buffers while detached (drop-oldest on overflow), otherwise hands
    /// the event to the dispatch queue without waiting for transmission.
    /// Never blocks on the network and never panics into the caller.
    pub fn emit(&self, event: LogEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut state = self.lock_state();
        match &mut *state {
            DispatchState::Buffering(buffer) => {
                if buffer.len() >= self.buffer_capacity {
                    if let Some(oldest) = buffer.pop_front() {
                        self.overflow_dropped.fetch_add(1, Ordering::Relaxed);
                        console::write_drop_notice(&oldest, "startup buffer full, dropping oldest event");
                    }
                }
                buffer.push_back(event);
            }
            DispatchState::Attached(sender) => match sender.try_send(event) {
                Ok(()) => {
                    self.enqueued_events.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => {
                    self.dropped_events.fetch_add(1, Ordering::Relaxed);
                    console::write_drop_notice(&event, "dispatch queue unavailable, dropping event");
                }
            },
        }
    }

    /// Attach the emitter to a transmitter with default dispatch settings.
    ///
    /// See [`attach_with`](LogEmitter::attach_with).
    pub fn attach(&self, sink: Arc<dyn EventSink>) -> Option<JoinHandle<()>> {
        self.attach_with(
            sink,
            DEFAULT_CHANNEL_CAPACITY,
            DEFAULT_MAX_SEND_ATTEMPTS,
            DEFAULT_RETRY_BACKOFF,
            false,
        )
    }

    /// Attach the emitter to a transmitter and flush the startup buffer.
    ///
    /// **Parameters**
    /// - `sink`: destination for every subsequent (and buffered) event.
    /// - `channel_capacity`: size of the bounded dispatch queue.
    /// - `max_send_attempts`: transmission attempts per event before it is
    ///   given up to the local fallback.
    /// - `retry_backoff`: initial backoff between attempts; doubles per
    ///   retry, capped at 10s.
    /// - `echo_to_console`: additionally write every dispatched event to
    ///   the local console.
    ///
    /// **Effects**
    ///
    /// Spawns the background dispatch task, so this must be called from
    /// within a Tokio runtime. The startup buffer is drained into the
    /// queue in submission order before
    /// any new event can enter it. The transition is one-way and idempotent:
    /// a second call changes nothing and returns `None`, so already-flushed
    /// events are never flushed twice.
    ///
    /// Minimal thresholds are enforced for `channel_capacity`,
    /// `max_send_attempts` and `retry_backoff` to avoid degenerate
    /// configurations.
    pub fn attach_with(
        &self,
        sink: Arc<dyn EventSink>,
        channel_capacity: usize,
        max_send_attempts: usize,
        retry_backoff: Duration,
        echo_to_console: bool,
    ) -> Option<JoinHandle<()>> {
        let channel_capacity = channel_capacity.max(16);
        let max_send_attempts = max_send_attempts.max(1);
        let retry_backoff = if retry_backoff < Duration::from_millis(10) {
            Duration::from_millis(10)
        } else {
            retry_backoff
        };

        let mut state = self.lock_state();
        let buffer = match &mut *state {
            DispatchState::Attached(_) => {
                eprintln!("log emitter already attached, ignoring");
                return None;
            }
            DispatchState::Buffering(buffer) => std::mem::take(buffer),
        };

        let (tx, rx) = mpsc::channel::<LogEvent>(channel_capacity);

        let failed_events_bg = Arc::clone(&self.failed_events);
        let handle = spawn_dispatch(
            sink,
            rx,
            max_send_attempts,
            retry_backoff,
            echo_to_console,
            failed_events_bg,
        );

        // Drain the startup buffer in FIFO order while still holding the
        // state lock, so no new event can overtake a buffered one.
        for event in buffer {
            match tx.try_send(event) {
                Ok(()) => {
                    self.enqueued_events.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => {
                    self.dropped_events.fetch_add(1, Ordering::Relaxed);
                    console::write_drop_notice(&event, "dispatch queue full during startup flush");
                }
            }
        }

        *state = DispatchState::Attached(tx);
        Some(handle)
    }

    fn lock_state(&self) -> MutexGuard<'_, DispatchState> {
        // A caller panicking mid-log must not poison logging for everyone
        // else.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn spawn_dispatch(
    sink: Arc<dyn EventSink>,
    mut rx: mpsc::Receiver<LogEvent>,
    max_send_attempts: usize,
    retry_backoff: Duration,
    echo_to_console: bool,
    failed_events: Arc<AtomicU64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if echo_to_console {
                console::write_event(&event);
            }
            if let Err(e) = send_with_retry(&*sink, &event, max_send_attempts, retry_backoff).await {
                failed_events.fetch_add(1, Ordering::Relaxed);
                console::write_drop_notice(&event, &format!("transmission abandoned: {}", e));
            }
        }
    })
}

/// One collector call per event, retried with exponential backoff until
/// `max_send_attempts` is exhausted.
async fn send_with_retry(
    sink: &dyn EventSink,
    event: &LogEvent,
    max_send_attempts: usize,
    mut backoff: Duration,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut attempts = 0;
    loop {
        match sink.send(event).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempts += 1;
                if attempts >= max_send_attempts {
                    return Err(e);
                }
                eprintln!("log sink send failed, retrying in {:?}", backoff);
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_RETRY_BACKOFF);
            }
        }
    }
}

/// Builder for one [`LogEvent`]; created by the leveled methods on
/// [`LogEmitter`].
#[must_use = "an event does nothing until .emit() is called"]
pub struct EventBuilder<'a> {
    emitter: &'a LogEmitter,
    event: LogEvent,
}

impl EventBuilder<'_> {
    /// Attach a single named property.
    ///
    /// Values that fail to serialize degrade to `null` rather than erroring
    /// back into the caller.
    pub fn property(mut self, name: impl Into<String>, value: impl serde::Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.event.properties.insert(name.into(), value);
        self
    }

    /// Merge a JSON object into the property bag. Non-object values are
    /// ignored.
    pub fn properties(mut self, bag: Value) -> Self {
        if let Value::Object(map) = bag {
            for (name, value) in map {
                self.event.properties.insert(name, value);
            }
        }
        self
    }

    /// Attach a normalized error block captured from a raw error value.
    pub fn error<E>(mut self, error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        self.event.error = Some(CapturedError::capture(error));
        self
    }

    /// Name the component the event originates from.
    pub fn source(mut self, context: impl Into<String>) -> Self {
        self.event.source_context = Some(context.into());
        self
    }

    /// Submit the event to the emitter.
    pub fn emit(self) {
        self.emitter.emit(self.event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_emitter(buffer_capacity: usize) -> LogEmitter {
        LogEmitter::with_capacity(EmitterConfig::local(), buffer_capacity)
    }

    fn buffered_templates(emitter: &LogEmitter) -> Vec<String> {
        match &*emitter.lock_state() {
            DispatchState::Buffering(buffer) => {
                buffer.iter().map(|e| e.message_template.clone()).collect()
            }
            DispatchState::Attached(_) => panic!("emitter unexpectedly attached"),
        }
    }

    #[test]
    fn builder_collects_properties_error_and_source() {
        let emitter = test_emitter(16);
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");

        emitter
            .warning("widget {id} misbehaved")
            .property("id", 7)
            .properties(json!({"region": "eu", "id": 8}))
            .error(&io_err)
            .source("WidgetService")
            .emit();

        let state = emitter.lock_state();
        let buffer = match &*state {
            DispatchState::Buffering(buffer) => buffer,
            DispatchState::Attached(_) => panic!("emitter unexpectedly attached"),
        };
        let event = &buffer[0];
        // properties() merged after property(), so the later value wins.
        assert_eq!(event.properties["id"], json!(8));
        assert_eq!(event.properties["region"], json!("eu"));
        assert_eq!(event.level, Level::Warning);
        assert_eq!(event.source_context.as_deref(), Some("WidgetService"));
        let error = event.error.as_ref().expect("error block");
        assert_eq!(error.message, "boom");
    }

    #[test]
    fn error_from_uses_message_as_template() {
        let emitter = test_emitter(16);
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");

        emitter.error_from(&io_err).source("AppController").emit();

        let state = emitter.lock_state();
        let buffer = match &*state {
            DispatchState::Buffering(buffer) => buffer,
            DispatchState::Attached(_) => panic!("emitter unexpectedly attached"),
        };
        let event = &buffer[0];
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.message_template, "disk on fire");
        assert!(event.error.is_some());
    }

    #[test]
    fn startup_buffer_drops_oldest_on_overflow() {
        // Capacities below 16 are clamped up, so fill past 16.
        let emitter = test_emitter(16);
        for i in 0..20 {
            emitter.info(format!("event {}", i)).emit();
        }

        let templates = buffered_templates(&emitter);
        assert_eq!(templates.len(), 16);
        assert_eq!(templates.first().map(String::as_str), Some("event 4"));
        assert_eq!(templates.last().map(String::as_str), Some("event 19"));
        assert_eq!(emitter.overflow_dropped.load(Ordering::Relaxed), 4);
        assert_eq!(emitter.total_events.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn buffered_events_keep_submission_order() {
        let emitter = test_emitter(16);
        emitter.info("first").emit();
        emitter.debug("second").emit();
        emitter.error("third").emit();

        assert_eq!(buffered_templates(&emitter), vec!["first", "second", "third"]);
    }
}
