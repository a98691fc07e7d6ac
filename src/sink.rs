use crate::event::LogEvent;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogEvent`]s accepted by the emitter.
///
/// Implementations transport events to a concrete destination (the remote
/// collector, the local console, a test recorder). The emitter calls `send`
/// from its background dispatch task and never awaits it on the thread that
/// raised the event.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Transmit a single event.
    ///
    /// **Parameters**
    /// - `event`: fully-populated [`LogEvent`] taken off the dispatch queue.
    ///
    /// **Returns**
    /// - `Ok(())` if the destination accepted the event.
    /// - `Err(..)` on transport failure (network error, rejected auth,
    ///   non-success HTTP status). The emitter treats this as transient and
    ///   retries with backoff before giving the event up to the local
    ///   fallback.
    async fn send(&self, event: &LogEvent) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any destination-side buffering.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
