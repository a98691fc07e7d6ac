use std::sync::Arc;
use structured_log_emitter::config::EmitterConfig;
use structured_log_emitter::console::ConsoleSink;
use structured_log_emitter::emitter::LogEmitter;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() {
    // Events raised before attach are buffered, the way a framework
    // buffers startup logs until the real logger is wired in.
    let logger = LogEmitter::new(EmitterConfig::local());

    logger.info("registering modules").source("Bootstrap").emit();
    logger.info("wiring dependencies").source("Bootstrap").emit();
    logger
        .debug("listening on {port}")
        .property("port", 3000)
        .source("Bootstrap")
        .emit();

    assert!(!logger.is_attached());

    // Attaching flushes the three buffered events in submission order;
    // everything after transmits immediately.
    logger.attach(Arc::new(ConsoleSink));

    logger.info("application ready").source("Bootstrap").emit();

    sleep(Duration::from_secs(1)).await;
}
