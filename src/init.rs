use crate::config::EmitterConfig;
use crate::console::ConsoleSink;
use crate::emitter::LogEmitter;
use crate::layer::EmitterLayer;
#[cfg(feature = "http")]
use crate::sink::EventSink;
use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[cfg(feature = "http")]
use crate::collector::HttpCollectorSink;
#[cfg(feature = "http")]
use crate::config::ConfigError;

/// Настройки бутстрапа эмиттера.
///
/// Управляют размером стартового буфера, ёмкостью очереди отправки,
/// политикой повторов при сбоях передачи, а также тем, нужно ли
/// дублировать каждое событие в локальную консоль.
///
/// **Поля**
/// - `buffer_capacity`: максимальное число событий в стартовом буфере до
///   начала дропа самых старых записей.
/// - `channel_capacity`: ёмкость очереди отправки после attach.
/// - `max_send_attempts`: число попыток передачи события до записи в
///   локальный fallback.
/// - `retry_backoff`: начальная задержка между попытками; удваивается до
///   потолка в 10 секунд.
/// - `echo_to_console`: если `true`, каждое отправляемое событие
///   дополнительно печатается в консоль.
#[derive(Clone, Debug)]
pub struct EmitterOptions {
    pub buffer_capacity: usize,
    pub channel_capacity: usize,
    pub max_send_attempts: usize,
    pub retry_backoff: Duration,
    pub echo_to_console: bool,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024,
            channel_capacity: 1024,
            max_send_attempts: 3,
            retry_backoff: Duration::from_millis(100),
            echo_to_console: true,
        }
    }
}

/// Construct an emitter for the given configuration and attach it to the
/// remote collector.
///
/// **Parameters**
/// - `config`: [`EmitterConfig`] with the collector endpoint and metadata.
/// - `options`: [`EmitterOptions`] controlling buffering and dispatch.
///
/// **Effects**
///
/// Spawns the dispatch task on the ambient Tokio runtime. When
/// `config.is_global_scope` is set, additionally installs the emitter as
/// the global `tracing` subscriber so framework-level events flow through
/// it as well.
#[cfg(feature = "http")]
pub fn init_emitter(config: EmitterConfig, options: EmitterOptions) -> Arc<LogEmitter> {
    let emitter = Arc::new(LogEmitter::with_capacity(config, options.buffer_capacity));
    let sink: Arc<dyn EventSink> = Arc::new(HttpCollectorSink::new(emitter.config()));
    attach_and_install(emitter, sink, &options)
}

/// Initialize from environment variables, failing fast on missing
/// configuration.
///
/// **Returns**
/// - `Ok(emitter)` attached to the collector described by the environment.
/// - `Err(ConfigError)` when required configuration is absent; the caller
///   decides whether that aborts startup. This is the only point where a
///   configuration problem surfaces.
#[cfg(feature = "http")]
pub fn try_init_from_env(options: EmitterOptions) -> Result<Arc<LogEmitter>, ConfigError> {
    let config = EmitterConfig::from_env()?;
    Ok(init_emitter(config, options))
}

/// Initialize from environment variables, degrading to console-only
/// logging when the collector is not configured.
///
/// The process always ends up with a working emitter; misconfiguration is
/// reported once on stderr and never again per call.
pub fn init_from_env_or_console(options: EmitterOptions) -> Arc<LogEmitter> {
    #[cfg(feature = "http")]
    {
        match EmitterConfig::from_env() {
            Ok(config) => return init_emitter(config, options),
            Err(e) => {
                eprintln!(
                    "log emitter configuration incomplete ({}), falling back to console-only logging",
                    e
                );
            }
        }
    }

    init_console(options)
}

/// Construct an emitter attached to the local console only.
pub fn init_console(options: EmitterOptions) -> Arc<LogEmitter> {
    let emitter = Arc::new(LogEmitter::with_capacity(
        EmitterConfig::local(),
        options.buffer_capacity,
    ));
    // Консоль уже является sink'ом, поэтому echo здесь всегда выключен,
    // иначе каждая строка печаталась бы дважды.
    emitter.attach_with(
        Arc::new(ConsoleSink),
        options.channel_capacity,
        options.max_send_attempts,
        options.retry_backoff,
        false,
    );
    emitter
}

#[cfg(feature = "http")]
fn attach_and_install(
    emitter: Arc<LogEmitter>,
    sink: Arc<dyn EventSink>,
    options: &EmitterOptions,
) -> Arc<LogEmitter> {
    emitter.attach_with(
        sink,
        options.channel_capacity,
        options.max_send_attempts,
        options.retry_backoff,
        options.echo_to_console,
    );

    if emitter.config().is_global_scope {
        install_tracing_bridge(Arc::clone(&emitter));
    }

    emitter
}

/// Install the emitter as the global `tracing` subscriber.
///
/// Failure to install (another subscriber already set) is reported on
/// stderr; nothing in the logging facade may abort the process.
pub fn install_tracing_bridge(emitter: Arc<LogEmitter>) {
    let subscriber = Registry::default().with(EmitterLayer::new(emitter));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("global tracing subscriber already set, bridge not installed: {}", e);
    }
}
