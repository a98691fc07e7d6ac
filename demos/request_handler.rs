use structured_log_emitter::emitter::LogEmitter;
use structured_log_emitter::init::{init_from_env_or_console, EmitterOptions};
use tokio::time::{sleep, Duration};

const SOURCE: &str = "AppController";

#[derive(Debug)]
struct WhimsicalError;

impl std::fmt::Display for WhimsicalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Oops! Something whimsically wrong just happened!")
    }
}

impl std::error::Error for WhimsicalError {}

fn app_service_hello() -> String {
    "Hello World!".to_string()
}

/// The request handler: logs at three levels, captures a deliberately
/// raised error, and still returns the original result unchanged.
fn get_hello(logger: &LogEmitter) -> String {
    logger.info("get_hello - start").source(SOURCE).emit();

    let result = app_service_hello();
    logger
        .debug("Retrieving result from {name}")
        .property("name", "AppService")
        .property("result", result.as_str())
        .property("note", "the message template function is used here")
        .source(SOURCE)
        .emit();

    let outcome: Result<(), WhimsicalError> = Err(WhimsicalError);
    match outcome {
        Ok(()) => result,
        Err(error) => {
            logger.error_from(&error).source(SOURCE).emit();
            logger
                .error("The error has been successfully captured and handled!")
                .error(&error)
                .source(SOURCE)
                .emit();

            result
        }
    }
}

#[tokio::main]
async fn main() {
    // Uses the remote collector when LOG_EMITTER_ENDPOINT is set,
    // console-only logging otherwise.
    let logger = init_from_env_or_console(EmitterOptions::default());

    let result = get_hello(&logger);
    println!("handler returned: {}", result);

    // Give the background task a little time to drain the queue
    sleep(Duration::from_secs(2)).await;
}
