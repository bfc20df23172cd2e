use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

struct NopLogger;

impl Log for NopLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        false
    }

    fn log(&self, _: &Record) {}

    fn flush(&self) {}
}

/// This logger proxy an underline logger and make available a logger switch possibility.
#[derive(Clone)]
pub struct ProxyLogger {
    logger: Arc<RwLock<Box<dyn Log>>>,
}

pub static LOGGER_SWITCHER: Lazy<ProxyLogger> = Lazy::new(|| {
    let logger = ProxyLogger {
        logger: Arc::new(RwLock::new(Box::new(NopLogger))),
    };

    log::set_boxed_logger(Box::new(logger.clone())).expect("infallible");
    log::set_max_level(log::LevelFilter::Debug);

    logger
});

impl ProxyLogger {
    /// Switch logger to new implementation and reset a global maximum log level.
    ///
    /// # Arguments
    ///
    /// * `logger`: a logger implementation.
    /// * `level_filter`: a new maximum log level.
    pub fn switch<L: Log + 'static>(&self, logger: L, level_filter: LevelFilter) {
        *self.logger.write().unwrap() = Box::new(logger);
        log::set_max_level(level_filter);
    }
}

impl Log for ProxyLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.logger.read().unwrap().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.logger.read().unwrap().log(record)
    }

    fn flush(&self) {
        self.logger.read().unwrap().flush()
    }
}

/// True if the user requested verbose logging of every framed protocol message
/// (`NODE_INSPECT_VERBOSE=1` or `DEBUG=inspect`).
pub fn wire_logging_requested() -> bool {
    std::env::var("NODE_INSPECT_VERBOSE")
        .map(|v| v == "1")
        .unwrap_or(false)
        || std::env::var("DEBUG")
            .map(|v| v.split(',').any(|p| p == "inspect"))
            .unwrap_or(false)
}

/// Install the real logger: `env_logger` honoring `RUST_LOG`, forced down to
/// debug level for the `wire` target when verbose tracing was requested.
pub fn init_from_env() {
    if wire_logging_requested() {
        let logger = env_logger::Builder::new()
            .filter_level(LevelFilter::Warn)
            .filter_module("wire", LevelFilter::Debug)
            .parse_default_env()
            .build();
        let filter = logger.filter();
        LOGGER_SWITCHER.switch(logger, filter);
    } else {
        let logger = env_logger::Logger::from_default_env();
        let filter = logger.filter();
        LOGGER_SWITCHER.switch(logger, filter);
    }
}
