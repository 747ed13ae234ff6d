use lora_bridge_core::{BridgeError, BridgeResult};
use std::str::FromStr;
use tracing::{subscriber::set_global_default, Level};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    layer::SubscriberExt,
    Layer, Registry,
};

pub struct Logger {
    level: Level,
    _file_guard: Option<WorkerGuard>,
}

impl Logger {
    pub fn new(level: &str) -> BridgeResult<Self> {
        let level = Level::from_str(level)
            .map_err(|_| BridgeError::Configuration(format!("unknown log level '{level}'")))?;
        Ok(Logger {
            level,
            _file_guard: None,
        })
    }

    /// Sets up logging output to both the console and a daily rolling
    /// log file. The returned guard must be kept alive for the file
    /// writer to flush.
    pub fn initialize(&mut self) -> BridgeResult<()> {
        let file_appender = rolling::daily("logs", "lora-bridge.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        self._file_guard = Some(guard);

        let console_layer = {
            #[cfg(debug_assertions)]
            let layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stdout)
                .with_file(true)
                .with_line_number(true);

            #[cfg(not(debug_assertions))]
            let layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .with_line_number(false);

            layer.with_filter(LevelFilter::from_level(self.level))
        };

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(LevelFilter::from_level(self.level));

        let subscriber = Registry::default().with(console_layer).with(file_layer);
        set_global_default(subscriber)
            .map_err(|_| BridgeError::Configuration("failed to set logger".into()))
    }
}
