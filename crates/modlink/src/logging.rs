use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

/// Crates whose events follow `--log-level`.
const MODLINK_TARGETS: [&str; 4] = [
    "modlink",
    "modlink_transport",
    "modlink_thermal",
    "modlink_channel",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Full lines with the worker thread name.
    Text,
    /// Shorter lines; handy with `--log-level trace` and per-frame events.
    Compact,
    /// One JSON object per event.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// modlink crates log at `level`; anything else is capped at warn.
pub fn log_filter(level: LogLevel) -> Targets {
    let level = LevelFilter::from(level);
    MODLINK_TARGETS.iter().fold(
        Targets::new().with_default(level.min(LevelFilter::WARN)),
        |targets, target| targets.with_target(*target, level),
    )
}

/// Route channel and decoder logs to stderr; stdout carries command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(log_filter(level)))
        .try_init();
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
    }

    #[test]
    fn channel_logs_follow_requested_level() {
        let filter = log_filter(LogLevel::Trace);
        assert!(filter.would_enable("modlink_thermal::decoder", &Level::TRACE));
        assert!(filter.would_enable("modlink_channel::reader", &Level::DEBUG));
        assert!(!filter.would_enable("mio::poll", &Level::INFO));
        assert!(filter.would_enable("mio::poll", &Level::WARN));
    }

    #[test]
    fn quiet_level_applies_everywhere() {
        let filter = log_filter(LogLevel::Error);
        assert!(!filter.would_enable("modlink_channel::channel", &Level::WARN));
        assert!(!filter.would_enable("mio::poll", &Level::WARN));
        assert!(filter.would_enable("modlink_transport::wait", &Level::ERROR));
    }
}
