//! Unified logging module for the scheduler services
//!
//! Console output uses a compact `timestamp [LEVEL] message` layout; JSON output is
//! available for log shippers.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Schedule 7 finished`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name (e.g., "schedsrv"), gets a directive of its own
    pub service_name: String,
    /// Base level directive ("info", "debug", or a full filter spec)
    pub level: String,
    /// Emit JSON lines instead of the bracketed console format
    pub enable_json: bool,
    /// Enable ANSI colours on the console layer
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            level: "info".to_string(),
            enable_json: false,
            ansi: true,
        }
    }
}

/// Build the filter directive string.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies globally and to
/// the service's own target.
pub fn filter_directive(config: &LogConfig, rust_log: Option<&str>) -> String {
    if let Some(env_str) = rust_log.filter(|s| !s.trim().is_empty()) {
        return env_str.to_string();
    }

    let base = config.level.trim();
    if base.contains('=') || base.contains(',') {
        // Already a full directive spec
        return base.to_string();
    }

    let service = config.service_name.replace('-', "_");
    format!("{base},{service}={base}")
}

/// Initialize logging system with configuration
pub fn init_with_config(config: &LogConfig) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(config, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", directive, e)))?;

    let console_layer = if config.enable_json {
        fmt::layer()
            .json()
            .with_level(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(config.ansi)
            .event_format(BracketedLevelFormat)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing::debug!("Logging: {} @ {}", config.service_name, directive);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_level_brackets() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
        assert_eq!(format_level(&Level::TRACE), "[TRACE]");
    }

    #[test]
    fn test_filter_directive_prefers_rust_log() {
        let config = LogConfig::default();
        assert_eq!(
            filter_directive(&config, Some("warn,sqlx=error")),
            "warn,sqlx=error"
        );
    }

    #[test]
    fn test_filter_directive_ignores_blank_rust_log() {
        let config = LogConfig {
            service_name: "schedsrv".to_string(),
            level: "info".to_string(),
            ..Default::default()
        };
        assert_eq!(filter_directive(&config, Some("  ")), "info,schedsrv=info");
    }

    #[test]
    fn test_filter_directive_from_level() {
        let config = LogConfig {
            service_name: "utility-schedule".to_string(),
            level: "debug".to_string(),
            ..Default::default()
        };
        assert_eq!(
            filter_directive(&config, None),
            "debug,utility_schedule=debug"
        );
    }

    #[test]
    fn test_filter_directive_passes_full_spec_through() {
        let config = LogConfig {
            level: "info,utility_modbus=trace".to_string(),
            ..Default::default()
        };
        assert_eq!(filter_directive(&config, None), "info,utility_modbus=trace");
    }
}
