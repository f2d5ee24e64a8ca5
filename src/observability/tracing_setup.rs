// observability/tracing_setup.rs - Tracing Configuration

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Tracing output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Human-readable format (default)
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation
    Json,
}

/// Configuration for tracing
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Log level filter (e.g., "info", "debug", "fipa_contract_net=debug")
    pub filter: String,

    /// Output format
    pub format: TracingFormat,

    /// Include span events (new, close)
    pub with_span_events: bool,

    /// Include file and line numbers
    pub with_file: bool,

    /// Include target (module path)
    pub with_target: bool,

    /// ANSI colors (for terminal output)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info,fipa_contract_net=debug".into(),
            format: TracingFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// JSON, info level, no colors
    pub fn production() -> Self {
        Self {
            filter: "warn,fipa_contract_net=info".into(),
            format: TracingFormat::Json,
            with_ansi: false,
            ..Self::default()
        }
    }

    /// Single level for everything, verbose extras at debug and below
    pub fn with_level(level: &str, format: TracingFormat) -> Self {
        let verbose = matches!(level, "debug" | "trace");
        Self {
            filter: format!("{level},fipa_contract_net={level}"),
            format,
            with_span_events: verbose,
            with_file: verbose,
            with_target: true,
            with_ansi: format != TracingFormat::Json,
        }
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` overrides the configured filter. Call once at startup.
pub fn init_tracing(config: TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target);

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format {
        TracingFormat::Pretty => registry.with(layer.with_ansi(config.with_ansi)).init(),
        TracingFormat::Compact => registry
            .with(layer.compact().with_ansi(config.with_ansi))
            .init(),
        TracingFormat::Json => registry.with(layer.json()).init(),
    }

    tracing::debug!(
        filter = %config.filter,
        format = ?config.format,
        "Tracing initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.filter.contains("info"));
        assert!(config.with_ansi);
    }

    #[test]
    fn test_tracing_config_production() {
        let config = TracingConfig::production();
        assert!(matches!(config.format, TracingFormat::Json));
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_with_level() {
        let config = TracingConfig::with_level("debug", TracingFormat::Compact);
        assert_eq!(config.filter, "debug,fipa_contract_net=debug");
        assert!(config.with_span_events);

        let config = TracingConfig::with_level("info", TracingFormat::Json);
        assert!(!config.with_file);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_format_from_cli_value() {
        use clap::ValueEnum;

        assert_eq!(TracingFormat::from_str("json", false), Ok(TracingFormat::Json));
        assert_eq!(TracingFormat::from_str("Compact", true), Ok(TracingFormat::Compact));
        assert!(TracingFormat::from_str("xml", true).is_err());
    }
}
