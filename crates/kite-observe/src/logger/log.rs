use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::OffsetTime, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type Output = Box<dyn Layer<Registry> + Send + Sync + 'static>;

pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = filter(&cfg.level)?;
    let output = match cfg.format {
        LoggerFormat::Text => text(cfg),
        LoggerFormat::Json => json(cfg),
        LoggerFormat::Journald => journald(cfg)?,
    };
    // Fails only when a dispatcher (or a `log` logger) is already in place.
    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)
}

fn filter(directive: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(directive).map_err(|e| LoggerError::InvalidLevel {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

fn timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn text(cfg: &LoggerConfig) -> Output {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg.use_color)
        .with_target(cfg.with_targets)
        .with_timer(timer())
        .boxed()
}

fn json(cfg: &LoggerConfig) -> Output {
    fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(cfg.with_targets)
        .with_current_span(cfg.with_spans)
        .with_span_list(cfg.with_spans)
        .with_timer(timer())
        .boxed()
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald(cfg: &LoggerConfig) -> Result<Output, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(LoggerError::Journald)?
        .with_syslog_identifier(cfg.identifier.clone());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald(_cfg: &LoggerConfig) -> Result<Output, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directives_are_validated() {
        assert!(filter("info").is_ok());
        assert!(filter("kite_core=debug,warn").is_ok());
        match filter("kite_core=loud") {
            Err(LoggerError::InvalidLevel { directive, .. }) => {
                assert_eq!(directive, "kite_core=loud")
            }
            other => panic!("expected InvalidLevel, got {other:?}"),
        }
    }

    #[test]
    fn bad_level_fails_before_install() {
        let cfg = LoggerConfig {
            level: "kite_core=loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(install(&cfg), Err(LoggerError::InvalidLevel { .. })));
    }

    #[test]
    fn only_one_install_wins() {
        let cfg = LoggerConfig {
            use_color: false,
            ..Default::default()
        };
        let first = install(&cfg);
        let second = install(&LoggerConfig {
            format: LoggerFormat::Json,
            ..cfg
        });
        assert!(first.is_ok() || matches!(first, Err(LoggerError::AlreadyInitialized)));
        assert!(matches!(second, Err(LoggerError::AlreadyInitialized)));
    }

    #[cfg(not(all(target_os = "linux", feature = "journald")))]
    #[test]
    fn journald_needs_the_feature() {
        let cfg = LoggerConfig::default();
        assert!(matches!(journald(&cfg), Err(LoggerError::JournaldNotSupported)));
    }
}
