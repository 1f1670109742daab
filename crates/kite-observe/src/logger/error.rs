use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    InvalidFormat(String),
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidLevel { directive: String, reason: String },
    #[error("journald output needs Linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("cannot reach journald")]
    Journald(#[source] std::io::Error),
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}
