use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::logger::error::LoggerError;

/// Output format of the global subscriber.
///
/// Parsing accepts every format on every platform; whether this build can actually emit it is
/// checked when the logger is installed (see [`LoggerFormat::is_available`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LoggerFormat {
    Text,
    Json,
    Journald,
}

impl LoggerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            LoggerFormat::Journald => cfg!(all(target_os = "linux", feature = "journald")),
            LoggerFormat::Text | LoggerFormat::Json => true,
        }
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let is = |name: &str| s.eq_ignore_ascii_case(name);
        if is("text") || is("plain") {
            Ok(LoggerFormat::Text)
        } else if is("json") {
            Ok(LoggerFormat::Json)
        } else if is("journald") || is("journal") {
            Ok(LoggerFormat::Journald)
        } else {
            Err(LoggerError::InvalidFormat(s.to_string()))
        }
    }
}

impl TryFrom<String> for LoggerFormat {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" JSON ".parse::<LoggerFormat>().unwrap(), LoggerFormat::Json);
        assert_eq!("Plain".parse::<LoggerFormat>().unwrap(), LoggerFormat::Text);
        assert_eq!("journal".parse::<LoggerFormat>().unwrap(), LoggerFormat::Journald);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(matches!(
            "yaml".parse::<LoggerFormat>(),
            Err(LoggerError::InvalidFormat(s)) if s == "yaml"
        ));
    }

    #[test]
    fn journald_availability_follows_the_build() {
        assert!(LoggerFormat::Text.is_available());
        assert_eq!(
            LoggerFormat::Journald.is_available(),
            cfg!(all(target_os = "linux", feature = "journald"))
        );
    }

    #[test]
    fn deserializes_from_config() {
        let cfg: crate::LoggerConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "debug");
        assert!(cfg.with_targets);
        assert!(cfg.with_spans);
    }
}
