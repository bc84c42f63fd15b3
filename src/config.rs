//! Environment-based configuration

use std::str::FromStr;

use thiserror::Error;

use crate::smtp::SmtpLimits;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
///
/// Every value has a default, so the server runs with no environment at all.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the SMTP listener binds to (`SMTP_ADDR`)
    pub smtp_addr: String,
    /// Hostname announced in the SMTP greeting (`SMTP_HOSTNAME`)
    pub smtp_hostname: String,
    /// Address the HTTP query API binds to (`HTTP_ADDR`)
    pub http_addr: String,
    /// Maximum recipients per transaction (`SMTP_MAX_RECIPIENTS`)
    pub max_recipients: usize,
    /// Maximum message size in bytes (`SMTP_MAX_MESSAGE_BYTES`)
    pub max_message_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_addr: env_or("SMTP_ADDR", "127.0.0.1:2525"),
            smtp_hostname: env_or("SMTP_HOSTNAME", "mailsink.local"),
            http_addr: env_or("HTTP_ADDR", "127.0.0.1:8025"),
            max_recipients: env_parse("SMTP_MAX_RECIPIENTS")?.unwrap_or(100),
            max_message_bytes: env_parse("SMTP_MAX_MESSAGE_BYTES")?.unwrap_or(10 * 1024 * 1024),
        })
    }

    /// The per-transaction limits handed to the SMTP listener
    pub fn limits(&self) -> SmtpLimits {
        SmtpLimits {
            max_recipients: self.max_recipients,
            max_data_size: self.max_message_bytes,
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_owned())
}

fn env_parse<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidValue { var, value }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default() {
        assert_eq!(
            env_or("MAILSINK_TEST_UNSET_VAR", "fallback"),
            "fallback"
        );
    }

    #[test]
    fn test_env_parse() {
        unsafe { std::env::set_var("MAILSINK_TEST_PARSE_OK", "42") };
        let parsed: Option<usize> = env_parse("MAILSINK_TEST_PARSE_OK").unwrap();
        assert_eq!(parsed, Some(42));

        unsafe { std::env::set_var("MAILSINK_TEST_PARSE_BAD", "not-a-number") };
        let result: Result<Option<usize>, _> = env_parse("MAILSINK_TEST_PARSE_BAD");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var: "MAILSINK_TEST_PARSE_BAD", .. })
        ));

        let missing: Option<usize> = env_parse("MAILSINK_TEST_PARSE_MISSING").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_limits_mapping() {
        let config = Config {
            smtp_addr: "127.0.0.1:2525".to_owned(),
            smtp_hostname: "mailsink.local".to_owned(),
            http_addr: "127.0.0.1:8025".to_owned(),
            max_recipients: 7,
            max_message_bytes: 1024,
        };

        let limits = config.limits();
        assert_eq!(limits.max_recipients, 7);
        assert_eq!(limits.max_data_size, 1024);
    }
}
