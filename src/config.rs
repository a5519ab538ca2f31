//! Runtime configuration read from the environment

use crate::error::EngineError;
use crate::Result;
use chrono_tz::Tz;
use std::env;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub database_url: Option<String>,
    pub port: u16,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub timezone: Tz,
    pub outbound_webhook_url: Option<String>,
    /// Reminders are never sent before this local hour.
    pub reminder_send_hour: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            database_url: None,
            port: 8080,
            rate_limit_max: 20,
            rate_limit_window: Duration::from_secs(60),
            timezone: chrono_tz::America::Sao_Paulo,
            outbound_webhook_url: None,
            reminder_send_hour: 7,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match non_empty(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::ConfigError(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

impl EngineConfig {
    /// Build from environment variables. Call `dotenv::dotenv()` first.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timezone = match non_empty("TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| EngineError::ConfigError(format!("Unknown TIMEZONE: {}", name)))?,
            None => defaults.timezone,
        };

        let reminder_send_hour = parsed("REMINDER_SEND_HOUR", defaults.reminder_send_hour)?;
        if reminder_send_hour > 23 {
            return Err(EngineError::ConfigError(
                "REMINDER_SEND_HOUR must be between 0 and 23".to_string(),
            ));
        }

        Ok(Self {
            gemini_api_key: non_empty("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            database_url: non_empty("DATABASE_URL").or_else(|| non_empty("POSTGRES_URL")),
            port: match non_empty("PORT") {
                Some(_) => parsed("PORT", defaults.port)?,
                None => parsed("API_PORT", defaults.port)?,
            },
            rate_limit_max: parsed("RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: Duration::from_secs(parsed(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )?),
            timezone,
            outbound_webhook_url: non_empty("OUTBOUND_WEBHOOK_URL"),
            reminder_send_hour,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.rate_limit_max, 20);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.reminder_send_hour, 7);
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_parsed_falls_back_on_missing_key() {
        let value: u32 = parsed("FINANCE_CHAT_ENGINE_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
