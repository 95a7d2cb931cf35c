//! services/juris/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which backend the application talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendMode {
    /// A Supabase-compatible REST backend.
    Remote { url: String, anon_key: String },
    /// The local mock, persisted in the slot database.
    Mock,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: Level,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub storage_url: String,
    pub mock_latency: Duration,
    pub ai_retry_attempts: u32,
    pub ai_retry_base: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Backend selection ---
        let supabase_url = lookup("SUPABASE_URL").filter(|v| !v.trim().is_empty());
        let supabase_anon_key = lookup("SUPABASE_ANON_KEY").filter(|v| !v.trim().is_empty());
        let storage_url =
            lookup("STORAGE_URL").unwrap_or_else(|| "sqlite://juris.db?mode=rwc".to_string());
        let mock_latency = Duration::from_millis(parse_var(&lookup, "MOCK_LATENCY_MS", 300)?);

        // --- AI provider ---
        let gemini_api_key = lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY"));
        let gemini_model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string());
        let gemini_api_base = lookup("GEMINI_API_BASE").unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });
        let ai_retry_attempts: u32 = parse_var(&lookup, "AI_RETRY_ATTEMPTS", 3)?;
        if ai_retry_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "AI_RETRY_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let ai_retry_base = Duration::from_millis(parse_var(&lookup, "AI_RETRY_BASE_MS", 2000)?);
        let http_timeout = Duration::from_secs(parse_var(&lookup, "HTTP_TIMEOUT_SECS", 120)?);

        Ok(Self {
            log_level,
            supabase_url,
            supabase_anon_key,
            gemini_api_key,
            gemini_model,
            gemini_api_base,
            storage_url,
            mock_latency,
            ai_retry_attempts,
            ai_retry_base,
            http_timeout,
        })
    }

    /// The remote backend is used only when both values are present and
    /// neither is a template placeholder.
    pub fn backend_mode(&self) -> BackendMode {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) if !is_placeholder_url(url) && !is_placeholder(key) => {
                BackendMode::Remote {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key: key.clone(),
                }
            }
            _ => BackendMode::Mock,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn is_placeholder(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered.is_empty() || lowered.contains("placeholder") || lowered.contains("your-")
}

fn is_placeholder_url(url: &str) -> bool {
    is_placeholder(url) || !url.trim().starts_with("http")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_select_the_mock_backend() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.backend_mode(), BackendMode::Mock);
        assert_eq!(config.ai_retry_attempts, 3);
        assert_eq!(config.mock_latency, Duration::from_millis(300));
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn placeholder_values_keep_the_mock() {
        let config = config_from(&[
            ("SUPABASE_URL", "https://your-project.supabase.co"),
            ("SUPABASE_ANON_KEY", "real-looking-key"),
        ])
        .unwrap();
        assert_eq!(config.backend_mode(), BackendMode::Mock);

        let config = config_from(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "placeholder"),
        ])
        .unwrap();
        assert_eq!(config.backend_mode(), BackendMode::Mock);
    }

    #[test]
    fn real_values_select_the_remote_backend() {
        let config = config_from(&[
            ("SUPABASE_URL", "https://abc.supabase.co/"),
            ("SUPABASE_ANON_KEY", "eyJhbGciOi"),
        ])
        .unwrap();
        assert_eq!(
            config.backend_mode(),
            BackendMode::Remote {
                url: "https://abc.supabase.co".to_string(),
                anon_key: "eyJhbGciOi".to_string(),
            }
        );
    }

    #[test]
    fn invalid_numbers_are_reported_by_name() {
        let err = config_from(&[("MOCK_LATENCY_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "MOCK_LATENCY_MS"));

        let err = config_from(&[("AI_RETRY_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "AI_RETRY_ATTEMPTS"));
    }
}
