//! Configuration management for the gateway.

use std::env;
use std::time::Duration;

use crate::{Error, Result};

/// Where the JWT signing secret comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningSecretSource {
    /// Secret given directly in the environment
    Inline(String),
    /// ARN of a Secrets Manager secret
    SecretsManager(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// JWT signing secret source
    pub signing_secret: SigningSecretSource,
    /// Expected `iss` claim, if any
    pub jwt_issuer: Option<String>,
    /// Expected `aud` claim, if any
    pub jwt_audience: Option<String>,
    /// Allowed clock skew for token expiry
    pub jwt_leeway_seconds: u64,
    /// Lambda running the conversation engine
    pub conversation_function_name: String,
    /// Bound on a single conversation call
    pub chat_timeout: Duration,
    /// Health endpoint of the data ingestion pipeline
    pub data_pipeline_health_url: String,
    /// Health endpoint of the sentiment analyzer
    pub sentiment_analyzer_health_url: String,
    /// Health endpoint of the prediction engine
    pub prediction_engine_health_url: String,
    /// Bound on a single health probe
    pub probe_timeout: Duration,
    /// Records kept per metrics stream
    pub metrics_retention: usize,
    /// Accepted `Host` header values
    pub allowed_hosts: Vec<String>,
    /// Accepted CORS origins
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| Error::Config(format!("{key} is not set")));

        let signing_secret = match (var("JWT_SECRET"), var("JWT_SECRET_ARN")) {
            (Some(secret), _) => SigningSecretSource::Inline(secret),
            (None, Some(arn)) => SigningSecretSource::SecretsManager(arn),
            (None, None) => {
                return Err(Error::Config(
                    "one of JWT_SECRET or JWT_SECRET_ARN must be set".to_string(),
                ))
            }
        };

        Ok(Self {
            signing_secret,
            jwt_issuer: var("JWT_ISSUER"),
            jwt_audience: var("JWT_AUDIENCE"),
            jwt_leeway_seconds: parse_or("JWT_LEEWAY_SECONDS", var("JWT_LEEWAY_SECONDS"), 30)?,
            conversation_function_name: var("CONVERSATION_FUNCTION_NAME")
                .unwrap_or_else(|| "fund-insights-conversation".to_string()),
            chat_timeout: Duration::from_millis(parse_or(
                "CHAT_TIMEOUT_MS",
                var("CHAT_TIMEOUT_MS"),
                30_000,
            )?),
            data_pipeline_health_url: required("DATA_PIPELINE_HEALTH_URL")?,
            sentiment_analyzer_health_url: required("SENTIMENT_ANALYZER_HEALTH_URL")?,
            prediction_engine_health_url: required("PREDICTION_ENGINE_HEALTH_URL")?,
            probe_timeout: Duration::from_millis(parse_or(
                "HEALTH_PROBE_TIMEOUT_MS",
                var("HEALTH_PROBE_TIMEOUT_MS"),
                2_000,
            )?),
            metrics_retention: parse_or("METRICS_RETENTION", var("METRICS_RETENTION"), 10_000)?,
            allowed_hosts: split_list(var("ALLOWED_HOSTS")),
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|v| split_list(Some(v)))
                .unwrap_or_default(),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}

/// Comma-separated list; unset means "allow everything".
fn split_list(value: Option<String>) -> Vec<String> {
    match value {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => vec!["*".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const PROBES: [(&str, &str); 3] = [
        ("DATA_PIPELINE_HEALTH_URL", "http://pipeline/health"),
        ("SENTIMENT_ANALYZER_HEALTH_URL", "http://sentiment/health"),
        ("PREDICTION_ENGINE_HEALTH_URL", "http://prediction/health"),
    ];

    #[test]
    fn test_defaults() {
        let mut pairs = PROBES.to_vec();
        pairs.push(("JWT_SECRET", "s3cret"));
        let config = load(&pairs).unwrap();

        assert_eq!(config.signing_secret, SigningSecretSource::Inline("s3cret".to_string()));
        assert_eq!(config.jwt_leeway_seconds, 30);
        assert_eq!(config.chat_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.metrics_retention, 10_000);
        assert_eq!(config.allowed_hosts, vec!["*"]);
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_secret_arn_and_lists() {
        let mut pairs = PROBES.to_vec();
        pairs.push(("JWT_SECRET_ARN", "arn:aws:secretsmanager:us-east-1:1:secret:jwt"));
        pairs.push(("ALLOWED_HOSTS", "api.example.com, internal.example.com"));
        pairs.push(("ALLOWED_ORIGINS", "https://app.example.com"));
        pairs.push(("CHAT_TIMEOUT_MS", "1500"));
        let config = load(&pairs).unwrap();

        assert!(matches!(config.signing_secret, SigningSecretSource::SecretsManager(_)));
        assert_eq!(config.allowed_hosts, vec!["api.example.com", "internal.example.com"]);
        assert_eq!(config.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(config.chat_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_missing_secret_is_error() {
        let err = load(&PROBES).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_probe_url_is_error() {
        let err = load(&[("JWT_SECRET", "s")]).unwrap_err();
        assert!(err.to_string().contains("DATA_PIPELINE_HEALTH_URL"));
    }

    #[test]
    fn test_bad_number_is_error() {
        let mut pairs = PROBES.to_vec();
        pairs.push(("JWT_SECRET", "s"));
        pairs.push(("METRICS_RETENTION", "lots"));
        assert!(matches!(load(&pairs), Err(Error::Config(_))));
    }
}
