use std::fmt::{Debug, Formatter};

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{
    dispatch::{
        DEFAULT_MAX_REGISTRATION_TOKENS, DEFAULT_TRANSPORT_RETRIES, DispatchConfig,
        TransportFailurePolicy,
    },
    retry::RetryConfig,
};

pub const DEFAULT_GCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

#[derive(Clone, Deserialize)]
pub struct Config {
    pub gcm_api_key: String,

    #[serde(default = "default_gcm_endpoint")]
    pub gcm_endpoint: String,
    #[serde(default = "default_max_registration_tokens")]
    pub gcm_max_registration_tokens: usize,
    #[serde(default = "default_gcm_retries")]
    pub gcm_retries: u32,

    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default)]
    pub transport_failure_policy: TransportFailurePolicy,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gcm_api_key", &"<redacted>")
            .field("gcm_endpoint", &self.gcm_endpoint)
            .field("gcm_max_registration_tokens", &self.gcm_max_registration_tokens)
            .field("gcm_retries", &self.gcm_retries)
            .field("initial_retry_delay_ms", &self.initial_retry_delay_ms)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("retry_backoff_multiplier", &self.retry_backoff_multiplier)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("transport_failure_policy", &self.transport_failure_policy)
            .field("server_port", &self.server_port)
            .finish()
    }
}

fn default_gcm_endpoint() -> String {
    DEFAULT_GCM_ENDPOINT.to_string()
}

fn default_max_registration_tokens() -> usize {
    DEFAULT_MAX_REGISTRATION_TOKENS
}

fn default_gcm_retries() -> u32 {
    DEFAULT_TRANSPORT_RETRIES
}

fn default_initial_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_server_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration for the given API key with every other setting at its default.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            gcm_api_key: api_key.into(),
            gcm_endpoint: default_gcm_endpoint(),
            gcm_max_registration_tokens: default_max_registration_tokens(),
            gcm_retries: default_gcm_retries(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            request_timeout_seconds: default_request_timeout_seconds(),
            transport_failure_policy: TransportFailurePolicy::default(),
            server_port: default_server_port(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.gcm_max_registration_tokens == 0 {
            return Err(anyhow!("GCM_MAX_REGISTRATION_TOKENS must be at least 1"));
        }
        if self.retry_backoff_multiplier == 0 {
            return Err(anyhow!("RETRY_BACKOFF_MULTIPLIER must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_registration_tokens: self.gcm_max_registration_tokens,
            retries: self.gcm_retries,
            failure_policy: self.transport_failure_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_limits() {
        let config = Config::with_api_key("apiKey");

        assert_eq!(config.gcm_endpoint, DEFAULT_GCM_ENDPOINT);
        assert_eq!(config.dispatch_config().max_registration_tokens, 1000);
        assert_eq!(config.dispatch_config().retries, 5);
        assert_eq!(config.retry_config().initial_delay_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialises_from_environment_pairs() {
        let vars = vec![
            ("GCM_API_KEY".to_string(), "apiKey".to_string()),
            ("GCM_MAX_REGISTRATION_TOKENS".to_string(), "2".to_string()),
            ("TRANSPORT_FAILURE_POLICY".to_string(), "reject".to_string()),
        ];

        let config = envy::from_iter::<_, Config>(vars).unwrap();

        assert_eq!(config.gcm_max_registration_tokens, 2);
        assert_eq!(
            config.transport_failure_policy,
            TransportFailurePolicy::Reject
        );
        assert_eq!(config.server_port, 8080);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = Config::with_api_key("AIzaSecretServerKey");

        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("AIzaSecretServerKey"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("gcm_max_registration_tokens: 1000"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = Config::with_api_key("apiKey");
        config.gcm_max_registration_tokens = 0;

        assert!(config.validate().is_err());
    }
}
