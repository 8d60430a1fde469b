use std::{
    fmt::{Display, Formatter},
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use reqwest::{Client, StatusCode, header::AUTHORIZATION};
use tracing::{debug, info, warn};

use crate::{
    clients::transport::Transport,
    config::Config,
    models::{
        gcm::{GcmArgs, GcmRequest, GcmResponse, GcmResult, SendOptions},
        payload::Payload,
        retry::RetryConfig,
    },
    utils::{Backoff, retry_with_backoff_when},
};

/// Client for the legacy GCM HTTP endpoint.
pub struct GcmClient {
    http_client: Client,
    endpoint: String,
    api_key: String,
    retry_config: RetryConfig,
}

enum AttemptError {
    Retryable(Error),
    Fatal(Error),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        matches!(self, AttemptError::Retryable(_))
    }

    fn into_inner(self) -> Error {
        match self {
            AttemptError::Retryable(e) | AttemptError::Fatal(e) => e,
        }
    }
}

impl Display for AttemptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Retryable(e) | AttemptError::Fatal(e) => write!(f, "{}", e),
        }
    }
}

impl GcmClient {
    pub fn new(args: GcmArgs, config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(endpoint = %config.gcm_endpoint, "GCM client initialized");

        Ok(Self {
            http_client,
            endpoint: config.gcm_endpoint.clone(),
            api_key: args.api_key,
            retry_config: config.retry_config(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let args = GcmArgs::new(config.gcm_api_key.clone())?;
        Self::new(args, config)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once(
        &self,
        payload: &Payload,
        tokens: &[String],
    ) -> Result<GcmResponse, AttemptError> {
        let body = GcmRequest {
            registration_ids: tokens,
            payload,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("key={}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(anyhow!("GCM request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            return response
                .json::<GcmResponse>()
                .await
                .map_err(|e| AttemptError::Fatal(anyhow!("Invalid GCM response: {}", e)));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(AttemptError::Fatal(anyhow!("GCM authentication failed")));
        }

        let error_text = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            Err(AttemptError::Retryable(anyhow!(
                "GCM server error {}: {}",
                status,
                error_text
            )))
        } else {
            Err(AttemptError::Fatal(anyhow!(
                "GCM request rejected with status {}: {}",
                status,
                error_text
            )))
        }
    }
}

impl Transport for GcmClient {
    /// Sends `payload` to every token, spending `retries` on failed requests
    /// and on tokens the gateway answered with `Unavailable` or
    /// `InternalServerError`.
    async fn send(
        &self,
        payload: &Payload,
        options: &SendOptions,
        retries: u32,
    ) -> Result<GcmResponse, Error> {
        let tokens = &options.registration_tokens;
        let mut results = vec![GcmResult::default(); tokens.len()];
        let mut pending: Vec<usize> = (0..tokens.len()).collect();
        let mut multicast_id = 0;
        let mut answered = false;
        let mut remaining = retries.saturating_add(1);
        let mut backoff = Backoff::new(&self.retry_config);

        debug!(token_count = tokens.len(), retries, "Sending GCM request");

        while !pending.is_empty() && remaining > 0 {
            let round_tokens: Vec<String> = pending.iter().map(|&i| tokens[i].clone()).collect();
            let used = AtomicU32::new(0);

            let outcome = retry_with_backoff_when(
                remaining,
                &mut backoff,
                AttemptError::is_retryable,
                || {
                    used.fetch_add(1, Ordering::Relaxed);
                    self.post_once(payload, &round_tokens)
                },
            )
            .await
            .map_err(AttemptError::into_inner)
            .and_then(|round| {
                if round.results.len() == round_tokens.len() {
                    Ok(round)
                } else {
                    Err(anyhow!(
                        "GCM returned {} results for {} tokens",
                        round.results.len(),
                        round_tokens.len()
                    ))
                }
            });

            remaining = remaining.saturating_sub(used.load(Ordering::Relaxed));

            // Once the gateway has answered, a failed resend only leaves the
            // pending tokens with their last reported error.
            let round = match outcome {
                Ok(round) => round,
                Err(e) if answered => {
                    warn!(
                        pending = pending.len(),
                        error = %e,
                        "Giving up on unavailable tokens"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            answered = true;
            multicast_id = round.multicast_id;

            let mut unavailable = Vec::new();
            for (&index, result) in pending.iter().zip(round.results) {
                if result.is_retryable() {
                    unavailable.push(index);
                }
                results[index] = result;
            }
            pending = unavailable;

            if !pending.is_empty() && remaining > 0 {
                debug!(
                    pending = pending.len(),
                    remaining,
                    "Resending tokens the gateway could not serve"
                );
                backoff.wait().await;
            }
        }

        let mut response = GcmResponse {
            multicast_id,
            results,
            ..Default::default()
        };
        response.recount();

        info!(
            multicast_id,
            success = response.success,
            failure = response.failure,
            "GCM request completed"
        );

        Ok(response)
    }
}
