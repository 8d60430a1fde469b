use serde::{Deserialize, Serialize};

use crate::models::payload::Payload;

/// Construction arguments for the gateway client, usually taken from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcmArgs {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub registration_tokens: Vec<String>,
}

/// Wire body of one gateway call.
#[derive(Debug, Serialize)]
pub struct GcmRequest<'a> {
    pub registration_ids: &'a [String],

    #[serde(flatten)]
    pub payload: &'a Payload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcmResponse {
    #[serde(default)]
    pub multicast_id: u64,
    #[serde(default)]
    pub success: u32,
    #[serde(default)]
    pub failure: u32,
    #[serde(default)]
    pub canonical_ids: u32,
    #[serde(default)]
    pub results: Vec<GcmResult>,
}

impl GcmResponse {
    pub fn recount(&mut self) {
        self.failure = self.results.iter().filter(|r| r.error.is_some()).count() as u32;
        self.success = self.results.len() as u32 - self.failure;
        self.canonical_ids = self
            .results
            .iter()
            .filter(|r| r.error.is_none() && r.registration_id.is_some())
            .count() as u32;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcmResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GcmResult {
    pub fn success(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Gateway errors worth resending the token for.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.error.as_deref(),
            Some("Unavailable") | Some("InternalServerError")
        )
    }
}
