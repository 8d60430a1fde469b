use serde::{Deserialize, Serialize};

use crate::models::{device::Device, gcm::GcmResult};

/// Gateway limit on registration tokens per request.
pub const DEFAULT_MAX_REGISTRATION_TOKENS: usize = 1000;

/// Retries handed to the transport for each batch.
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 5;

/// What a batch turns into when its whole gateway call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailurePolicy {
    /// Fail the entire dispatch with the transport error.
    Reject,
    /// Report every device of the failed batch as not transmitted.
    #[default]
    MarkFailed,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_registration_tokens: usize,
    pub retries: u32,
    pub failure_policy: TransportFailurePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_registration_tokens: DEFAULT_MAX_REGISTRATION_TOKENS,
            retries: DEFAULT_TRANSPORT_RETRIES,
            failure_policy: TransportFailurePolicy::default(),
        }
    }
}

/// Outcome for one device of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub device: Device,
    pub transmitted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Replacement token reported by the gateway for this device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn from_gateway(device: Device, result: GcmResult) -> Self {
        Self {
            device,
            transmitted: result.error.is_none(),
            message_id: result.message_id,
            registration_id: result.registration_id,
            error: result.error,
        }
    }

    pub fn failed(device: Device, error: impl Into<String>) -> Self {
        Self {
            device,
            transmitted: false,
            message_id: None,
            registration_id: None,
            error: Some(error.into()),
        }
    }
}
