use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest time-to-live the gateway accepts: four weeks, in seconds.
pub const MAX_TIME_TO_LIVE_SECONDS: u32 = 4 * 7 * 24 * 60 * 60;

/// Application-level push request as handed to the dispatcher.
///
/// `data` is optional so that a request missing its user payload still
/// deserialises and can be turned away by the dispatcher instead of the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Value>,

    /// Absolute deadline in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
}

impl NotificationRequest {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data: Some(data),
            notification: None,
            expiration_time: None,
        }
    }

    pub fn with_notification(mut self, notification: Value) -> Self {
        self.notification = Some(notification);
        self
    }

    pub fn with_expiration_time(mut self, expiration_time: i64) -> Self {
        self.expiration_time = Some(expiration_time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadData {
    pub push_id: String,
    pub time: String,
    pub data: Map<String, Value>,
}

/// Gateway message body shared by every batch of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub priority: Priority,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,

    pub data: PayloadData,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Value>,
}

/// Builds the gateway payload for `request`.
///
/// `timestamp` becomes `data.time`; when `expiration_time` is given the
/// time-to-live is the whole number of seconds between the two, clamped to
/// `0..=MAX_TIME_TO_LIVE_SECONDS`.
pub fn build_payload(
    request: &NotificationRequest,
    push_id: &str,
    timestamp: DateTime<Utc>,
    expiration_time: Option<i64>,
) -> Payload {
    let time_to_live =
        expiration_time.map(|expires_at| time_to_live(timestamp.timestamp_millis(), expires_at));

    Payload {
        priority: Priority::High,
        time_to_live,
        data: PayloadData {
            push_id: push_id.to_string(),
            time: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            data: request.data.clone().unwrap_or_default(),
        },
        notification: request.notification.clone(),
    }
}

/// Same as [`build_payload`], stamped with the current time.
pub fn build_payload_now(
    request: &NotificationRequest,
    push_id: &str,
    expiration_time: Option<i64>,
) -> Payload {
    build_payload(request, push_id, Utc::now(), expiration_time)
}

fn time_to_live(timestamp_ms: i64, expiration_ms: i64) -> u32 {
    let seconds = expiration_ms.saturating_sub(timestamp_ms).div_euclid(1000);

    if seconds < 0 {
        0
    } else if seconds > i64::from(MAX_TIME_TO_LIVE_SECONDS) {
        MAX_TIME_TO_LIVE_SECONDS
    } else {
        seconds as u32
    }
}
