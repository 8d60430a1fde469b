use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Push target. Only the token is read; anything else the caller attached is
/// carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_token: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    pub fn new(device_token: impl Into<String>) -> Self {
        Self {
            device_token: device_token.into(),
            extra: Map::new(),
        }
    }
}
