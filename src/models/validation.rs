use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::models::gcm::GcmArgs;

pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(anyhow!("GCM API key cannot be empty"));
    }

    if api_key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(anyhow!("GCM API key contains invalid characters"));
    }

    Ok(())
}

impl GcmArgs {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let args = Self {
            api_key: api_key.into(),
        };
        validate_api_key(&args.api_key)?;
        Ok(args)
    }

    /// Accepts `{"apiKey": "..."}`; anything else is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(anyhow!("GCM configuration must be an object"));
        }

        let args: Self = serde_json::from_value(value)
            .map_err(|e| anyhow!("GCM configuration is invalid: {}", e))?;
        validate_api_key(&args.api_key)?;

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_api_key_object() {
        let args = GcmArgs::from_value(json!({ "apiKey": "apiKey" })).unwrap();
        assert_eq!(args.api_key, "apiKey");
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(GcmArgs::from_value(json!(123)).is_err());
        assert!(GcmArgs::from_value(json!({ "apisKey": "apiKey" })).is_err());
        assert!(GcmArgs::from_value(Value::Null).is_err());
        assert!(GcmArgs::from_value(json!({ "apiKey": 42 })).is_err());
        assert!(GcmArgs::from_value(json!({ "apiKey": "" })).is_err());
    }

    #[test]
    fn rejects_whitespace_in_key() {
        assert!(GcmArgs::new("api key").is_err());
        assert!(GcmArgs::new("   ").is_err());
    }
}
