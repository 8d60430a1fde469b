use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use gcm_dispatch::{
    clients::transport::Transport,
    models::{
        device::Device,
        dispatch::{DispatchConfig, TransportFailurePolicy},
        gcm::{GcmResponse, GcmResult, SendOptions},
        payload::{NotificationRequest, Payload},
    },
};
use serde_json::json;
use tracing_subscriber::fmt::MakeWriter;

pub const FAR_EXPIRATION_TIME: i64 = 2454538822113;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub payload: Payload,
    pub tokens: Vec<String>,
    pub retries: u32,
}

pub type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

/// In-process gateway that answers every token unless told otherwise.
#[derive(Default)]
pub struct RecordingTransport {
    calls: CallLog,
    invalid_tokens: HashSet<String>,
    unreachable_tokens: HashSet<String>,
    latency_ms: HashMap<String, u64>,
    drop_last_result: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway answers this token with `InvalidRegistration`.
    pub fn with_invalid_token(mut self, token: &str) -> Self {
        self.invalid_tokens.insert(token.to_string());
        self
    }

    /// Any batch containing this token fails as a whole.
    pub fn with_unreachable_token(mut self, token: &str) -> Self {
        self.unreachable_tokens.insert(token.to_string());
        self
    }

    /// Delays the batch whose first token is `token`.
    pub fn with_latency(mut self, token: &str, ms: u64) -> Self {
        self.latency_ms.insert(token.to_string(), ms);
        self
    }

    pub fn with_short_responses(mut self) -> Self {
        self.drop_last_result = true;
        self
    }

    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    async fn send(
        &self,
        payload: &Payload,
        options: &SendOptions,
        retries: u32,
    ) -> Result<GcmResponse, Error> {
        self.calls.lock().unwrap().push(RecordedCall {
            payload: payload.clone(),
            tokens: options.registration_tokens.clone(),
            retries,
        });

        let latency = options
            .registration_tokens
            .first()
            .and_then(|token| self.latency_ms.get(token))
            .copied();
        if let Some(ms) = latency {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        if options
            .registration_tokens
            .iter()
            .any(|token| self.unreachable_tokens.contains(token))
        {
            return Err(anyhow!("connection refused"));
        }

        let mut results: Vec<GcmResult> = options
            .registration_tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                if self.invalid_tokens.contains(token) {
                    GcmResult::failure("InvalidRegistration")
                } else {
                    GcmResult::success(format!("7680139367771848000{}", index))
                }
            })
            .collect();

        if self.drop_last_result {
            results.pop();
        }

        let mut response = GcmResponse {
            multicast_id: 7680139367771848000,
            results,
            ..Default::default()
        };
        response.recount();

        Ok(response)
    }
}

pub fn devices(count: usize) -> Vec<Device> {
    (1..=count)
        .map(|i| {
            if i == 1 {
                Device::new("token")
            } else {
                Device::new(format!("token{}", i))
            }
        })
        .collect()
}

pub fn request() -> NotificationRequest {
    let data = json!({ "alert": "alert" }).as_object().cloned().unwrap();
    NotificationRequest::new(data).with_expiration_time(FAR_EXPIRATION_TIME)
}

pub fn dispatch_config(max_registration_tokens: usize) -> DispatchConfig {
    DispatchConfig {
        max_registration_tokens,
        ..Default::default()
    }
}

pub fn rejecting_config(max_registration_tokens: usize) -> DispatchConfig {
    DispatchConfig {
        max_registration_tokens,
        failure_policy: TransportFailurePolicy::Reject,
        ..Default::default()
    }
}

/// Formatted log output collected in memory, for asserting on what was logged.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a plain-text subscriber writing here for the current thread
    /// until the guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(Arc::clone(&self.0))
    }
}
