use anyhow::{Error, Result, anyhow};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    clients::{gcm::GcmClient, transport::Transport},
    config::Config,
    models::{
        device::Device,
        dispatch::{DispatchConfig, DispatchResult, TransportFailurePolicy},
        gcm::{GcmArgs, SendOptions},
        payload::{NotificationRequest, Payload, build_payload_now},
    },
    utils::slice_devices,
};

/// Fans a notification out to any number of devices, at most
/// `max_registration_tokens` per gateway call.
pub struct DispatchEngine<T> {
    transport: T,
    config: DispatchConfig,
}

impl DispatchEngine<GcmClient> {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let transport = GcmClient::from_config(config)?;
        Self::new(transport, config.dispatch_config())
    }

    /// Builds an engine from `{"apiKey": "..."}`, failing on malformed input.
    pub fn from_args(args: Value, config: &Config) -> Result<Self, Error> {
        let args = GcmArgs::from_value(args)?;
        let transport = GcmClient::new(args, config)?;
        Self::new(transport, config.dispatch_config())
    }
}

impl<T: Transport> DispatchEngine<T> {
    pub fn new(transport: T, config: DispatchConfig) -> Result<Self, Error> {
        if config.max_registration_tokens == 0 {
            return Err(anyhow!("max_registration_tokens must be at least 1"));
        }

        Ok(Self { transport, config })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Sends `request` to `devices` and returns one result per device, in the
    /// order the devices were given.
    ///
    /// A request without `data` is logged and dropped without touching the
    /// gateway. How a batch whose gateway call fails outright is reported
    /// depends on [`TransportFailurePolicy`].
    pub async fn send(
        &self,
        request: &NotificationRequest,
        devices: &[Device],
    ) -> Result<Vec<DispatchResult>, Error> {
        if request.data.is_none() {
            warn!("Invalid GCM notification, missing data; nothing sent");
            return Ok(Vec::new());
        }

        if devices.is_empty() {
            debug!("No devices to notify");
            return Ok(Vec::new());
        }

        let push_id = Uuid::new_v4().simple().to_string();
        let payload = build_payload_now(request, &push_id, request.expiration_time);
        let batches = slice_devices(devices, self.config.max_registration_tokens);

        info!(
            push_id = %push_id,
            device_count = devices.len(),
            batch_count = batches.len(),
            "Dispatching GCM notification"
        );

        let outcomes = join_all(
            batches
                .iter()
                .map(|batch| self.send_batch(&payload, batch)),
        )
        .await;

        let mut results = Vec::with_capacity(devices.len());

        for (index, (batch, outcome)) in batches.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(batch_results) => results.extend(batch_results),
                Err(e) => {
                    error!(
                        push_id = %push_id,
                        batch = index,
                        device_count = batch.len(),
                        error = %e,
                        "GCM batch failed"
                    );

                    match self.config.failure_policy {
                        TransportFailurePolicy::Reject => return Err(e),
                        TransportFailurePolicy::MarkFailed => {
                            let reason = e.to_string();
                            results.extend(
                                batch
                                    .iter()
                                    .map(|device| DispatchResult::failed(device.clone(), &reason)),
                            );
                        }
                    }
                }
            }
        }

        let transmitted = results.iter().filter(|r| r.transmitted).count();
        info!(
            push_id = %push_id,
            transmitted,
            failed = results.len() - transmitted,
            "GCM notification dispatched"
        );

        Ok(results)
    }

    async fn send_batch(
        &self,
        payload: &Payload,
        batch: &[Device],
    ) -> Result<Vec<DispatchResult>, Error> {
        let options = SendOptions {
            registration_tokens: batch.iter().map(|d| d.device_token.clone()).collect(),
        };

        let response = self
            .transport
            .send(payload, &options, self.config.retries)
            .await?;

        if response.results.len() != batch.len() {
            return Err(anyhow!(
                "GCM returned {} results for {} devices",
                response.results.len(),
                batch.len()
            ));
        }

        Ok(batch
            .iter()
            .cloned()
            .zip(response.results)
            .map(|(device, result)| DispatchResult::from_gateway(device, result))
            .collect())
    }
}
