use anyhow::Error;

use crate::models::{
    gcm::{GcmResponse, SendOptions},
    payload::Payload,
};

/// One gateway call for a group of registration tokens.
///
/// `retries` is the number of extra attempts the transport may spend on
/// transient failures. An `Err` means the whole group went unanswered; errors
/// for single tokens come back inside `GcmResponse::results`, one entry per
/// token and in token order.
#[trait_variant::make(Send)]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        payload: &Payload,
        options: &SendOptions,
        retries: u32,
    ) -> Result<GcmResponse, Error>;
}
