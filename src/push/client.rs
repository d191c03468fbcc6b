//! HTTP client towards the push relay.

use crate::core::PushSubscription;
use crate::push::payload::{Urgency, WebPushPayload};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Delivery failures, split by whether the subscription is worth keeping.
#[derive(Error, Debug)]
pub enum PushError {
    /// The endpoint no longer exists. The subscription must be deactivated
    /// and never targeted again without re-registration.
    #[error("subscription endpoint is gone")]
    EndpointGone,

    /// Anything else: assumed transient, the subscription is retained.
    #[error("push delivery failed: {0}")]
    Delivery(String),
}

/// A client that can deliver one payload to one subscription endpoint.
#[async_trait]
pub trait PushRelay: Send + Sync {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &WebPushPayload,
        urgency: Urgency,
        ttl_seconds: u32,
    ) -> Result<(), PushError>;
}

/// The standards-based relay client: posts the JSON payload to the
/// subscription's endpoint with bounded `TTL` and an `Urgency` hint, so the
/// relay drops stale, undelivered pushes rather than delivering them late.
pub struct HttpPushClient {
    client: reqwest::Client,
}

impl HttpPushClient {
    /// Creates a new `HttpPushClient` with the given per-request timeout.
    ///
    /// The timeout bounds a hung endpoint so it cannot block the remaining
    /// subscriptions of a dispatch.
    pub fn new(timeout: Duration) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Delivery(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushRelay for HttpPushClient {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &WebPushPayload,
        urgency: Urgency,
        ttl_seconds: u32,
    ) -> Result<(), PushError> {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", ttl_seconds)
            .header("Urgency", urgency.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %subscription.endpoint, error = %e, "Push request failed");
                PushError::Delivery(e.to_string())
            })?;

        match response.status() {
            status if status.is_success() => {
                debug!(endpoint = %subscription.endpoint, "Push accepted by relay");
                Ok(())
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushError::EndpointGone),
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    endpoint = %subscription.endpoint,
                    status = %status,
                    body = %body,
                    "Push rejected by relay"
                );
                Err(PushError::Delivery(format!(
                    "relay returned status {status}"
                )))
            }
        }
    }
}
