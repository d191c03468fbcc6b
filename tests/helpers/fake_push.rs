#![allow(dead_code)]
use async_trait::async_trait;
use maintwatch::core::PushSubscription;
use maintwatch::push::{PushError, PushRelay, Urgency, WebPushPayload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What the fake relay should do for a given endpoint.
#[derive(Clone, Copy, Debug)]
pub enum RelayScript {
    Accept,
    Gone,
    Fail,
}

/// A fake push relay that records delivery attempts and can be scripted to
/// reject specific endpoints.
#[derive(Clone, Default)]
pub struct FakePushRelay {
    scripts: Arc<Mutex<HashMap<String, RelayScript>>>,
    delivered: Arc<Mutex<Vec<(i64, WebPushPayload, Urgency)>>>,
    attempts: Arc<Mutex<Vec<i64>>>,
}

impl FakePushRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for one endpoint. Unscripted endpoints accept.
    pub fn script(&self, endpoint: &str, script: RelayScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), script);
    }

    /// Payloads the relay accepted, by subscription id.
    pub fn delivered(&self) -> Vec<(i64, WebPushPayload, Urgency)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Every attempted subscription id, accepted or not, in order.
    pub fn attempts(&self) -> Vec<i64> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl PushRelay for FakePushRelay {
    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &WebPushPayload,
        urgency: Urgency,
        _ttl_seconds: u32,
    ) -> Result<(), PushError> {
        self.attempts.lock().unwrap().push(subscription.id);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(RelayScript::Accept);
        match script {
            RelayScript::Accept => {
                self.delivered
                    .lock()
                    .unwrap()
                    .push((subscription.id, payload.clone(), urgency));
                Ok(())
            }
            RelayScript::Gone => Err(PushError::EndpointGone),
            RelayScript::Fail => Err(PushError::Delivery("scripted transient failure".into())),
        }
    }
}
