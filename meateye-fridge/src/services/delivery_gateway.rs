//! Delivery Gateway contract and HTTP push relay
//!
//! Push-protocol cryptography (VAPID, payload encryption) lives in an external
//! relay service. The scheduler only needs a success / transient failure /
//! invalid endpoint answer per subscription.

use async_trait::async_trait;
use meateye_common::db::{NotificationIntent, PushSubscription};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Result of one delivery attempt to one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Worth retrying later (network, timeout, 5xx, relay not configured)
    TransientFailure(String),
    /// The endpoint is gone; the subscription should be removed
    PermanentInvalidEndpoint(String),
}

/// Message handed to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub notification_id: Uuid,
    pub fridge_item_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}

impl From<&NotificationIntent> for PushMessage {
    fn from(intent: &NotificationIntent) -> Self {
        Self {
            notification_id: intent.id,
            fridge_item_id: intent.fridge_item_id,
            title: intent.title.clone(),
            body: intent.body.clone(),
        }
    }
}

#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage) -> DeliveryOutcome;
}

/// Gateway that forwards messages to a web-push relay over HTTP
pub struct HttpPushRelay {
    http_client: reqwest::Client,
    relay_url: Option<String>,
}

impl HttpPushRelay {
    pub fn new(relay_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("meateye-fridge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            relay_url: relay_url.filter(|url| !url.trim().is_empty()),
        })
    }
}

/// Map a relay HTTP status onto the delivery contract
pub fn classify_status(status: u16) -> DeliveryOutcome {
    match status {
        200..=299 => DeliveryOutcome::Delivered,
        404 | 410 => DeliveryOutcome::PermanentInvalidEndpoint(format!("endpoint rejected with {}", status)),
        _ => DeliveryOutcome::TransientFailure(format!("relay returned {}", status)),
    }
}

#[async_trait]
impl DeliveryGateway for HttpPushRelay {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage) -> DeliveryOutcome {
        let Some(relay_url) = &self.relay_url else {
            return DeliveryOutcome::TransientFailure("push relay not configured".to_string());
        };

        let payload = json!({
            "subscription": {
                "endpoint": subscription.endpoint,
                "keys": {
                    "p256dh": subscription.p256dh_key,
                    "auth": subscription.auth_key,
                },
            },
            "payload": {
                "title": message.title,
                "body": message.body,
                "data": {
                    "notificationId": message.notification_id,
                    "fridgeItemId": message.fridge_item_id,
                },
            },
        });

        tracing::debug!(
            notification_id = %message.notification_id,
            endpoint = %subscription.endpoint,
            "Forwarding push message to relay"
        );

        match self.http_client.post(relay_url).json(&payload).send().await {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(e) if e.is_timeout() => DeliveryOutcome::TransientFailure("relay timed out".to_string()),
            Err(e) => DeliveryOutcome::TransientFailure(format!("relay unreachable: {}", e)),
        }
    }
}
