//! Event-to-message mapping.
//!
//! When a domain event is published, one `webhook_messages` row is created
//! per active endpoint subscribed to the event's CloudEvent type at the
//! event's API version. Messages are enqueued due immediately; the delivery
//! worker picks them up on its next tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use trs_db::{CreateWebhookMessage, WebhookMessage};

use crate::cache::EndpointCache;
use crate::error::WebhookError;

/// A domain event eligible for webhook fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Maps published events onto per-endpoint webhook messages.
pub struct EventMapper {
    pool: PgPool,
    cache: Arc<EndpointCache>,
}

impl EventMapper {
    /// Create a mapper backed by the shared endpoint cache.
    #[must_use]
    pub fn new(pool: PgPool, cache: Arc<EndpointCache>) -> Self {
        Self { pool, cache }
    }

    /// Create one message per subscribed endpoint for this event.
    ///
    /// Returns the IDs of the created messages. An event with no matching
    /// endpoint creates nothing and is not an error.
    pub async fn publish_event(&self, event: &WebhookEvent) -> Result<Vec<Uuid>, WebhookError> {
        let endpoints = self.cache.active_endpoints().await?;

        let matching: Vec<_> = endpoints
            .iter()
            .filter(|e| e.subscribes_to(&event.api_version, &event.event_type))
            .collect();

        if matching.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                event_type = %event.event_type,
                api_version = %event.api_version,
                "No active endpoints subscribe to event type"
            );
            return Ok(Vec::new());
        }

        let cloud_event_id = Uuid::new_v4().to_string();
        let mut created = Vec::with_capacity(matching.len());

        for endpoint in matching {
            let message = WebhookMessage::create(
                &self.pool,
                CreateWebhookMessage {
                    webhook_endpoint_id: endpoint.id,
                    cloud_event_id: cloud_event_id.clone(),
                    cloud_event_type: event.event_type.clone(),
                    api_version: event.api_version.clone(),
                    timestamp: event.timestamp,
                    data: event.data.clone(),
                    next_delivery_attempt: Utc::now(),
                },
            )
            .await?;

            created.push(message.id);
        }

        tracing::info!(
            target: "webhook_delivery",
            cloud_event_id = %cloud_event_id,
            event_type = %event.event_type,
            message_count = created.len(),
            "Enqueued webhook messages for event"
        );

        Ok(created)
    }
}
