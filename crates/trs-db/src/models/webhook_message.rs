//! Outbound webhook message model.
//!
//! One row per (endpoint, event) pairing, created at publish time and
//! mutated only by the delivery loop. `delivered` and a non-null
//! `next_delivery_attempt` are mutually exclusive: a delivered message is
//! terminal, a message with a retry scheduled is pending, and a message with
//! neither (after at least one attempt) has exhausted its retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An outbound webhook message with its delivery state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub id: Uuid,
    pub webhook_endpoint_id: Uuid,
    pub cloud_event_id: String,
    pub cloud_event_type: String,
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub delivered: Option<DateTime<Utc>>,
    pub next_delivery_attempt: Option<DateTime<Utc>>,
    pub delivery_attempts: Vec<DateTime<Utc>>,
    pub delivery_errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for enqueuing a new message.
#[derive(Debug, Clone)]
pub struct CreateWebhookMessage {
    pub webhook_endpoint_id: Uuid,
    pub cloud_event_id: String,
    pub cloud_event_type: String,
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub next_delivery_attempt: DateTime<Utc>,
}

/// A claimed due message joined with the endpoint fields the sender needs.
#[derive(Debug, Clone, FromRow)]
pub struct DueWebhookMessage {
    pub id: Uuid,
    pub webhook_endpoint_id: Uuid,
    pub cloud_event_id: String,
    pub cloud_event_type: String,
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub delivery_attempts: Vec<DateTime<Utc>>,
    pub endpoint_address: String,
}

impl WebhookMessage {
    /// Enqueue a new message for delivery.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: CreateWebhookMessage,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_messages (
                webhook_endpoint_id, cloud_event_id, cloud_event_type,
                api_version, "timestamp", data, next_delivery_attempt
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(input.webhook_endpoint_id)
        .bind(&input.cloud_event_id)
        .bind(&input.cloud_event_type)
        .bind(&input.api_version)
        .bind(input.timestamp)
        .bind(&input.data)
        .bind(input.next_delivery_attempt)
        .fetch_one(pool)
        .await
    }

    /// Find a message by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(r#"SELECT * FROM webhook_messages WHERE id = $1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List messages for an endpoint, newest first, with an optional status
    /// filter (`pending`, `delivered`, `failed`).
    pub async fn list_by_endpoint(
        pool: &sqlx::PgPool,
        webhook_endpoint_id: Uuid,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT * FROM webhook_messages
            WHERE webhook_endpoint_id = $1
            "#,
        );
        query.push_str(status_predicate(status));
        query.push_str(" ORDER BY created_at DESC LIMIT $2 OFFSET $3");

        sqlx::query_as(&query)
            .bind(webhook_endpoint_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count messages for an endpoint with an optional status filter.
    pub async fn count_by_endpoint(
        pool: &sqlx::PgPool,
        webhook_endpoint_id: Uuid,
        status: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT COUNT(*) FROM webhook_messages
            WHERE webhook_endpoint_id = $1
            "#,
        );
        query.push_str(status_predicate(status));

        sqlx::query_scalar(&query)
            .bind(webhook_endpoint_id)
            .fetch_one(pool)
            .await
    }

    /// Claim due messages for delivery.
    ///
    /// Must be called inside a transaction: `FOR UPDATE OF m SKIP LOCKED`
    /// makes the claimed rows invisible to concurrent pollers until the
    /// transaction commits, which is the sole cross-process coordination
    /// mechanism. Messages whose endpoint is disabled (or whose application
    /// is inactive) are excluded from the batch entirely.
    pub async fn claim_due(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        limit: i64,
    ) -> Result<Vec<DueWebhookMessage>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT
                m.id, m.webhook_endpoint_id, m.cloud_event_id,
                m.cloud_event_type, m.api_version, m."timestamp", m.data,
                m.delivery_attempts, e.address AS endpoint_address
            FROM webhook_messages m
            JOIN webhook_endpoints e ON e.id = m.webhook_endpoint_id
            WHERE m.delivered IS NULL
              AND m.next_delivery_attempt IS NOT NULL
              AND m.next_delivery_attempt <= NOW()
              AND e.enabled
              AND e.application_active
            ORDER BY m.next_delivery_attempt
            LIMIT $1
            FOR UPDATE OF m SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&mut **tx)
        .await
    }

    /// Record a successful attempt: set `delivered`, clear the retry schedule.
    pub async fn mark_delivered(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        attempted_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_messages
            SET delivered = $2,
                next_delivery_attempt = NULL,
                delivery_attempts = array_append(delivery_attempts, $2)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempted_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Record a failed attempt: append the error, and either schedule the
    /// next attempt or leave `next_delivery_attempt` NULL (terminal failure).
    pub async fn mark_failed(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        attempted_at: DateTime<Utc>,
        error: &str,
        next_delivery_attempt: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_messages
            SET next_delivery_attempt = $4,
                delivery_attempts = array_append(delivery_attempts, $2),
                delivery_errors = array_append(delivery_errors, $3)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempted_at)
        .bind(error)
        .bind(next_delivery_attempt)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Delivery status derived from the row's state.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.delivered.is_some() {
            "delivered"
        } else if self.next_delivery_attempt.is_some() {
            "pending"
        } else {
            "failed"
        }
    }
}

/// SQL predicate fragment for the derived delivery status.
fn status_predicate(status: Option<&str>) -> &'static str {
    match status {
        Some("delivered") => " AND delivered IS NOT NULL",
        Some("pending") => " AND delivered IS NULL AND next_delivery_attempt IS NOT NULL",
        Some("failed") => " AND delivered IS NULL AND next_delivery_attempt IS NULL",
        _ => "",
    }
}
