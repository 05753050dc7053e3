//! Webhook endpoint model.
//!
//! An endpoint is a consumer-registered delivery target: a URL, the API
//! version it speaks, and the CloudEvent types it subscribes to. Endpoints
//! belong to an application; a disabled endpoint or an inactive application
//! stops delivery without deleting history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered webhook delivery target.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub application_id: Uuid,
    pub address: String,
    pub api_version: String,
    pub cloud_event_types: Vec<String>,
    pub enabled: bool,
    pub application_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for registering a new endpoint.
#[derive(Debug, Clone)]
pub struct CreateWebhookEndpoint {
    pub application_id: Uuid,
    pub address: String,
    pub api_version: String,
    pub cloud_event_types: Vec<String>,
    pub enabled: bool,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateWebhookEndpoint {
    pub address: Option<String>,
    pub api_version: Option<String>,
    pub cloud_event_types: Option<Vec<String>>,
    pub enabled: Option<bool>,
}

impl WebhookEndpoint {
    /// Register a new endpoint.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: CreateWebhookEndpoint,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_endpoints (
                application_id, address, api_version, cloud_event_types, enabled
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.application_id)
        .bind(&input.address)
        .bind(&input.api_version)
        .bind(&input.cloud_event_types)
        .bind(input.enabled)
        .fetch_one(pool)
        .await
    }

    /// Find an endpoint by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_endpoints WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List all endpoints, newest first.
    pub async fn list(
        pool: &sqlx::PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_endpoints
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Count all endpoints.
    pub async fn count(pool: &sqlx::PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM webhook_endpoints"#)
            .fetch_one(pool)
            .await
    }

    /// All endpoints eligible for delivery: enabled, with an active owning
    /// application. Used by the publish-side endpoint cache.
    pub async fn find_active(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_endpoints
            WHERE enabled AND application_active
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Apply a partial update.
    pub async fn update(
        pool: &sqlx::PgPool,
        id: Uuid,
        input: UpdateWebhookEndpoint,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE webhook_endpoints
            SET address = COALESCE($2, address),
                api_version = COALESCE($3, api_version),
                cloud_event_types = COALESCE($4, cloud_event_types),
                enabled = COALESCE($5, enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.address.as_deref())
        .bind(input.api_version.as_deref())
        .bind(input.cloud_event_types.as_deref())
        .bind(input.enabled)
        .fetch_optional(pool)
        .await
    }

    /// Delete an endpoint. Fails if messages still reference it.
    pub async fn delete(pool: &sqlx::PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM webhook_endpoints WHERE id = $1"#)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Toggle the owning application's active flag across all of its
    /// endpoints. Inactive applications are skipped by the delivery loop.
    pub async fn set_application_active(
        pool: &sqlx::PgPool,
        application_id: Uuid,
        active: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_endpoints
            SET application_active = $2, updated_at = NOW()
            WHERE application_id = $1
            "#,
        )
        .bind(application_id)
        .bind(active)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Whether this endpoint subscribes to the given CloudEvent type at the
    /// given API version.
    #[must_use]
    pub fn subscribes_to(&self, api_version: &str, cloud_event_type: &str) -> bool {
        self.api_version == api_version
            && self
                .cloud_event_types
                .iter()
                .any(|t| t == cloud_event_type)
    }
}
