//! Request/response DTOs for the webhook management API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Endpoint DTOs
// ---------------------------------------------------------------------------

/// Request body for registering a webhook endpoint.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEndpointRequest {
    pub application_id: Uuid,
    pub address: String,
    pub api_version: String,
    pub cloud_event_types: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Request body for updating a webhook endpoint.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEndpointRequest {
    pub address: Option<String>,
    pub api_version: Option<String>,
    pub cloud_event_types: Option<Vec<String>>,
    pub enabled: Option<bool>,
}

/// A webhook endpoint as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointResponse {
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

/// Paginated endpoint list.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointListResponse {
    pub items: Vec<EndpointResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Pagination query for endpoint listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEndpointsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Request body for toggling an application's active flag across all of its
/// endpoints.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetApplicationActiveRequest {
    pub active: bool,
}

/// Result of an application toggle.
#[derive(Debug, Serialize, ToSchema)]
pub struct SetApplicationActiveResponse {
    pub application_id: Uuid,
    pub active: bool,
    pub endpoints_updated: u64,
}

// ---------------------------------------------------------------------------
// Message DTOs
// ---------------------------------------------------------------------------

/// Query parameters for message history listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMessagesQuery {
    /// Filter by delivery status: `pending`, `delivered` or `failed`.
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// A webhook message summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub webhook_endpoint_id: Uuid,
    pub cloud_event_id: String,
    pub cloud_event_type: String,
    pub api_version: String,
    pub status: String,
    pub delivered: Option<DateTime<Utc>>,
    pub next_delivery_attempt: Option<DateTime<Utc>>,
    pub attempt_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A webhook message with full delivery history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageDetailResponse {
    pub id: Uuid,
    pub webhook_endpoint_id: Uuid,
    pub cloud_event_id: String,
    pub cloud_event_type: String,
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub status: String,
    pub delivered: Option<DateTime<Utc>>,
    pub next_delivery_attempt: Option<DateTime<Utc>>,
    pub delivery_attempts: Vec<DateTime<Utc>>,
    pub delivery_errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Paginated message list.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageListResponse {
    pub items: Vec<MessageResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
