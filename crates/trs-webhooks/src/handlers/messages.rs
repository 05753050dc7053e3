//! Delivery history handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use trs_db::{WebhookEndpoint, WebhookMessage};

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    ListMessagesQuery, MessageDetailResponse, MessageListResponse, MessageResponse,
};
use crate::router::WebhooksState;

/// List messages for an endpoint, newest first.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/messages",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID"),
        ListMessagesQuery
    ),
    responses(
        (status = 200, description = "Paginated message list", body = MessageListResponse),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn list_endpoint_messages_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<MessageListResponse>> {
    WebhookEndpoint::find_by_id(state.pool(), id)
        .await?
        .ok_or(WebhookError::EndpointNotFound)?;

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);
    let status = query.status.as_deref();

    let messages =
        WebhookMessage::list_by_endpoint(state.pool(), id, status, limit, offset).await?;
    let total = WebhookMessage::count_by_endpoint(state.pool(), id, status).await?;

    Ok(Json(MessageListResponse {
        items: messages.into_iter().map(message_to_response).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get a single message with its full delivery history.
#[utoipa::path(
    get,
    path = "/webhooks/messages/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Message ID")
    ),
    responses(
        (status = 200, description = "Message details", body = MessageDetailResponse),
        (status = 404, description = "Message not found"),
    )
)]
pub async fn get_message_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageDetailResponse>> {
    let message = WebhookMessage::find_by_id(state.pool(), id)
        .await?
        .ok_or(WebhookError::MessageNotFound)?;

    Ok(Json(message_to_detail(message)))
}

fn message_to_response(message: WebhookMessage) -> MessageResponse {
    let status = message.status().to_string();
    MessageResponse {
        id: message.id,
        webhook_endpoint_id: message.webhook_endpoint_id,
        cloud_event_id: message.cloud_event_id,
        cloud_event_type: message.cloud_event_type,
        api_version: message.api_version,
        status,
        delivered: message.delivered,
        next_delivery_attempt: message.next_delivery_attempt,
        attempt_count: message.delivery_attempts.len(),
        created_at: message.created_at,
    }
}

fn message_to_detail(message: WebhookMessage) -> MessageDetailResponse {
    let status = message.status().to_string();
    MessageDetailResponse {
        id: message.id,
        webhook_endpoint_id: message.webhook_endpoint_id,
        cloud_event_id: message.cloud_event_id,
        cloud_event_type: message.cloud_event_type,
        api_version: message.api_version,
        timestamp: message.timestamp,
        data: message.data,
        status,
        delivered: message.delivered,
        next_delivery_attempt: message.next_delivery_attempt,
        delivery_attempts: message.delivery_attempts,
        delivery_errors: message.delivery_errors,
        created_at: message.created_at,
    }
}
