//! CRUD handlers for webhook endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{
    CreateEndpointRequest, EndpointListResponse, EndpointResponse, ListEndpointsQuery,
    SetApplicationActiveRequest, SetApplicationActiveResponse, UpdateEndpointRequest,
};
use crate::router::WebhooksState;

/// Register a new webhook endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    request_body = CreateEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created", body = EndpointResponse),
        (status = 400, description = "Validation error"),
    )
)]
pub async fn create_endpoint_handler(
    State(state): State<WebhooksState>,
    Json(request): Json<CreateEndpointRequest>,
) -> ApiResult<(StatusCode, Json<EndpointResponse>)> {
    let response = state.endpoint_service.create_endpoint(request).await?;
    state.endpoint_cache.invalidate().await;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List webhook endpoints.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    params(ListEndpointsQuery),
    responses(
        (status = 200, description = "Paginated endpoint list", body = EndpointListResponse),
    )
)]
pub async fn list_endpoints_handler(
    State(state): State<WebhooksState>,
    Query(query): Query<ListEndpointsQuery>,
) -> ApiResult<Json<EndpointListResponse>> {
    let response = state.endpoint_service.list_endpoints(query).await?;

    Ok(Json(response))
}

/// Get a single webhook endpoint.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    responses(
        (status = 200, description = "Endpoint details", body = EndpointResponse),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn get_endpoint_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EndpointResponse>> {
    let response = state.endpoint_service.get_endpoint(id).await?;

    Ok(Json(response))
}

/// Update a webhook endpoint.
#[utoipa::path(
    patch,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    request_body = UpdateEndpointRequest,
    responses(
        (status = 200, description = "Endpoint updated", body = EndpointResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn update_endpoint_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEndpointRequest>,
) -> ApiResult<Json<EndpointResponse>> {
    let response = state.endpoint_service.update_endpoint(id, request).await?;
    state.endpoint_cache.invalidate().await;

    Ok(Json(response))
}

/// Delete a webhook endpoint.
#[utoipa::path(
    delete,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(
        ("id" = Uuid, Path, description = "Endpoint ID")
    ),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn delete_endpoint_handler(
    State(state): State<WebhooksState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.endpoint_service.delete_endpoint(id).await?;
    state.endpoint_cache.invalidate().await;

    Ok(StatusCode::NO_CONTENT)
}

/// Toggle an application's active flag across all of its endpoints.
#[utoipa::path(
    put,
    path = "/webhooks/applications/{application_id}/active",
    tag = "Webhooks",
    params(
        ("application_id" = Uuid, Path, description = "Application ID")
    ),
    request_body = SetApplicationActiveRequest,
    responses(
        (status = 200, description = "Application toggled", body = SetApplicationActiveResponse),
    )
)]
pub async fn set_application_active_handler(
    State(state): State<WebhooksState>,
    Path(application_id): Path<Uuid>,
    Json(request): Json<SetApplicationActiveRequest>,
) -> ApiResult<Json<SetApplicationActiveResponse>> {
    let endpoints_updated = state
        .endpoint_service
        .set_application_active(application_id, request.active)
        .await?;
    state.endpoint_cache.invalidate().await;

    Ok(Json(SetApplicationActiveResponse {
        application_id,
        active: request.active,
        endpoints_updated,
    }))
}
