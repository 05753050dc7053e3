//! Webhook endpoint CRUD service.

use sqlx::PgPool;
use uuid::Uuid;

use trs_db::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};

use crate::error::WebhookError;
use crate::models::{
    CreateEndpointRequest, EndpointListResponse, EndpointResponse, ListEndpointsQuery,
    UpdateEndpointRequest,
};
use crate::validation;

/// Service for webhook endpoint operations.
#[derive(Clone)]
pub struct EndpointService {
    pool: PgPool,
    allow_http: bool,
}

impl EndpointService {
    /// Create a new endpoint service.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            allow_http: false,
        }
    }

    /// Allow HTTP addresses (for development/testing).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Register a new endpoint.
    pub async fn create_endpoint(
        &self,
        request: CreateEndpointRequest,
    ) -> Result<EndpointResponse, WebhookError> {
        validation::validate_endpoint_address(&request.address, self.allow_http)?;
        validation::validate_cloud_event_types(&request.cloud_event_types)?;
        validation::validate_api_version(&request.api_version)?;

        let endpoint = WebhookEndpoint::create(
            &self.pool,
            CreateWebhookEndpoint {
                application_id: request.application_id,
                address: request.address,
                api_version: request.api_version,
                cloud_event_types: request.cloud_event_types,
                enabled: request.enabled,
            },
        )
        .await?;

        Ok(endpoint_to_response(endpoint))
    }

    /// List endpoints with pagination.
    pub async fn list_endpoints(
        &self,
        query: ListEndpointsQuery,
    ) -> Result<EndpointListResponse, WebhookError> {
        let limit = query.limit.clamp(1, 100);
        let offset = query.offset.max(0);

        let endpoints = WebhookEndpoint::list(&self.pool, limit, offset).await?;
        let total = WebhookEndpoint::count(&self.pool).await?;

        Ok(EndpointListResponse {
            items: endpoints.into_iter().map(endpoint_to_response).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Get a single endpoint.
    pub async fn get_endpoint(&self, id: Uuid) -> Result<EndpointResponse, WebhookError> {
        let endpoint = WebhookEndpoint::find_by_id(&self.pool, id)
            .await?
            .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Apply a partial update to an endpoint.
    pub async fn update_endpoint(
        &self,
        id: Uuid,
        request: UpdateEndpointRequest,
    ) -> Result<EndpointResponse, WebhookError> {
        if let Some(ref address) = request.address {
            validation::validate_endpoint_address(address, self.allow_http)?;
        }
        if let Some(ref types) = request.cloud_event_types {
            validation::validate_cloud_event_types(types)?;
        }
        if let Some(ref api_version) = request.api_version {
            validation::validate_api_version(api_version)?;
        }

        let endpoint = WebhookEndpoint::update(
            &self.pool,
            id,
            UpdateWebhookEndpoint {
                address: request.address,
                api_version: request.api_version,
                cloud_event_types: request.cloud_event_types,
                enabled: request.enabled,
            },
        )
        .await?
        .ok_or(WebhookError::EndpointNotFound)?;

        Ok(endpoint_to_response(endpoint))
    }

    /// Toggle the active flag for every endpoint owned by an application.
    /// Returns the number of endpoints affected.
    pub async fn set_application_active(
        &self,
        application_id: Uuid,
        active: bool,
    ) -> Result<u64, WebhookError> {
        let updated =
            WebhookEndpoint::set_application_active(&self.pool, application_id, active).await?;
        Ok(updated)
    }

    /// Delete an endpoint.
    pub async fn delete_endpoint(&self, id: Uuid) -> Result<(), WebhookError> {
        let deleted = WebhookEndpoint::delete(&self.pool, id).await?;
        if !deleted {
            return Err(WebhookError::EndpointNotFound);
        }
        Ok(())
    }
}

/// Convert a DB model to an API response.
fn endpoint_to_response(endpoint: WebhookEndpoint) -> EndpointResponse {
    EndpointResponse {
        id: endpoint.id,
        application_id: endpoint.application_id,
        address: endpoint.address,
        api_version: endpoint.api_version,
        cloud_event_types: endpoint.cloud_event_types,
        enabled: endpoint.enabled,
        application_active: endpoint.application_active,
        created_at: endpoint.created_at,
        updated_at: endpoint.updated_at,
    }
}
