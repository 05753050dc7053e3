//! Axum router setup for the webhook management API.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

use crate::cache::EndpointCache;
use crate::handlers::{endpoints, messages};
use crate::services::endpoint_service::EndpointService;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub endpoint_service: Arc<EndpointService>,
    pub endpoint_cache: Arc<EndpointCache>,
    pool: PgPool,
}

impl WebhooksState {
    /// Create a new webhooks state.
    #[must_use]
    pub fn new(pool: PgPool, endpoint_cache: Arc<EndpointCache>, allow_http: bool) -> Self {
        Self {
            endpoint_service: Arc::new(
                EndpointService::new(pool.clone()).with_allow_http(allow_http),
            ),
            endpoint_cache,
            pool,
        }
    }

    /// Get a reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Endpoint CRUD
        .route(
            "/webhooks/endpoints",
            post(endpoints::create_endpoint_handler).get(endpoints::list_endpoints_handler),
        )
        .route(
            "/webhooks/endpoints/{id}",
            get(endpoints::get_endpoint_handler)
                .patch(endpoints::update_endpoint_handler)
                .delete(endpoints::delete_endpoint_handler),
        )
        // Application toggle
        .route(
            "/webhooks/applications/{application_id}/active",
            put(endpoints::set_application_active_handler),
        )
        // Delivery history
        .route(
            "/webhooks/endpoints/{id}/messages",
            get(messages::list_endpoint_messages_handler),
        )
        .route(
            "/webhooks/messages/{id}",
            get(messages::get_message_handler),
        )
        .with_state(state)
}
