//! Database layer for the TRS webhook delivery service.
//!
//! Provides sqlx-backed models for webhook endpoints and outbound webhook
//! messages, embedded migrations, and a shared error type.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::connect;
pub use models::{
    CreateWebhookEndpoint, CreateWebhookMessage, DueWebhookMessage, UpdateWebhookEndpoint,
    WebhookEndpoint, WebhookMessage,
};
