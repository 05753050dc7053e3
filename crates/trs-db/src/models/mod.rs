//! Database entity models.

pub mod webhook_endpoint;
pub mod webhook_message;

pub use webhook_endpoint::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};
pub use webhook_message::{CreateWebhookMessage, DueWebhookMessage, WebhookMessage};
