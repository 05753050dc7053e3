//! HTTP handlers for the webhook management API.

pub mod endpoints;
pub mod messages;
