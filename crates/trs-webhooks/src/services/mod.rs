//! Webhook services.

pub mod endpoint_service;
pub mod event_mapper;
