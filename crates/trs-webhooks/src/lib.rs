//! CloudEvents webhook delivery for the Teaching Record System.
//!
//! Provides endpoint registration, event-to-message mapping, and a polling
//! background worker that delivers CloudEvents-formatted HTTP POSTs with
//! RFC 9421-style message signatures and a fixed retry backoff schedule.

pub mod backoff;
pub mod cache;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod sender;
pub mod services;
pub mod signer;
pub mod validation;
pub mod worker;

pub use cache::EndpointCache;
pub use error::WebhookError;
pub use router::{webhooks_router, WebhooksState};
pub use sender::WebhookSender;
pub use services::event_mapper::{EventMapper, WebhookEvent};
pub use signer::RequestSigner;
pub use worker::{DeliveryWorker, WorkerConfig};
