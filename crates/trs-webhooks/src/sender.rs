//! CloudEvents binary-mode HTTP sender.
//!
//! Builds the outbound POST for a claimed message: CloudEvents context
//! attributes as `ce-*` headers, the JSON payload as the body, a SHA-256
//! `Content-Digest`, and the detached message signature from
//! [`crate::signer::RequestSigner`].

use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;

use trs_db::DueWebhookMessage;

use crate::error::WebhookError;
use crate::signer::{RequestSigner, SigningInput};

/// Content type for CloudEvents binary-mode JSON payloads.
const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sends signed CloudEvents webhook requests.
#[derive(Clone)]
pub struct WebhookSender {
    http_client: Client,
    signer: RequestSigner,
    source: String,
}

impl WebhookSender {
    /// Create a sender with a shared HTTP client.
    ///
    /// `source` is the CloudEvents `source` URI identifying this producer.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(signer: RequestSigner, source: impl Into<String>) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("trs-webhooks/1.0")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            signer,
            source: source.into(),
        })
    }

    /// Deliver a single message to its endpoint.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::DeliveryFailed` for any transport error or
    /// non-2xx response status.
    pub async fn send(&self, message: &DueWebhookMessage) -> Result<(), WebhookError> {
        let body = serde_json::to_vec(&message.data)
            .map_err(|e| WebhookError::Internal(format!("Failed to serialize payload: {e}")))?;

        let ce_time = message
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let signature_headers = self.signer.sign(
            &SigningInput {
                target_uri: &message.endpoint_address,
                content_length: body.len(),
                ce_id: &message.cloud_event_id,
                ce_type: &message.cloud_event_type,
                ce_time: &ce_time,
                created: Utc::now().timestamp(),
            },
            &body,
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, header_value(CONTENT_TYPE_JSON)?);
        headers.insert("ce-specversion", header_value("1.0")?);
        headers.insert("ce-id", header_value(&message.cloud_event_id)?);
        headers.insert("ce-type", header_value(&message.cloud_event_type)?);
        headers.insert("ce-time", header_value(&ce_time)?);
        headers.insert("ce-source", header_value(&self.source)?);
        headers.insert(
            "ce-dataschema",
            header_value(&self.data_schema(&message.api_version))?,
        );
        headers.insert("ce-datacontenttype", header_value(CONTENT_TYPE_JSON)?);
        headers.insert(
            "content-digest",
            header_value(&signature_headers.content_digest)?,
        );
        headers.insert(
            "signature-input",
            header_value(&signature_headers.signature_input)?,
        );
        headers.insert("signature", header_value(&signature_headers.signature)?);

        let response = self
            .http_client
            .post(&message.endpoint_address)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let detail = if e.is_timeout() {
                    format!("Request timeout ({REQUEST_TIMEOUT_SECS}s)")
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                WebhookError::DeliveryFailed(detail)
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WebhookError::DeliveryFailed(format!(
                "HTTP {}",
                status.as_u16()
            )))
        }
    }

    /// CloudEvents `dataschema` URI for a given API version.
    fn data_schema(&self, api_version: &str) -> String {
        format!(
            "{}/swagger/v{api_version}.json",
            self.source.trim_end_matches('/')
        )
    }
}

/// Parse a header value, surfacing invalid characters as an internal error.
fn header_value(value: &str) -> Result<HeaderValue, WebhookError> {
    value
        .parse()
        .map_err(|e| WebhookError::Internal(format!("Invalid header value: {e}")))
}
