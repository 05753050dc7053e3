//! Common test utilities for trs-webhooks integration tests.
//!
//! Provides wiremock responders for capturing and failing deliveries, test
//! fixtures for due messages, and a signature verification helper that
//! reconstructs the signature base the way a consuming service would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use p384::ecdsa::signature::Verifier;
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use trs_db::DueWebhookMessage;
use trs_webhooks::signer::RequestSigner;
use trs_webhooks::WebhookSender;

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// CloudEvents source used by test senders.
pub const TEST_SOURCE: &str = "https://trs.example.org";

/// Key ID used by test signers.
pub const TEST_KEY_ID: &str = "trs-webhook-test-1";

/// Generate a fresh P-384 keypair for a test.
pub fn test_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
    let verifying_key = VerifyingKey::from(&signing_key);
    (signing_key, verifying_key)
}

/// Build a sender and the verifying key matching its signature headers.
pub fn test_sender() -> (WebhookSender, VerifyingKey) {
    let (signing_key, verifying_key) = test_keypair();
    let signer = RequestSigner::from_signing_key(signing_key, TEST_KEY_ID);
    let sender = WebhookSender::new(signer, TEST_SOURCE).expect("failed to build sender");
    (sender, verifying_key)
}

/// A due message addressed at `address` with no prior attempts.
pub fn due_message(address: &str) -> DueWebhookMessage {
    DueWebhookMessage {
        id: Uuid::new_v4(),
        webhook_endpoint_id: Uuid::new_v4(),
        cloud_event_id: Uuid::new_v4().to_string(),
        cloud_event_type: "alert.created".to_string(),
        api_version: "20240101".to_string(),
        timestamp: Utc::now(),
        data: serde_json::json!({"trn": "1234567", "alertTypeId": 7}),
        delivery_attempts: vec![],
        endpoint_address: address.to_string(),
    }
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting webhook requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with URL, body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns success
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
}

impl CaptureResponder {
    /// Create a new capture responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: 200,
        }
    }

    /// Create a capture responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
        }
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        // wiremock substitutes a placeholder authority (`localhost`, no port)
        // when the request line is in origin-form; restore the authority the
        // client actually targeted from the Host header.
        let mut url = request.url.clone();
        if let Some(host) = request
            .headers
            .get("host")
            .and_then(|v| v.to_str().ok())
        {
            if let Some((name, port)) = host.rsplit_once(':') {
                let _ = url.set_host(Some(name));
                let _ = url.set_port(port.parse().ok());
            } else {
                let _ = url.set_host(Some(host));
                let _ = url.set_port(None);
            }
        }
        let captured = CapturedRequest {
            url: url.to_string(),
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// CountingResponder - counts requests
// ---------------------------------------------------------------------------

/// A wiremock responder that counts incoming requests.
#[derive(Clone)]
pub struct CountingResponder {
    count: Arc<AtomicU32>,
    response_code: u16,
}

impl CountingResponder {
    /// Create a new counting responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: 200,
        }
    }

    /// Create a counting responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: status,
        }
    }

    /// Get the current request count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Respond for CountingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.count.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// FailingResponder - fails N times then succeeds
// ---------------------------------------------------------------------------

/// A wiremock responder that fails a specified number of times before succeeding.
#[derive(Clone)]
pub struct FailingResponder {
    attempt_count: Arc<AtomicU32>,
    failures_before_success: u32,
    failure_code: u16,
    success_code: u16,
}

impl FailingResponder {
    /// Create a responder that fails `n` times with 500, then returns 200.
    pub fn fail_times(n: u32) -> Self {
        Self {
            attempt_count: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
            failure_code: 500,
            success_code: 200,
        }
    }

    /// Get the current attempt count.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.attempt_count.fetch_add(1, Ordering::SeqCst);
        if n < self.failures_before_success {
            ResponseTemplate::new(self.failure_code)
        } else {
            ResponseTemplate::new(self.success_code)
        }
    }
}

// ---------------------------------------------------------------------------
// Signature verification
// ---------------------------------------------------------------------------

/// Verify a captured request's message signature the way a consumer would:
/// rebuild the signature base from the request URL, the digest and length of
/// the received body, and the `ce-*` headers, then check the detached
/// signature against the producer's public key.
pub fn verify_captured_signature(captured: &CapturedRequest, key: &VerifyingKey) -> bool {
    let (digest, ce_id, ce_type, ce_time, signature_input, signature) = match (
        captured.header("content-digest"),
        captured.header("ce-id"),
        captured.header("ce-type"),
        captured.header("ce-time"),
        captured.header("signature-input"),
        captured.header("signature"),
    ) {
        (Some(a), Some(b), Some(c), Some(d), Some(e), Some(f)) => (a, b, c, d, e, f),
        _ => return false,
    };

    let params = match signature_input.strip_prefix("sig1=") {
        Some(p) => p,
        None => return false,
    };

    let base = format!(
        "\"@target-uri\": {}\n\
         \"content-digest\": {}\n\
         \"content-length\": {}\n\
         \"ce-id\": {}\n\
         \"ce-type\": {}\n\
         \"ce-time\": {}\n\
         \"@signature-params\": {}",
        captured.url,
        digest,
        captured.body.len(),
        ce_id,
        ce_type,
        ce_time,
        params
    );

    let raw = match signature
        .strip_prefix("sig1=:")
        .and_then(|s| s.strip_suffix(':'))
        .and_then(|s| BASE64.decode(s).ok())
    {
        Some(r) => r,
        None => return false,
    };
    let signature = match Signature::from_slice(&raw) {
        Ok(s) => s,
        Err(_) => return false,
    };

    key.verify(base.as_bytes(), &signature).is_ok()
}
