//! HTTP message signing for outbound webhook requests.
//!
//! Produces a detached RFC 9421-style signature (label `sig1`) over a fixed
//! set of request components: the target URI, the content digest, the
//! content length, and the `ce-id`, `ce-type` and `ce-time` CloudEvents
//! headers. Signatures use ECDSA P-384 over SHA-384, with the signing key
//! identified by a configured key ID.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use p384::ecdsa::{signature::Signer, Signature, SigningKey};
use p384::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};

use crate::error::WebhookError;

/// Signature label carried in `Signature-Input` and `Signature`.
const SIGNATURE_LABEL: &str = "sig1";

/// Covered components, in signing order.
const COVERED_COMPONENTS: [&str; 6] = [
    "@target-uri",
    "content-digest",
    "content-length",
    "ce-id",
    "ce-type",
    "ce-time",
];

/// The signed components of a single webhook request, ready to attach as
/// HTTP headers.
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    /// `Content-Digest` header value (`sha-256=:BASE64:`).
    pub content_digest: String,
    /// `Signature-Input` header value.
    pub signature_input: String,
    /// `Signature` header value.
    pub signature: String,
}

/// Request components covered by the signature.
#[derive(Debug, Clone)]
pub struct SigningInput<'a> {
    pub target_uri: &'a str,
    pub content_length: usize,
    pub ce_id: &'a str,
    pub ce_type: &'a str,
    pub ce_time: &'a str,
    /// Unix timestamp for the `created` signature parameter.
    pub created: i64,
}

/// Signs webhook request components with an ECDSA P-384 key.
#[derive(Clone)]
pub struct RequestSigner {
    signing_key: SigningKey,
    key_id: String,
}

impl RequestSigner {
    /// Build a signer from a PKCS#8 PEM-encoded P-384 private key.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidSigningKey` if the PEM cannot be parsed
    /// as a P-384 private key.
    pub fn from_pem(pem: &str, key_id: impl Into<String>) -> Result<Self, WebhookError> {
        let secret = p384::SecretKey::from_pkcs8_pem(pem)
            .map_err(|e| WebhookError::InvalidSigningKey(e.to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from(&secret),
            key_id: key_id.into(),
        })
    }

    /// Build a signer directly from key material (used by tests).
    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey, key_id: impl Into<String>) -> Self {
        Self {
            signing_key,
            key_id: key_id.into(),
        }
    }

    /// The configured key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request, producing the digest and signature headers.
    #[must_use]
    pub fn sign(&self, input: &SigningInput<'_>, body: &[u8]) -> SignatureHeaders {
        let digest = content_digest(body);
        let params = self.signature_params(input.created);
        let base = signature_base(input, &digest, &params);

        let signature: Signature = self.signing_key.sign(base.as_bytes());

        SignatureHeaders {
            content_digest: digest,
            signature_input: format!("{SIGNATURE_LABEL}={params}"),
            signature: format!("{SIGNATURE_LABEL}=:{}:", BASE64.encode(signature.to_bytes())),
        }
    }

    /// The `@signature-params` value for a given creation time.
    fn signature_params(&self, created: i64) -> String {
        let components = COVERED_COMPONENTS
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "({components});created={created};keyid=\"{}\";alg=\"ecdsa-p384-sha384\"",
            self.key_id
        )
    }
}

/// Compute a `Content-Digest` header value (SHA-256, structured-field byte
/// sequence format).
#[must_use]
pub fn content_digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("sha-256=:{}:", BASE64.encode(hash))
}

/// Build the canonical signature base string.
///
/// One line per covered component in signing order, terminated by the
/// `@signature-params` line, with no trailing newline.
fn signature_base(input: &SigningInput<'_>, digest: &str, params: &str) -> String {
    format!(
        "\"@target-uri\": {}\n\
         \"content-digest\": {}\n\
         \"content-length\": {}\n\
         \"ce-id\": {}\n\
         \"ce-type\": {}\n\
         \"ce-time\": {}\n\
         \"@signature-params\": {}",
        input.target_uri, digest, input.content_length, input.ce_id, input.ce_type, input.ce_time, params
    )
}
