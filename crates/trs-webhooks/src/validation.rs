//! Validation for webhook endpoint registrations.
//!
//! Endpoint addresses must be well-formed HTTPS URLs (HTTP is permitted in
//! development) without userinfo or fragments; CloudEvent type lists must be
//! non-empty, as must the API version.

use crate::error::WebhookError;

/// Validate a webhook endpoint address.
pub fn validate_endpoint_address(address: &str, allow_http: bool) -> Result<(), WebhookError> {
    let parsed = url::Url::parse(address)
        .map_err(|e| WebhookError::InvalidAddress(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(WebhookError::InvalidAddress(
                "Endpoint addresses must use HTTPS".to_string(),
            ));
        }
        scheme => {
            return Err(WebhookError::InvalidAddress(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(WebhookError::InvalidAddress(
            "Endpoint address must have a host".to_string(),
        ));
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(WebhookError::InvalidAddress(
            "Endpoint address must not contain credentials".to_string(),
        ));
    }

    if parsed.fragment().is_some() {
        return Err(WebhookError::InvalidAddress(
            "Endpoint address must not contain a fragment".to_string(),
        ));
    }

    Ok(())
}

/// Validate a CloudEvent type subscription list.
///
/// Types are dotted segments like `alert.created`; an empty list would make
/// the endpoint unreachable by any event.
pub fn validate_cloud_event_types(types: &[String]) -> Result<(), WebhookError> {
    if types.is_empty() {
        return Err(WebhookError::Validation(
            "At least one CloudEvent type is required".to_string(),
        ));
    }

    for t in types {
        if t.is_empty()
            || !t
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
        {
            return Err(WebhookError::Validation(format!(
                "Invalid CloudEvent type: {t}"
            )));
        }
    }

    Ok(())
}

/// Validate an API version string (date-based, e.g. `20240101`).
pub fn validate_api_version(api_version: &str) -> Result<(), WebhookError> {
    if api_version.is_empty() || !api_version.chars().all(|c| c.is_ascii_digit()) {
        return Err(WebhookError::Validation(format!(
            "Invalid API version: {api_version}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Address validation ---

    #[test]
    fn valid_https_address() {
        assert!(validate_endpoint_address("https://consumer.example.com/hook", false).is_ok());
    }

    #[test]
    fn valid_https_address_with_port() {
        assert!(validate_endpoint_address("https://hooks.example.com:8443/cb", false).is_ok());
    }

    #[test]
    fn http_rejected_by_default() {
        let result = validate_endpoint_address("http://consumer.example.com/hook", false);
        assert!(matches!(result, Err(WebhookError::InvalidAddress(_))));
    }

    #[test]
    fn http_allowed_in_development() {
        assert!(validate_endpoint_address("http://localhost:8080/hook", true).is_ok());
    }

    #[test]
    fn unsupported_scheme_rejected() {
        assert!(validate_endpoint_address("ftp://example.com/hook", false).is_err());
    }

    #[test]
    fn malformed_url_rejected() {
        assert!(validate_endpoint_address("not-a-url", false).is_err());
    }

    #[test]
    fn credentials_rejected() {
        assert!(validate_endpoint_address("https://user:pw@example.com/hook", false).is_err());
    }

    #[test]
    fn fragment_rejected() {
        assert!(validate_endpoint_address("https://example.com/hook#frag", false).is_err());
    }

    // --- CloudEvent type validation ---

    #[test]
    fn valid_event_types() {
        let types = vec![
            "alert.created".to_string(),
            "qualification.awarded".to_string(),
            "induction.updated".to_string(),
        ];
        assert!(validate_cloud_event_types(&types).is_ok());
    }

    #[test]
    fn empty_type_list_rejected() {
        assert!(validate_cloud_event_types(&[]).is_err());
    }

    #[test]
    fn type_with_whitespace_rejected() {
        let types = vec!["alert created".to_string()];
        assert!(validate_cloud_event_types(&types).is_err());
    }

    // --- API version validation ---

    #[test]
    fn date_based_api_version_accepted() {
        assert!(validate_api_version("20240101").is_ok());
    }

    #[test]
    fn empty_api_version_rejected() {
        assert!(validate_api_version("").is_err());
    }

    #[test]
    fn non_numeric_api_version_rejected() {
        assert!(validate_api_version("v3").is_err());
    }
}
