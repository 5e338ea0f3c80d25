//! Shared HTTP response handling

use serde::Deserialize;

use crate::util::errors::{FreewayError, FreewayResult};

/// Error body shape the backend uses across its endpoints.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Pass a successful response through, or turn a non-success status into an
/// API error carrying the server's own message when the body provides one.
pub(crate) async fn error_for_status(response: reqwest::Response) -> FreewayResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    Err(FreewayError::Api {
        status: status.as_u16(),
        message,
    })
}
