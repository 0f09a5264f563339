// Shared HTTP response types for consistent API error payloads.

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    // Human-readable reason, returned by every failing HTTP and WS-upgrade route.
    pub error: String,
}
