//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys
/// - **Resource Errors**: Requested orders or payments not found
/// - **Gateway Errors**: QuickPay API transport failures or error responses
/// - **Callback Errors**: Signature mismatches on inbound notifications
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Requested order does not exist or doesn't belong to the authenticated merchant.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Order not found")]
    OrderNotFound,

    /// Requested payment does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Payment not found")]
    PaymentNotFound,

    /// The `QuickPay-Checksum-Sha256` header did not match the request body.
    ///
    /// Returns HTTP 401 Unauthorized. The callback is dropped without
    /// touching any order.
    #[error("Callback checksum did not match")]
    ChecksumMismatch,

    /// QuickPay could not be reached or the connection failed mid-request.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("QuickPay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// QuickPay answered with an error status.
    ///
    /// Returns HTTP 502 Bad Gateway. The provider message is logged but the
    /// client only sees the status and a generic message.
    #[error("QuickPay returned {status}: {message}")]
    Gateway { status: u16, message: String },

    /// The provider declined the payment operation (authorize, capture, refund).
    ///
    /// Returns HTTP 422 Unprocessable Entity with the provider's status message.
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Configuration could not be loaded or failed validation at startup.
    ///
    /// Never reaches a client; surfaces through main's error path.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidApiKey`, `ChecksumMismatch` → 401 Unauthorized
/// - `OrderNotFound`, `PaymentNotFound` → 404 Not Found
/// - `PaymentRejected` → 422 Unprocessable Entity
/// - `InvalidRequest` → 400 Bad Request
/// - `Transport`, `Gateway` → 502 Bad Gateway (provider details logged, not exposed)
/// - `Database`, `Configuration` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::ChecksumMismatch => (
                StatusCode::UNAUTHORIZED,
                "checksum_mismatch",
                self.to_string(),
            ),
            AppError::OrderNotFound => {
                (StatusCode::NOT_FOUND, "order_not_found", self.to_string())
            }
            AppError::PaymentNotFound => {
                (StatusCode::NOT_FOUND, "payment_not_found", self.to_string())
            }
            AppError::PaymentRejected(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "payment_rejected",
                msg.clone(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Transport(ref e) => {
                tracing::error!("QuickPay transport error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "gateway_unreachable",
                    "Payment gateway could not be reached".to_string(),
                )
            }
            AppError::Gateway { status, ref message } => {
                tracing::error!("QuickPay error response {}: {}", status, message);
                (
                    StatusCode::BAD_GATEWAY,
                    "gateway_error",
                    "Payment gateway returned an error".to_string(),
                )
            }
            AppError::Database(_) | AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}
