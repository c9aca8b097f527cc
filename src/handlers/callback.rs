//! Inbound QuickPay callback endpoint.
//!
//! QuickPay POSTs the payment object here after every operation. The route
//! is public; authenticity comes from the `QuickPay-Checksum-Sha256` header,
//! an HMAC-SHA256 of the raw body under the merchant private key.

use crate::{AppState, error::AppError, services::callback_service};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

/// Header carrying the provider's HMAC digest of the request body.
pub const CHECKSUM_HEADER: &str = "QuickPay-Checksum-Sha256";

/// Handle a callback from the QuickPay payment gateway.
///
/// # Responses
///
/// - 200 OK once a verified callback is recorded (also for replays - the
///   provider keeps retrying anything else)
/// - 401 when the checksum header is missing or wrong
/// - 400 when a verified body cannot be parsed or matched to an order
///
/// The raw body must be read as bytes: the checksum is over the exact bytes
/// QuickPay sent, not over a re-serialized JSON value.
pub async fn quickpay_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let checksum_header = headers.get(CHECKSUM_HEADER).and_then(|h| h.to_str().ok());

    callback_service::process_callback(&state.pool, &state.config, checksum_header, &body).await?;

    Ok(StatusCode::OK)
}
