//! Payment HTTP handlers.
//!
//! This module implements payment-related API endpoints:
//! - POST /api/v1/orders/:id/payments - Create + authorize with a card token
//! - GET /api/v1/payments/:id - Get payment details
//! - POST /api/v1/payments/:id/capture - Capture an authorized payment
//! - POST /api/v1/payments/:id/refund - Refund a captured payment
//! - POST /api/v1/payments/:id/cancel - Cancel an authorized payment

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::payment::{AmountRequest, CreatePaymentRequest, PaymentResponse},
    services::{order_service, payment_service},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Create and authorize a payment for an order using a card token.
///
/// # Request Body
///
/// ```json
/// {
///   "card_token": "1f2e3d4c5b6a..."
/// }
/// ```
///
/// The token is minted client-side by the provider's embedded form; raw card
/// numbers never reach this service.
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "770e8400-...",
///   "quickpay_payment_id": 318559,
///   "order_reference": "shop0042",
///   "amount_cents": 10000,
///   "state": "authorized",
///   "card_brand": "visa"
/// }
/// ```
///
/// # Errors
///
/// - 404 when the order doesn't exist or belongs to another storefront
/// - 422 when the acquirer declines the card
/// - 502 when the provider cannot be reached
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = order_service::get_order(&state.pool, auth.api_key_id, order_id).await?;

    let payment = payment_service::create_and_authorize(
        &state.pool,
        &state.quickpay,
        &state.config,
        &order,
        &request.card_token,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// Get a payment by id.
///
/// Payments still waiting on the acquirer are refreshed from the provider
/// before answering.
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = payment_service::get_refreshed_payment(
        &state.pool,
        &state.quickpay,
        auth.api_key_id,
        payment_id,
    )
    .await?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// Capture an authorized payment.
///
/// # Request Body
///
/// ```json
/// { "amount_cents": 10000 }
/// ```
///
/// `amount_cents` is optional; omitted means full capture.
pub async fn capture_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = payment_service::capture(
        &state.pool,
        &state.quickpay,
        auth.api_key_id,
        payment_id,
        request.amount_cents,
    )
    .await?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// Refund a captured payment, fully or partially.
pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<AmountRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = payment_service::refund(
        &state.pool,
        &state.quickpay,
        auth.api_key_id,
        payment_id,
        request.amount_cents,
    )
    .await?;

    Ok(Json(PaymentResponse::from(payment)))
}

/// Cancel an authorized, not yet captured payment.
pub async fn cancel_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment =
        payment_service::cancel(&state.pool, &state.quickpay, auth.api_key_id, payment_id).await?;

    Ok(Json(PaymentResponse::from(payment)))
}
