//! Shopper return URLs for the hosted payment window.
//!
//! After the payment window finishes, QuickPay redirects the shopper's
//! browser to the configured continue or cancel URL. These routes are public
//! (the browser lands here); they only adjust order bookkeeping. The
//! authoritative payment outcome always arrives via the callback.

use crate::{
    AppState,
    error::AppError,
    models::order::{comment_visibility, status},
    services::order_service,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

/// Response shown to the shopper on return.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub status: String,
    pub message: String,
}

/// Handle a successful return from the payment window.
///
/// Marks the checkout complete and appends a success comment with the amount
/// and currency. The order may already be `payment_received` if the callback
/// raced ahead of the redirect; completion is recorded either way. Orders
/// with no payment in progress are left untouched: the redirect is just a
/// browser navigation and must not fabricate a completed checkout.
pub async fn checkout_complete(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let order = order_service::get_order_unchecked(&state.pool, order_id).await?;

    if !completion_allowed(&order.status) {
        return Ok(Json(CheckoutResponse {
            order_id: order.id,
            status: order.status,
            message: "This order has no payment in progress.".to_string(),
        }));
    }

    order_service::add_comment(
        &state.pool,
        order.id,
        &format!(
            "QuickPay payment completed: {} {}",
            order.total_cents, order.currency
        ),
        comment_visibility::CUSTOMER,
    )
    .await?;
    order_service::set_status(&state.pool, order.id, status::COMPLETED).await?;

    Ok(Json(CheckoutResponse {
        order_id: order.id,
        status: status::COMPLETED.to_string(),
        message: "Thank you for your order! QuickPay will notify us once your payment has been processed.".to_string(),
    }))
}

/// Handle a canceled return from the payment window.
///
/// Appends a cancellation comment and moves the order to `canceled` so the
/// shopper can review the cart and try again. An order the callback already
/// settled is never downgraded: the redirect can arrive late, replayed, or
/// forged with a guessed order id.
pub async fn checkout_cancel(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let order = order_service::get_order_unchecked(&state.pool, order_id).await?;

    if !cancellation_allowed(&order.status) {
        return Ok(Json(CheckoutResponse {
            order_id: order.id,
            status: order.status,
            message: "The payment for this order has already been processed.".to_string(),
        }));
    }

    order_service::add_comment(
        &state.pool,
        order.id,
        &format!(
            "QuickPay payment was cancelled by the shopper: {} {}",
            order.total_cents, order.currency
        ),
        comment_visibility::CUSTOMER,
    )
    .await?;
    order_service::set_status(&state.pool, order.id, status::CANCELED).await?;

    Ok(Json(CheckoutResponse {
        order_id: order.id,
        status: status::CANCELED.to_string(),
        message: "The QuickPay payment was cancelled. Please review your cart and try again."
            .to_string(),
    }))
}

/// Whether the continue URL may mark this order completed.
///
/// A payment must have been started (window built or authorization begun)
/// before the return redirect means anything.
fn completion_allowed(status: &str) -> bool {
    status == status::PENDING || status == status::PAYMENT_RECEIVED
}

/// Whether the cancel URL may move this order to `canceled`.
///
/// Anything the callback already settled stays settled.
fn cancellation_allowed(status: &str) -> bool {
    status == status::IN_CHECKOUT || status == status::PENDING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_requires_a_started_payment() {
        assert!(completion_allowed(status::PENDING));
        assert!(completion_allowed(status::PAYMENT_RECEIVED));
        assert!(!completion_allowed(status::IN_CHECKOUT));
        assert!(!completion_allowed(status::CANCELED));
    }

    #[test]
    fn cancellation_never_downgrades_a_settled_order() {
        assert!(cancellation_allowed(status::IN_CHECKOUT));
        assert!(cancellation_allowed(status::PENDING));
        assert!(!cancellation_allowed(status::PAYMENT_RECEIVED));
        assert!(!cancellation_allowed(status::COMPLETED));
        assert!(!cancellation_allowed(status::CANCELED));
    }

    #[test]
    fn replayed_complete_redirect_is_not_reapplied() {
        assert!(!completion_allowed(status::COMPLETED));
    }
}
