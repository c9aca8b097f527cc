//! Payment service - the server-side card-token flow against QuickPay.
//!
//! This service drives the REST side of the integration: create a payment
//! shell for an order, authorize it with the card token from the embedded
//! form, capture/refund/cancel later, and keep the local `payments` row and
//! the order's status and comment trail in sync with every outcome.
//!
//! # Error Handling
//!
//! Provider rejections are not transport errors: a declined authorization
//! records the rejection locally and surfaces as `PaymentRejected` (422).

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::order::{Order, comment_visibility, status},
    models::payment::{PaymentRecord, state},
    quickpay::client::QuickPayClient,
    quickpay::types::Payment,
    services::order_service,
};
use uuid::Uuid;

/// Create and authorize a payment for an order using a card token.
///
/// # Process
///
/// 1. `POST /payments` with the provider-facing order reference
/// 2. Record the payment locally in state `created`
/// 3. `POST /payments/{id}/authorize?synchronized` with the order total and
///    the card token (capturing immediately when `autocapture` is set)
/// 4. On approval: advance the local payment and order, append a comment
/// 5. On rejection: record the rejection, append an admin comment, fail with
///    `PaymentRejected`
///
/// # Errors
///
/// - `InvalidRequest`: the order is already paid or the token is empty
/// - `PaymentRejected`: the acquirer declined the authorization
/// - `Gateway` / `Transport`: the provider call itself failed
pub async fn create_and_authorize(
    pool: &DbPool,
    client: &QuickPayClient,
    config: &Config,
    order: &Order,
    card_token: &str,
) -> Result<PaymentRecord, AppError> {
    if card_token.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "card_token must not be empty".to_string(),
        ));
    }
    if order.status == status::PAYMENT_RECEIVED || order.status == status::COMPLETED {
        return Err(AppError::InvalidRequest(
            "Order is already paid".to_string(),
        ));
    }

    let order_reference = config.order_reference(order.order_number);

    let created = client
        .create_payment(&order_reference, &order.currency, order.id)
        .await?;

    let record = insert_payment(pool, order, created.id, &order_reference).await?;
    order_service::set_status(pool, order.id, status::PENDING).await?;

    let authorized = client
        .authorize_payment(created.id, order.total_cents, card_token, config.autocapture)
        .await?;

    if !operation_approved(&authorized) {
        let reason = rejection_reason(&authorized);
        update_payment_state(pool, record.id, state::REJECTED, &authorized).await?;
        order_service::add_comment(
            pool,
            order.id,
            &format!(
                "QuickPay payment {} was not approved: {}",
                created.id, reason
            ),
            comment_visibility::ADMIN,
        )
        .await?;
        tracing::warn!(
            payment_id = created.id,
            order_id = %order.id,
            "QuickPay rejected authorization: {}",
            reason
        );
        return Err(AppError::PaymentRejected(reason));
    }

    let new_state = if config.autocapture {
        state::CAPTURED
    } else {
        state::AUTHORIZED
    };
    let record = update_payment_state(pool, record.id, new_state, &authorized).await?;

    order_service::set_status(pool, order.id, status::PAYMENT_RECEIVED).await?;
    order_service::add_comment(
        pool,
        order.id,
        &format!(
            "QuickPay payment {} {} for {} {}",
            created.id,
            if config.autocapture {
                "captured"
            } else {
                "authorized"
            },
            order.total_cents,
            order.currency
        ),
        comment_visibility::ADMIN,
    )
    .await?;

    tracing::info!(
        payment_id = created.id,
        order_id = %order.id,
        state = new_state,
        "QuickPay payment approved"
    );

    Ok(record)
}

/// Capture a previously authorized payment (fully or partially).
pub async fn capture(
    pool: &DbPool,
    client: &QuickPayClient,
    api_key_id: Uuid,
    payment_id: Uuid,
    amount_cents: Option<i64>,
) -> Result<PaymentRecord, AppError> {
    let record = get_owned_payment(pool, api_key_id, payment_id).await?;
    if record.state != state::AUTHORIZED {
        return Err(AppError::InvalidRequest(format!(
            "Cannot capture a payment in state '{}'",
            record.state
        )));
    }

    let amount = resolve_amount(&record, amount_cents)?;
    let response = client.capture_payment(record.quickpay_payment_id, amount).await?;

    finish_operation(pool, &record, &response, state::CAPTURED, "captured", amount).await
}

/// Refund a captured payment (fully or partially).
pub async fn refund(
    pool: &DbPool,
    client: &QuickPayClient,
    api_key_id: Uuid,
    payment_id: Uuid,
    amount_cents: Option<i64>,
) -> Result<PaymentRecord, AppError> {
    let record = get_owned_payment(pool, api_key_id, payment_id).await?;
    if record.state != state::CAPTURED {
        return Err(AppError::InvalidRequest(format!(
            "Cannot refund a payment in state '{}'",
            record.state
        )));
    }

    let amount = resolve_amount(&record, amount_cents)?;
    let response = client.refund_payment(record.quickpay_payment_id, amount).await?;

    finish_operation(pool, &record, &response, state::REFUNDED, "refunded", amount).await
}

/// Cancel an authorized, not yet captured payment.
pub async fn cancel(
    pool: &DbPool,
    client: &QuickPayClient,
    api_key_id: Uuid,
    payment_id: Uuid,
) -> Result<PaymentRecord, AppError> {
    let record = get_owned_payment(pool, api_key_id, payment_id).await?;
    if record.state != state::AUTHORIZED && record.state != state::CREATED {
        return Err(AppError::InvalidRequest(format!(
            "Cannot cancel a payment in state '{}'",
            record.state
        )));
    }

    let response = client.cancel_payment(record.quickpay_payment_id).await?;

    finish_operation(
        pool,
        &record,
        &response,
        state::CANCELED,
        "canceled",
        record.amount_cents,
    )
    .await
}

/// Fetch a payment owned by the authenticated storefront.
pub async fn get_owned_payment(
    pool: &DbPool,
    api_key_id: Uuid,
    payment_id: Uuid,
) -> Result<PaymentRecord, AppError> {
    sqlx::query_as::<_, PaymentRecord>(
        r#"
        SELECT p.* FROM payments p
        JOIN orders o ON o.id = p.order_id
        WHERE p.id = $1 AND o.api_key_id = $2
        "#,
    )
    .bind(payment_id)
    .bind(api_key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::PaymentNotFound)
}

/// Fetch a payment, refreshing a still-pending row from the provider.
///
/// An authorization can come back pending at the acquirer; the callback
/// normally settles it, but a read of a payment stuck in `created` consults
/// the provider directly so the answer reflects the current state.
pub async fn get_refreshed_payment(
    pool: &DbPool,
    client: &QuickPayClient,
    api_key_id: Uuid,
    payment_id: Uuid,
) -> Result<PaymentRecord, AppError> {
    let record = get_owned_payment(pool, api_key_id, payment_id).await?;
    if record.state != state::CREATED {
        return Ok(record);
    }

    let live = client.get_payment(record.quickpay_payment_id).await?;
    if !live.accepted {
        return Ok(record);
    }

    let new_state = match live.latest_operation().map(|op| op.kind.as_str()) {
        Some("capture") => state::CAPTURED,
        _ => state::AUTHORIZED,
    };
    update_payment_state(pool, record.id, new_state, &live).await
}

/// Shared tail of capture/refund/cancel: check the provider's answer, update
/// the local row, and write the order comment.
async fn finish_operation(
    pool: &DbPool,
    record: &PaymentRecord,
    response: &Payment,
    new_state: &str,
    verb: &str,
    amount: i64,
) -> Result<PaymentRecord, AppError> {
    if !operation_approved(response) {
        let reason = rejection_reason(response);
        order_service::add_comment(
            pool,
            record.order_id,
            &format!(
                "QuickPay {} of payment {} failed: {}",
                verb, record.quickpay_payment_id, reason
            ),
            comment_visibility::ADMIN,
        )
        .await?;
        return Err(AppError::PaymentRejected(reason));
    }

    let updated = update_payment_state(pool, record.id, new_state, response).await?;

    order_service::add_comment(
        pool,
        record.order_id,
        &format!(
            "QuickPay payment {} {}: {} {}",
            record.quickpay_payment_id, verb, amount, record.currency
        ),
        comment_visibility::ADMIN,
    )
    .await?;

    Ok(updated)
}

/// Insert the local row for a freshly created provider payment.
async fn insert_payment(
    pool: &DbPool,
    order: &Order,
    quickpay_payment_id: i64,
    order_reference: &str,
) -> Result<PaymentRecord, AppError> {
    let record = sqlx::query_as::<_, PaymentRecord>(
        r#"
        INSERT INTO payments (
            order_id,
            quickpay_payment_id,
            order_reference,
            amount_cents,
            currency,
            state,
            test_mode
        )
        VALUES ($1, $2, $3, $4, $5, 'created', $6)
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(quickpay_payment_id)
    .bind(order_reference)
    .bind(order.total_cents)
    .bind(&order.currency)
    .bind(false)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

/// Update a payment row's state plus whatever the provider told us about the
/// card and test mode.
async fn update_payment_state(
    pool: &DbPool,
    payment_id: Uuid,
    new_state: &str,
    response: &Payment,
) -> Result<PaymentRecord, AppError> {
    let brand = response
        .metadata
        .as_ref()
        .and_then(|m| m.brand.clone());

    let record = sqlx::query_as::<_, PaymentRecord>(
        r#"
        UPDATE payments
        SET state = $1,
            test_mode = $2,
            card_brand = COALESCE($3, card_brand),
            updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(new_state)
    .bind(response.test_mode)
    .bind(brand)
    .bind(payment_id)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

/// Whether the provider's synchronized answer approved the operation.
///
/// A payment is approved when it's flagged accepted or the latest operation
/// came back with QuickPay status 20000 (or is still pending at the
/// acquirer, which the callback will settle later).
fn operation_approved(payment: &Payment) -> bool {
    if payment.accepted {
        return true;
    }
    payment
        .latest_operation()
        .map(|op| op.pending || op.qp_status_code.as_deref() == Some("20000"))
        .unwrap_or(false)
}

/// Human-readable reason for a declined operation.
fn rejection_reason(payment: &Payment) -> String {
    payment
        .latest_operation()
        .and_then(|op| op.aq_status_msg.clone().or_else(|| op.qp_status_msg.clone()))
        .unwrap_or_else(|| format!("Payment state '{}'", payment.state))
}

fn resolve_amount(record: &PaymentRecord, requested: Option<i64>) -> Result<i64, AppError> {
    match requested {
        None => Ok(record.amount_cents),
        Some(amount) if amount > 0 && amount <= record.amount_cents => Ok(amount),
        Some(_) => Err(AppError::InvalidRequest(
            "Amount must be positive and no larger than the payment amount".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payment_response(accepted: bool, qp_status_code: Option<&str>, pending: bool) -> Payment {
        let approved = qp_status_code == Some("20000");
        let state = if accepted { "processed" } else { "rejected" };
        let msg = if approved {
            "Approved"
        } else {
            "Rejected test operation"
        };
        serde_json::from_value(serde_json::json!({
            "id": 318559,
            "order_id": "shop0042",
            "accepted": accepted,
            "state": state,
            "operations": [{
                "type": "authorize",
                "amount": 10000,
                "pending": pending,
                "qp_status_code": qp_status_code,
                "qp_status_msg": msg,
                "aq_status_msg": msg
            }]
        }))
        .unwrap()
    }

    fn record() -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            quickpay_payment_id: 318559,
            order_reference: "shop0042".to_string(),
            amount_cents: 10000,
            currency: "DKK".to_string(),
            state: state::AUTHORIZED.to_string(),
            test_mode: false,
            card_brand: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn accepted_payment_is_approved() {
        assert!(operation_approved(&payment_response(true, Some("20000"), false)));
    }

    #[test]
    fn status_20000_is_approved_even_without_accepted_flag() {
        assert!(operation_approved(&payment_response(false, Some("20000"), false)));
    }

    #[test]
    fn pending_operation_counts_as_approved_until_callback() {
        assert!(operation_approved(&payment_response(false, None, true)));
    }

    #[test]
    fn declined_operation_is_not_approved() {
        let payment = payment_response(false, Some("40001"), false);
        assert!(!operation_approved(&payment));
        assert_eq!(rejection_reason(&payment), "Rejected test operation");
    }

    #[test]
    fn amount_defaults_to_full_payment() {
        assert_eq!(resolve_amount(&record(), None).unwrap(), 10000);
    }

    #[test]
    fn partial_amounts_are_allowed_up_to_the_payment_amount() {
        assert_eq!(resolve_amount(&record(), Some(2500)).unwrap(), 2500);
        assert!(resolve_amount(&record(), Some(0)).is_err());
        assert!(resolve_amount(&record(), Some(10001)).is_err());
    }
}
