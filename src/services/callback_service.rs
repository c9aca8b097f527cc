//! Callback service - verifying and recording QuickPay notifications.
//!
//! QuickPay POSTs the full payment object to the configured callback URL
//! after every operation, signed with HMAC-SHA256 of the raw body under the
//! merchant private key (`QuickPay-Checksum-Sha256` header). This service
//! verifies the signature, matches the payload to a local order, and records
//! the outcome.
//!
//! # Idempotency
//!
//! The provider retries delivery until it sees a 2xx. Records are keyed on
//! `(payment_id, operation_id)`; a replayed notification inserts nothing and
//! changes nothing.

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::callback::CallbackRecord,
    models::order::{Order, comment_visibility, status},
    models::payment::state,
    quickpay::checksum,
    quickpay::types::Payment,
    services::order_service,
};
use uuid::Uuid;

/// Outcome of processing a verified callback.
#[derive(Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// First delivery: recorded and applied to the order
    Recorded,
    /// Replayed delivery: already on file, nothing changed
    Duplicate,
}

/// Verify and process a callback request.
///
/// # Process
///
/// 1. Recompute HMAC-SHA256 over the raw body with the private key and
///    compare (constant time) against the `QuickPay-Checksum-Sha256` header
/// 2. Parse the payment payload (the `id` field is mandatory)
/// 3. Resolve the local order: prefer the order UUID echoed back in
///    `variables[order_id]`, fall back to the numeric suffix of the
///    provider `order_id`
/// 4. Record the callback; on first delivery apply the outcome to the order
///    and its payment row, and append an order comment
///
/// # Errors
///
/// - `ChecksumMismatch`: missing or wrong signature header (401, dropped)
/// - `InvalidRequest`: verified but unparseable payload, or no matching order
pub async fn process_callback(
    pool: &DbPool,
    config: &Config,
    checksum_header: Option<&str>,
    body: &[u8],
) -> Result<CallbackOutcome, AppError> {
    let header = checksum_header.ok_or_else(|| {
        tracing::warn!("QuickPay callback without checksum header");
        AppError::ChecksumMismatch
    })?;

    if !checksum::verify_callback(body, header, &config.quickpay_private_key) {
        tracing::warn!("QuickPay callback checksum did not match");
        return Err(AppError::ChecksumMismatch);
    }

    let payment: Payment = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Unparseable callback payload: {}", e)))?;

    let order = resolve_order(pool, &payment).await?;

    let operation = payment.first_operation();
    let approved = payment.is_approved();

    let inserted = insert_callback_record(pool, &order, &payment, approved, body).await?;
    if !inserted {
        tracing::info!(
            payment_id = payment.id,
            order_id = %order.id,
            "Duplicate QuickPay callback ignored"
        );
        return Ok(CallbackOutcome::Duplicate);
    }

    if approved {
        let amount = operation.and_then(|op| op.amount).unwrap_or(order.total_cents);
        let op_kind = operation.map(|op| op.kind.as_str()).unwrap_or("authorize");

        sync_payment_row(pool, &order, &payment, op_kind).await?;
        order_service::set_status(pool, order.id, status::PAYMENT_RECEIVED).await?;
        order_service::add_comment(
            pool,
            order.id,
            &format!(
                "QuickPay callback: payment {} approved ({} {} {})",
                payment.id, op_kind, amount, order.currency
            ),
            comment_visibility::ADMIN,
        )
        .await?;

        tracing::info!(
            payment_id = payment.id,
            order_id = %order.id,
            operation = op_kind,
            "QuickPay callback recorded"
        );
    } else {
        mark_payment_rejected(pool, payment.id).await?;
        order_service::add_comment(
            pool,
            order.id,
            "QuickPay payment was not approved by QuickPay. You need to contact the site admin.",
            comment_visibility::ADMIN,
        )
        .await?;

        tracing::warn!(
            payment_id = payment.id,
            order_id = %order.id,
            status = operation.and_then(|op| op.aq_status_msg.as_deref()).unwrap_or("unknown"),
            "QuickPay callback reported an unapproved payment"
        );
    }

    Ok(CallbackOutcome::Recorded)
}

/// Resolve the local order a callback payload belongs to.
async fn resolve_order(pool: &DbPool, payment: &Payment) -> Result<Order, AppError> {
    // Primary: the order UUID this service put into variables[order_id]
    if let Some(uuid) = payment
        .variables
        .as_ref()
        .and_then(|v| v.get("order_id"))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        if let Ok(order) = order_service::get_order_unchecked(pool, uuid).await {
            return Ok(order);
        }
    }

    // Fallback: the numeric tail of the provider order id (prefix and test
    // marker stripped)
    if let Some(number) = trailing_order_number(&payment.order_id) {
        if let Some(order) = order_service::find_order_by_number(pool, number).await? {
            return Ok(order);
        }
    }

    tracing::error!(
        payment_id = payment.id,
        provider_order_id = %payment.order_id,
        "QuickPay callback order_id did not match any order"
    );
    Err(AppError::InvalidRequest(
        "Callback did not match any order".to_string(),
    ))
}

/// Parse the trailing digits of a provider order id into an order number.
///
/// `shopT0042` -> `42`. Returns None when the reference has no digit tail.
fn trailing_order_number(order_reference: &str) -> Option<i64> {
    let digits: String = order_reference
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Insert the callback record; returns false when this delivery is a replay.
async fn insert_callback_record(
    pool: &DbPool,
    order: &Order,
    payment: &Payment,
    approved: bool,
    raw_body: &[u8],
) -> Result<bool, AppError> {
    let operation = payment.first_operation();
    let payload: serde_json::Value = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::InvalidRequest(format!("Unparseable callback payload: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO quickpay_callbacks (
            order_id,
            payment_id,
            operation_id,
            merchant_id,
            payment_type,
            payment_brand,
            amount_cents,
            status_msg,
            customer_email,
            approved,
            payload
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (payment_id, COALESCE(operation_id, -1)) DO NOTHING
        "#,
    )
    .bind(order.id)
    .bind(payment.id)
    .bind(operation.and_then(|op| op.id))
    .bind(payment.merchant_id)
    .bind(payment.metadata.as_ref().and_then(|m| m.kind.clone()))
    .bind(payment.metadata.as_ref().and_then(|m| m.brand.clone()))
    .bind(operation.and_then(|op| op.amount))
    .bind(operation.and_then(|op| op.aq_status_msg.clone()))
    .bind(payment.invoice_address.as_ref().and_then(|a| a.email.clone()))
    .bind(approved)
    .bind(payload)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Bring the local payment row in line with an approved callback.
///
/// The hosted-window flow has no local row yet (the payment was created by
/// the window, not by this service), so one is inserted on first contact.
async fn sync_payment_row(
    pool: &DbPool,
    order: &Order,
    payment: &Payment,
    op_kind: &str,
) -> Result<(), AppError> {
    let new_state = match op_kind {
        "capture" => state::CAPTURED,
        "refund" => state::REFUNDED,
        "cancel" => state::CANCELED,
        _ => state::AUTHORIZED,
    };
    let brand = payment.metadata.as_ref().and_then(|m| m.brand.clone());
    let amount = payment
        .first_operation()
        .and_then(|op| op.amount)
        .unwrap_or(order.total_cents);

    sqlx::query(
        r#"
        INSERT INTO payments (
            order_id,
            quickpay_payment_id,
            order_reference,
            amount_cents,
            currency,
            state,
            test_mode,
            card_brand
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (quickpay_payment_id) DO UPDATE
        SET state = EXCLUDED.state,
            test_mode = EXCLUDED.test_mode,
            card_brand = COALESCE(EXCLUDED.card_brand, payments.card_brand),
            updated_at = NOW()
        "#,
    )
    .bind(order.id)
    .bind(payment.id)
    .bind(&payment.order_id)
    .bind(amount)
    .bind(payment.currency.clone().unwrap_or_else(|| order.currency.clone()))
    .bind(new_state)
    .bind(payment.test_mode)
    .bind(brand)
    .execute(pool)
    .await?;

    Ok(())
}

/// List the callbacks recorded against an order, newest first.
///
/// Ownership is enforced through the order lookup: the order must belong to
/// the authenticated merchant before its callback history is returned.
pub async fn list_callbacks(
    pool: &DbPool,
    api_key_id: Uuid,
    order_id: Uuid,
) -> Result<Vec<CallbackRecord>, AppError> {
    let order = order_service::get_order(pool, api_key_id, order_id).await?;

    let records = sqlx::query_as::<_, CallbackRecord>(
        r#"
        SELECT id, order_id, payment_id, operation_id, merchant_id,
               payment_type, payment_brand, amount_cents, status_msg,
               customer_email, approved, payload, created_at
        FROM quickpay_callbacks
        WHERE order_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Flag a local payment row rejected after an unapproved callback.
async fn mark_payment_rejected(pool: &DbPool, quickpay_payment_id: i64) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE payments SET state = $1, updated_at = NOW() WHERE quickpay_payment_id = $2",
    )
    .bind(state::REJECTED)
    .bind(quickpay_payment_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test]
    fn trailing_digits_resolve_the_order_number() {
        assert_eq!(trailing_order_number("shop0042"), Some(42));
        assert_eq!(trailing_order_number("shopT0042"), Some(42));
        assert_eq!(trailing_order_number("123456"), Some(123456));
    }

    #[test]
    fn references_without_digit_tail_do_not_resolve() {
        assert_eq!(trailing_order_number("shop"), None);
        assert_eq!(trailing_order_number(""), None);
    }

    fn config() -> Config {
        Config {
            database_url: "unused".to_string(),
            server_port: 3000,
            quickpay_merchant_id: "12345".to_string(),
            quickpay_agreement_id: "67890".to_string(),
            quickpay_api_key: "api_user_key".to_string(),
            quickpay_window_api_key: "window_key".to_string(),
            quickpay_private_key: "private_key".to_string(),
            quickpay_api_url: "https://api.quickpay.net/".to_string(),
            order_id_prefix: "shop".to_string(),
            continue_url: "https://example.com/checkout/complete".to_string(),
            cancel_url: "https://example.com/checkout/cancel".to_string(),
            callback_url: "https://example.com/callbacks/quickpay".to_string(),
            language: "en".to_string(),
            currency: "DKK".to_string(),
            autocapture: false,
            test_mode: false,
        }
    }

    async fn seed_order(pool: &PgPool) -> Uuid {
        let api_key_id: Uuid = sqlx::query_scalar(
            "INSERT INTO api_keys (key_hash, merchant_name) VALUES ($1, $2) RETURNING id",
        )
        .bind("a".repeat(64))
        .bind("Test shop")
        .fetch_one(pool)
        .await
        .unwrap();

        sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                api_key_id, customer_email, currency, total_cents, status,
                billing_first_name, billing_last_name, billing_street1,
                billing_city, billing_postal_code, billing_country_code
            )
            VALUES ($1, 'shopper@example.dk', 'DKK', 10000, 'pending',
                    'Jens', 'Hansen', 'Somevej 1', 'Aarhus', '8000', 'DNK')
            RETURNING id
            "#,
        )
        .bind(api_key_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn approved_callback_body(order_id: Uuid) -> String {
        format!(
            r#"{{
                "id": 318559,
                "merchant_id": 12345,
                "order_id": "shop0001",
                "accepted": true,
                "test_mode": false,
                "state": "processed",
                "currency": "DKK",
                "operations": [{{
                    "id": 1,
                    "type": "authorize",
                    "amount": 10000,
                    "pending": false,
                    "qp_status_code": "20000",
                    "qp_status_msg": "Approved",
                    "aq_status_code": "20000",
                    "aq_status_msg": "Approved"
                }}],
                "metadata": {{ "type": "card", "brand": "visa", "last4": "1111" }},
                "variables": {{ "order_id": "{}" }}
            }}"#,
            order_id
        )
    }

    #[sqlx::test]
    async fn replayed_callbacks_are_recorded_once(pool: PgPool) {
        let config = config();
        let order_id = seed_order(&pool).await;

        let body = approved_callback_body(order_id);
        let digest = checksum::sign(body.as_bytes(), &config.quickpay_private_key);

        let first = process_callback(&pool, &config, Some(&digest), body.as_bytes())
            .await
            .unwrap();
        assert_eq!(first, CallbackOutcome::Recorded);

        let replay = process_callback(&pool, &config, Some(&digest), body.as_bytes())
            .await
            .unwrap();
        assert_eq!(replay, CallbackOutcome::Duplicate);

        let callbacks: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quickpay_callbacks WHERE order_id = $1")
                .bind(order_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(callbacks, 1);

        let comments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_comments WHERE order_id = $1")
                .bind(order_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(comments, 1);

        let status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, status::PAYMENT_RECEIVED);
    }
}
