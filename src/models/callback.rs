//! Callback record model.
//!
//! Every verified QuickPay callback is persisted so payment outcomes can be
//! audited against the provider's notifications, approved or not.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A verified callback notification recorded against an order.
///
/// # Database Table
///
/// Maps to the `quickpay_callbacks` table. The unique constraint on
/// `(payment_id, operation_id)` makes callback processing idempotent:
/// the provider retries delivery, replays insert nothing.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CallbackRecord {
    pub id: Uuid,

    /// Local order the callback was matched to
    pub order_id: Uuid,

    /// Provider payment id from the payload
    pub payment_id: i64,

    /// Provider operation id the notification reports on
    pub operation_id: Option<i64>,

    /// QuickPay merchant account id
    pub merchant_id: Option<i64>,

    /// Payment type from metadata, e.g. "card"
    pub payment_type: Option<String>,

    /// Card brand from metadata, e.g. "visa"
    pub payment_brand: Option<String>,

    /// Operation amount in cents
    pub amount_cents: Option<i64>,

    /// Acquirer status message, e.g. "Approved"
    pub status_msg: Option<String>,

    /// Shopper email from the invoice address
    pub customer_email: Option<String>,

    /// Whether the acquirer approved the operation
    pub approved: bool,

    /// Full raw payload for auditing
    pub payload: serde_json::Value,

    pub created_at: DateTime<Utc>,
}
