//! Local payment record models.
//!
//! Every provider payment this service creates (or learns about through a
//! callback) gets a row in the `payments` table so order state can be
//! reconciled without asking the provider.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Local payment lifecycle states.
///
/// These track what this service has confirmed, not the provider's internal
/// payment state machine.
pub mod state {
    pub const CREATED: &str = "created";
    pub const AUTHORIZED: &str = "authorized";
    pub const CAPTURED: &str = "captured";
    pub const REFUNDED: &str = "refunded";
    pub const CANCELED: &str = "canceled";
    pub const REJECTED: &str = "rejected";
}

/// Represents a payment record from the database.
///
/// # Database Table
///
/// Maps to the `payments` table. Each payment:
/// - Belongs to one order
/// - Stores the provider's numeric payment id (`quickpay_payment_id`)
/// - Stores the order reference string that was sent to the provider
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentRecord {
    /// Unique identifier for this payment row
    pub id: Uuid,

    /// Order this payment belongs to
    pub order_id: Uuid,

    /// Provider-assigned payment id
    pub quickpay_payment_id: i64,

    /// Provider-facing order id (prefix + zero-padded order number)
    pub order_reference: String,

    /// Amount in cents
    pub amount_cents: i64,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Local lifecycle state, see [`state`]
    pub state: String,

    /// Whether the payment ran against the test acquirer
    pub test_mode: bool,

    /// Card brand reported by the provider, when known
    pub card_brand: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response returned for payment operations.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "order_id": "550e8400-e29b-41d4-a716-446655440000",
///   "quickpay_payment_id": 318559,
///   "order_reference": "shop0042",
///   "amount_cents": 10000,
///   "currency": "DKK",
///   "state": "authorized",
///   "test_mode": false,
///   "card_brand": "visa",
///   "created_at": "2026-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub quickpay_payment_id: i64,
    pub order_reference: String,
    pub amount_cents: i64,
    pub currency: String,
    pub state: String,
    pub test_mode: bool,
    pub card_brand: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(payment: PaymentRecord) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            quickpay_payment_id: payment.quickpay_payment_id,
            order_reference: payment.order_reference,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            state: payment.state,
            test_mode: payment.test_mode,
            card_brand: payment.card_brand,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Request body for starting a card-token payment on an order.
///
/// The token comes from the provider's embedded form widget running in the
/// storefront; the card number itself never reaches this service.
#[derive(Debug, serde::Deserialize)]
pub struct CreatePaymentRequest {
    /// One-time card token from the embedded form
    pub card_token: String,
}

/// Request body for capture and refund operations.
///
/// When `amount_cents` is omitted the full payment amount is used.
#[derive(Debug, Default, serde::Deserialize)]
pub struct AmountRequest {
    #[serde(default)]
    pub amount_cents: Option<i64>,
}
