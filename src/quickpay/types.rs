//! QuickPay payment JSON objects.
//!
//! These structs mirror the payment resource the v10 API returns from
//! `POST /payments` and friends, and the identical object QuickPay POSTs to
//! the callback URL. Only the fields this service reads are modeled; the
//! full raw payload is stored alongside every callback record.

use serde::{Deserialize, Serialize};

/// A payment resource as returned by the QuickPay API (and delivered in
/// callbacks).
///
/// # Example (trimmed)
///
/// ```json
/// {
///   "id": 318559,
///   "merchant_id": 12345,
///   "order_id": "shop0042",
///   "accepted": true,
///   "test_mode": false,
///   "state": "processed",
///   "currency": "DKK",
///   "operations": [ { "type": "authorize", "amount": 10000, "aq_status_msg": "Approved" } ],
///   "metadata": { "type": "card", "brand": "visa", "last4": "1111" },
///   "invoice_address": { "email": "shopper@example.dk" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Payment {
    /// Provider-assigned payment id
    pub id: i64,

    /// QuickPay merchant account the payment belongs to
    #[serde(default)]
    pub merchant_id: Option<i64>,

    /// The order id this service supplied when creating the payment
    /// (configured prefix + zero-padded order number)
    #[serde(default)]
    pub order_id: String,

    /// Whether the payment has been accepted (authorized successfully)
    #[serde(default)]
    pub accepted: bool,

    /// Whether the payment ran against the test acquirer
    #[serde(default)]
    pub test_mode: bool,

    /// Provider payment state: "initial", "pending", "new", "rejected",
    /// "processed"
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub currency: Option<String>,

    /// Remaining balance in minor units (captured minus refunded)
    #[serde(default)]
    pub balance: Option<i64>,

    /// Chronological list of operations applied to the payment
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// Card metadata captured by the embedded form / payment window
    #[serde(default)]
    pub metadata: Option<CardMetadata>,

    #[serde(default)]
    pub invoice_address: Option<InvoiceAddress>,

    /// Free-form variables echoed back by the provider. This service stores
    /// its own order UUID under `order_id`.
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
}

impl Payment {
    /// The authorize/capture/... operation the provider reports first.
    ///
    /// Callback payloads carry the triggering operation at index 0; this is
    /// the operation the acquirer status is read from.
    pub fn first_operation(&self) -> Option<&Operation> {
        self.operations.first()
    }

    /// The most recent operation. API responses list operations
    /// chronologically, so a fresh authorize/capture lands at the end.
    pub fn latest_operation(&self) -> Option<&Operation> {
        self.operations.last()
    }

    /// Whether the acquirer approved the operation that triggered this
    /// payload.
    pub fn is_approved(&self) -> bool {
        self.first_operation()
            .map(|op| op.aq_status_msg.as_deref() == Some("Approved"))
            .unwrap_or(false)
    }
}

/// A single operation (authorize, capture, refund, cancel) on a payment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Operation {
    #[serde(default)]
    pub id: Option<i64>,

    /// Operation type: "authorize", "capture", "refund", "cancel"
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Amount in minor units
    #[serde(default)]
    pub amount: Option<i64>,

    /// True while the acquirer has not answered yet
    #[serde(default)]
    pub pending: bool,

    /// QuickPay status code ("20000" on success)
    #[serde(default)]
    pub qp_status_code: Option<String>,

    #[serde(default)]
    pub qp_status_msg: Option<String>,

    /// Acquirer status code
    #[serde(default)]
    pub aq_status_code: Option<String>,

    /// Acquirer status message ("Approved" on success)
    #[serde(default)]
    pub aq_status_msg: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,
}

/// Card details attached to an authorized payment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CardMetadata {
    /// Payment type, e.g. "card"
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Card brand, e.g. "visa", "mastercard", "dankort"
    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub last4: Option<String>,

    #[serde(default)]
    pub exp_month: Option<i32>,

    #[serde(default)]
    pub exp_year: Option<i32>,

    #[serde(default)]
    pub country: Option<String>,
}

/// Invoice address echoed back in payment payloads.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceAddress {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub att: Option<String>,

    #[serde(default)]
    pub street: Option<String>,

    #[serde(default)]
    pub zip_code: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub country_code: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALLBACK_BODY: &str = r#"{
        "id": 318559,
        "merchant_id": 12345,
        "order_id": "shopT0042",
        "accepted": true,
        "test_mode": true,
        "state": "processed",
        "currency": "DKK",
        "operations": [
            {
                "id": 1,
                "type": "authorize",
                "amount": 10000,
                "pending": false,
                "qp_status_code": "20000",
                "qp_status_msg": "Approved",
                "aq_status_code": "20000",
                "aq_status_msg": "Approved"
            }
        ],
        "metadata": { "type": "card", "brand": "visa", "last4": "1111" },
        "invoice_address": { "email": "shopper@example.dk", "city": "Aarhus" },
        "variables": { "order_id": "b2f4361a-6eb3-4c1f-9a34-6fd53cb7b974" }
    }"#;

    #[test]
    fn parses_callback_payload() {
        let payment: Payment = serde_json::from_str(CALLBACK_BODY).unwrap();
        assert_eq!(payment.id, 318559);
        assert_eq!(payment.order_id, "shopT0042");
        assert!(payment.accepted);
        assert!(payment.is_approved());

        let op = payment.first_operation().unwrap();
        assert_eq!(op.kind, "authorize");
        assert_eq!(op.amount, Some(10000));

        let metadata = payment.metadata.unwrap();
        assert_eq!(metadata.brand.as_deref(), Some("visa"));
        assert_eq!(
            payment.invoice_address.unwrap().email.as_deref(),
            Some("shopper@example.dk")
        );
    }

    #[test]
    fn missing_operations_is_not_approved() {
        let payment: Payment =
            serde_json::from_str(r#"{"id": 1, "order_id": "shop0001"}"#).unwrap();
        assert!(!payment.is_approved());
        assert!(payment.first_operation().is_none());
    }

    #[test]
    fn declined_operation_is_not_approved() {
        let payment: Payment = serde_json::from_str(
            r#"{
                "id": 2,
                "order_id": "shop0002",
                "accepted": false,
                "operations": [{"type": "authorize", "aq_status_msg": "Rejected test operation"}]
            }"#,
        )
        .unwrap();
        assert!(!payment.is_approved());
    }
}
