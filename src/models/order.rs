//! Order data models and API request/response types.
//!
//! This module defines:
//! - `Order`: Database entity representing a checkout order
//! - `OrderItem`: A single order line (feeds the payment window basket)
//! - `OrderComment`: Append-only log entry recorded against an order
//! - Request/response types for the order endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status progression.
///
/// - `in_checkout`: created, no payment attempt yet
/// - `pending`: a payment window was built or a payment was started
/// - `payment_received`: an approved authorization (or capture) was recorded
/// - `completed`: the shopper returned through the continue URL
/// - `canceled`: the shopper returned through the cancel URL
pub mod status {
    pub const IN_CHECKOUT: &str = "in_checkout";
    pub const PENDING: &str = "pending";
    pub const PAYMENT_RECEIVED: &str = "payment_received";
    pub const COMPLETED: &str = "completed";
    pub const CANCELED: &str = "canceled";
}

/// Who an order comment is visible to.
pub mod comment_visibility {
    pub const ADMIN: &str = "admin";
    pub const CUSTOMER: &str = "customer";
}

/// Represents an order record from the database.
///
/// # Database Table
///
/// Maps to the `orders` table. Each order:
/// - Belongs to one storefront (via `api_key_id`)
/// - Carries a sequential `order_number` used to build the provider-facing
///   order id (QuickPay order ids are 4-20 characters, so UUIDs don't fit)
/// - Stores its total in cents (never floats!)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Order {
    /// Unique identifier for this order
    pub id: Uuid,

    /// Foreign key to the API key (storefront) that owns this order
    pub api_key_id: Uuid,

    /// Sequential number used in the provider order reference
    pub order_number: i64,

    /// Shopper email, forwarded to the payment window
    pub customer_email: String,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Order total in cents, derived from the line items
    pub total_cents: i64,

    /// Current status, see [`status`]
    pub status: String,

    pub billing_first_name: String,
    pub billing_last_name: String,
    pub billing_street1: String,
    pub billing_street2: Option<String>,
    pub billing_city: String,
    pub billing_region: Option<String>,
    pub billing_postal_code: String,

    /// ISO 3166-1 alpha-3 country code, as the payment window expects
    pub billing_country_code: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single order line.
///
/// Maps to the `order_items` table; rendered as `basket[i][...]` fields in
/// the payment window.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,

    /// Basket line index (payment window basket order is significant)
    pub line_no: i32,

    pub qty: i32,

    /// SKU / model number
    pub item_no: String,

    pub item_name: String,

    /// Unit price in cents
    pub price_cents: i64,

    /// VAT rate as a fraction (0.25 = 25%)
    pub vat_rate: f64,
}

/// An order comment, the audit trail every payment outcome writes to.
///
/// Maps to the `order_comments` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderComment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub message: String,

    /// "admin" or "customer", see [`comment_visibility`]
    pub visible_to: String,

    pub created_at: DateTime<Utc>,
}

/// Request body for creating a new order.
///
/// # JSON Example
///
/// ```json
/// {
///   "customer_email": "shopper@example.dk",
///   "currency": "DKK",
///   "billing_address": {
///     "first_name": "Jens",
///     "last_name": "Hansen",
///     "street1": "Somevej 1",
///     "city": "Aarhus",
///     "postal_code": "8000",
///     "country_code": "DNK"
///   },
///   "items": [
///     { "qty": 2, "item_no": "SKU-1", "item_name": "Blue mug", "price_cents": 5000 }
///   ]
/// }
/// ```
///
/// # Validation
///
/// - At least one item; every item with positive qty and price
/// - `currency` optional, defaults to the configured currency
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_email: String,

    /// Currency code (falls back to the configured default when omitted)
    pub currency: Option<String>,

    pub billing_address: BillingAddress,

    pub items: Vec<CreateOrderItem>,
}

/// Billing address part of [`CreateOrderRequest`].
#[derive(Debug, Deserialize)]
pub struct BillingAddress {
    pub first_name: String,
    pub last_name: String,
    pub street1: String,
    #[serde(default)]
    pub street2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country_code: String,
}

/// One line item in [`CreateOrderRequest`].
#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
    pub qty: i32,
    pub item_no: String,
    pub item_name: String,

    /// Unit price in cents
    pub price_cents: i64,

    /// VAT rate as a fraction, defaults to 0.25
    #[serde(default = "default_vat_rate")]
    pub vat_rate: f64,
}

/// Danish VAT, the default the original gateway hardcoded per basket line.
fn default_vat_rate() -> f64 {
    0.25
}

/// Response body for order endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "order_number": 42,
///   "customer_email": "shopper@example.dk",
///   "currency": "DKK",
///   "total_cents": 10000,
///   "status": "in_checkout",
///   "items": [ ... ],
///   "created_at": "2026-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: i64,
    pub customer_email: String,
    pub currency: String,
    pub total_cents: i64,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item part of [`OrderResponse`].
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub qty: i32,
    pub item_no: String,
    pub item_name: String,
    pub price_cents: i64,
    pub vat_rate: f64,
}

impl OrderResponse {
    /// Combine an order row and its item rows into one response.
    ///
    /// Drops the internal `api_key_id` and billing columns clients already
    /// know.
    pub fn from_parts(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            customer_email: order.customer_email,
            currency: order.currency,
            total_cents: order.total_cents,
            status: order.status,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    qty: item.qty,
                    item_no: item.item_no,
                    item_name: item.item_name,
                    price_cents: item.price_cents,
                    vat_rate: item.vat_rate,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Response body for order comment listings.
#[derive(Debug, Serialize)]
pub struct OrderCommentResponse {
    pub id: Uuid,
    pub message: String,
    pub visible_to: String,
    pub created_at: DateTime<Utc>,
}

impl From<OrderComment> for OrderCommentResponse {
    fn from(comment: OrderComment) -> Self {
        Self {
            id: comment.id,
            message: comment.message,
            visible_to: comment.visible_to,
            created_at: comment.created_at,
        }
    }
}

impl CreateOrderRequest {
    /// Order total in cents: sum of qty * unit price over all lines.
    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .map(|item| i64::from(item.qty) * item.price_cents)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_quantity_times_price() {
        let request: CreateOrderRequest = serde_json::from_str(
            r#"{
                "customer_email": "a@b.dk",
                "billing_address": {
                    "first_name": "A", "last_name": "B", "street1": "S 1",
                    "city": "C", "postal_code": "8000", "country_code": "DNK"
                },
                "items": [
                    {"qty": 2, "item_no": "S1", "item_name": "Mug", "price_cents": 5000},
                    {"qty": 1, "item_no": "S2", "item_name": "Plate", "price_cents": 2500}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.total_cents(), 12500);
        // vat_rate defaults per line
        assert_eq!(request.items[0].vat_rate, 0.25);
        assert!(request.currency.is_none());
    }
}
