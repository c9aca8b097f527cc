//! Order service - order creation, lookup, and the comment trail.
//!
//! Orders stand in for the host platform's order subsystem the gateway glue
//! consumes: every payment outcome ends up as a status change plus an order
//! comment here.

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::order::{CreateOrderRequest, Order, OrderComment, OrderItem, status},
};
use uuid::Uuid;

/// Create an order with its line items in one database transaction.
///
/// # Process
///
/// 1. Validate email, currency, and line items
/// 2. Insert the order row (total derived from the items, sequential
///    `order_number` assigned by the database)
/// 3. Insert one `order_items` row per line
/// 4. Commit (or rollback on error)
///
/// # Errors
///
/// - `InvalidRequest`: no items, non-positive qty/price, bad email/currency
/// - `Database`: database error occurred
pub async fn create_order(
    pool: &DbPool,
    api_key_id: Uuid,
    request: CreateOrderRequest,
    config: &Config,
) -> Result<(Order, Vec<OrderItem>), AppError> {
    validate_request(&request)?;

    let currency = request
        .currency
        .clone()
        .unwrap_or_else(|| config.currency.clone());
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(AppError::InvalidRequest(
            "Currency must be a 3-letter ISO 4217 code".to_string(),
        ));
    }

    let total_cents = request.total_cents();

    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (
            api_key_id,
            customer_email,
            currency,
            total_cents,
            status,
            billing_first_name,
            billing_last_name,
            billing_street1,
            billing_street2,
            billing_city,
            billing_region,
            billing_postal_code,
            billing_country_code
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(&request.customer_email)
    .bind(&currency)
    .bind(total_cents)
    .bind(status::IN_CHECKOUT)
    .bind(&request.billing_address.first_name)
    .bind(&request.billing_address.last_name)
    .bind(&request.billing_address.street1)
    .bind(&request.billing_address.street2)
    .bind(&request.billing_address.city)
    .bind(&request.billing_address.region)
    .bind(&request.billing_address.postal_code)
    .bind(&request.billing_address.country_code)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(request.items.len());
    for (line_no, item) in request.items.iter().enumerate() {
        let row = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, line_no, qty, item_no, item_name, price_cents, vat_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(line_no as i32)
        .bind(item.qty)
        .bind(&item.item_no)
        .bind(&item.item_name)
        .bind(item.price_cents)
        .bind(item.vat_rate)
        .fetch_one(&mut *tx)
        .await?;
        items.push(row);
    }

    tx.commit().await?;

    Ok((order, items))
}

/// Fetch an order owned by the authenticated storefront.
pub async fn get_order(
    pool: &DbPool,
    api_key_id: Uuid,
    order_id: Uuid,
) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND api_key_id = $2")
        .bind(order_id)
        .bind(api_key_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::OrderNotFound)
}

/// Fetch an order without an ownership filter.
///
/// Used by the public shopper return routes and callback matching, where no
/// API key is present.
pub async fn get_order_unchecked(pool: &DbPool, order_id: Uuid) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::OrderNotFound)
}

/// Find an order by its sequential number (callback order-id matching).
pub async fn find_order_by_number(
    pool: &DbPool,
    order_number: i64,
) -> Result<Option<Order>, AppError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(pool)
        .await?;
    Ok(order)
}

/// List all orders for a storefront, newest first.
pub async fn list_orders(pool: &DbPool, api_key_id: Uuid) -> Result<Vec<Order>, AppError> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE api_key_id = $1 ORDER BY created_at DESC",
    )
    .bind(api_key_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

/// Line items for an order.
pub async fn get_order_items(pool: &DbPool, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
    let items =
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY line_no")
            .bind(order_id)
            .fetch_all(pool)
            .await?;
    Ok(items)
}

/// Comment trail for an order, oldest first.
pub async fn list_comments(
    pool: &DbPool,
    api_key_id: Uuid,
    order_id: Uuid,
) -> Result<Vec<OrderComment>, AppError> {
    // Ownership check first so a foreign order id 404s instead of listing empty
    get_order(pool, api_key_id, order_id).await?;

    let comments = sqlx::query_as::<_, OrderComment>(
        "SELECT * FROM order_comments WHERE order_id = $1 ORDER BY created_at ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

/// Append a comment to an order's audit trail.
pub async fn add_comment(
    pool: &DbPool,
    order_id: Uuid,
    message: &str,
    visible_to: &str,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO order_comments (order_id, message, visible_to) VALUES ($1, $2, $3)")
        .bind(order_id)
        .bind(message)
        .bind(visible_to)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move an order to a new status.
pub async fn set_status(pool: &DbPool, order_id: Uuid, status: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status)
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn validate_request(request: &CreateOrderRequest) -> Result<(), AppError> {
    if !request.customer_email.contains('@') {
        return Err(AppError::InvalidRequest(
            "customer_email is not a valid email address".to_string(),
        ));
    }
    if request.items.is_empty() {
        return Err(AppError::InvalidRequest(
            "Order must contain at least one item".to_string(),
        ));
    }
    for item in &request.items {
        if item.qty <= 0 {
            return Err(AppError::InvalidRequest(
                "Item quantity must be positive".to_string(),
            ));
        }
        if item.price_cents < 0 {
            return Err(AppError::InvalidRequest(
                "Item price must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::{BillingAddress, CreateOrderItem};

    fn request(items: Vec<CreateOrderItem>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_email: "shopper@example.dk".to_string(),
            currency: None,
            billing_address: BillingAddress {
                first_name: "Jens".to_string(),
                last_name: "Hansen".to_string(),
                street1: "Somevej 1".to_string(),
                street2: None,
                city: "Aarhus".to_string(),
                region: None,
                postal_code: "8000".to_string(),
                country_code: "DNK".to_string(),
            },
            items,
        }
    }

    fn item(qty: i32, price_cents: i64) -> CreateOrderItem {
        CreateOrderItem {
            qty,
            item_no: "SKU-1".to_string(),
            item_name: "Blue mug".to_string(),
            price_cents,
            vat_rate: 0.25,
        }
    }

    #[test]
    fn rejects_empty_orders() {
        assert!(validate_request(&request(vec![])).is_err());
    }

    #[test]
    fn rejects_non_positive_quantities() {
        assert!(validate_request(&request(vec![item(0, 5000)])).is_err());
        assert!(validate_request(&request(vec![item(-1, 5000)])).is_err());
    }

    #[test]
    fn rejects_negative_prices() {
        assert!(validate_request(&request(vec![item(1, -1)])).is_err());
    }

    #[test]
    fn rejects_bad_email() {
        let mut req = request(vec![item(1, 5000)]);
        req.customer_email = "not-an-email".to_string();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn accepts_valid_request() {
        assert!(validate_request(&request(vec![item(2, 5000)])).is_ok());
    }
}
