//! Order HTTP handlers.
//!
//! This module implements order-related API endpoints:
//! - POST /api/v1/orders - Create an order with line items
//! - GET /api/v1/orders - List orders for the storefront
//! - GET /api/v1/orders/:id - Get order details
//! - GET /api/v1/orders/:id/comments - Get the order's comment trail
//! - GET /api/v1/orders/:id/callbacks - Get the recorded QuickPay callbacks
//! - POST /api/v1/orders/:id/payment-window - Build the signed hosted form

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::callback::CallbackRecord,
    models::order::{
        CreateOrderRequest, OrderCommentResponse, OrderResponse, comment_visibility, status,
    },
    quickpay::window::{self, PaymentWindowForm},
    services::{callback_service, order_service},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Create a new order.
///
/// # Request Body
///
/// ```json
/// {
///   "customer_email": "shopper@example.dk",
///   "currency": "DKK",
///   "billing_address": { "first_name": "Jens", "last_name": "Hansen", ... },
///   "items": [ { "qty": 2, "item_no": "SKU-1", "item_name": "Blue mug", "price_cents": 5000 } ]
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the order, its assigned `order_number`, and the
/// derived total.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (order, items) =
        order_service::create_order(&state.pool, auth.api_key_id, request, &state.config).await?;

    tracing::info!(order_id = %order.id, order_number = order.order_number, "Order created");

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse::from_parts(order, items)),
    ))
}

/// List all orders belonging to the authenticated storefront, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = order_service::list_orders(&state.pool, auth.api_key_id).await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in orders {
        let items = order_service::get_order_items(&state.pool, order.id).await?;
        responses.push(OrderResponse::from_parts(order, items));
    }

    Ok(Json(responses))
}

/// Get a single order with its line items.
///
/// Returns 404 if the order does not exist or belongs to another storefront.
pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = order_service::get_order(&state.pool, auth.api_key_id, order_id).await?;
    let items = order_service::get_order_items(&state.pool, order.id).await?;

    Ok(Json(OrderResponse::from_parts(order, items)))
}

/// Get the comment trail for an order, oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<OrderCommentResponse>>, AppError> {
    let comments = order_service::list_comments(&state.pool, auth.api_key_id, order_id).await?;

    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// Get the QuickPay callbacks recorded against an order, newest first.
///
/// Useful when support needs to audit what the provider actually reported
/// for a disputed order, without digging through provider dashboards.
pub async fn list_callbacks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<CallbackRecord>>, AppError> {
    let callbacks =
        callback_service::list_callbacks(&state.pool, auth.api_key_id, order_id).await?;

    Ok(Json(callbacks))
}

/// Build the signed hosted payment-window form for an order.
///
/// # Response
///
/// ```json
/// {
///   "action": "https://payment.quickpay.net",
///   "method": "POST",
///   "fields": { "version": "v10", "order_id": "shop0042", ..., "checksum": "..." }
/// }
/// ```
///
/// The storefront renders every field as a hidden input and submits the
/// shopper to `action`. The order moves to `pending` and gets a comment; the
/// actual outcome arrives later on the callback endpoint.
pub async fn build_payment_window(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentWindowForm>, AppError> {
    let order = order_service::get_order(&state.pool, auth.api_key_id, order_id).await?;

    if order.status == status::PAYMENT_RECEIVED || order.status == status::COMPLETED {
        return Err(AppError::InvalidRequest(
            "Order is already paid".to_string(),
        ));
    }

    let items = order_service::get_order_items(&state.pool, order.id).await?;
    let form = window::build(&state.config, &order, &items);

    order_service::set_status(&state.pool, order.id, status::PENDING).await?;
    order_service::add_comment(
        &state.pool,
        order.id,
        &format!(
            "Payment window prepared for {} {} (reference {})",
            order.total_cents,
            order.currency,
            state.config.order_reference(order.order_number)
        ),
        comment_visibility::ADMIN,
    )
    .await?;

    Ok(Json(form))
}
