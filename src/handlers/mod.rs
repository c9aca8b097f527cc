//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Performs business logic (database queries, provider calls)
//! 3. Returns HTTP response (JSON, status code)

/// Inbound QuickPay callback endpoint
pub mod callback;
/// Shopper return URLs (continue / cancel)
pub mod checkout;
/// Health check endpoint
pub mod health;
/// Order management endpoints
pub mod orders;
/// Payment endpoints (card-token flow, capture/refund/cancel)
pub mod payments;
