//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// API key authentication model
pub mod api_key;
/// Callback record model
pub mod callback;
/// Order, order item, and order comment models
pub mod order;
/// Local payment record model
pub mod payment;
